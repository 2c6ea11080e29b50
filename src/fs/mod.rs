//! File and quota data model.

mod info;
pub(crate) mod path;

pub use info::{FileInfo, Quota};
