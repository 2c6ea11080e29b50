//! File information and quota types.

use serde::{Deserialize, Serialize};

/// Information about a file or a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Name of the file or directory.
    pub name: String,
    /// Whether this item is a directory.
    pub is_dir: bool,
    /// Whether this directory is empty. `None` for files; the server only
    /// reports the flag for directories.
    pub is_empty_dir: Option<bool>,
    /// Creation time as unix seconds.
    pub ctime: i64,
    /// Last modification time as unix seconds.
    pub mtime: i64,
    /// Size in bytes. `0` for directories.
    pub size: u64,
}

/// Storage quota information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Total space available in bytes.
    pub total: u64,
    /// Space already used in bytes.
    pub used: u64,
}

impl Quota {
    /// Remaining free space in bytes.
    pub fn free(&self) -> u64 {
        self.total.saturating_sub(self.used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_free() {
        let quota = Quota {
            total: 100,
            used: 30,
        };
        assert_eq!(quota.free(), 70);

        let over = Quota {
            total: 100,
            used: 130,
        };
        assert_eq!(over.free(), 0);
    }
}
