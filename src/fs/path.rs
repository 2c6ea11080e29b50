//! Remote path helpers.
//!
//! All remote paths use `/` as the separator and start with `/`.

/// Split a path into its parent directory and trailing name component.
///
/// The parent of a top-level entry is `"/"`.
pub(crate) fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("/", path),
    }
}

/// Join a directory and a name into a full path.
///
/// The root directory contributes no prefix, so `join_path("/", "a")`
/// is `"/a"`, not `"//a"`.
pub(crate) fn join_path(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/a/b/c.txt"), ("/a/b", "c.txt"));
        assert_eq!(split_path("/top"), ("/", "top"));
        assert_eq!(split_path("/a/b"), ("/a", "b"));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/", "file"), "/file");
        assert_eq!(join_path("/docs", "file"), "/docs/file");
    }

    #[test]
    fn test_split_join_roundtrip() {
        for path in ["/a/b/c", "/x", "/a b/c d"] {
            let (dir, name) = split_path(path);
            assert_eq!(join_path(dir, name), path);
        }
    }
}
