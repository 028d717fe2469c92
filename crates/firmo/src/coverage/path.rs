//! Path normalization
//!
//! Every path that enters the data store goes through [`normalize_path`], so
//! `./src/a.lua`, `src\a.lua` and `/abs/src/a.lua/` all land on one key.

use std::path::Path;

/// Normalize a path against the current working directory.
///
/// Falls back to normalizing without a base when the working directory cannot
/// be read; the result is then absolute only if the input was.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    match std::env::current_dir() {
        Ok(cwd) => normalize_path_with_base(path, &cwd.to_string_lossy()),
        Err(_) => normalize_components(&to_forward_slashes(path)),
    }
}

/// Normalize `path`, resolving it against `base` when it is relative.
///
/// The result uses forward slashes, has no `.` or empty segments, resolves
/// `..` lexically, and carries no trailing slash (except for the root).
#[must_use]
pub fn normalize_path_with_base(path: &str, base: &str) -> String {
    let path = to_forward_slashes(path.trim());
    if is_absolute(&path) {
        return normalize_components(&path);
    }
    let base = to_forward_slashes(base.trim());
    normalize_components(&format!("{base}/{path}"))
}

/// Whether `path` is absolute in either Unix (`/x`) or Windows (`C:/x`) form.
#[must_use]
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || drive_prefix(path).is_some()
}

/// Express `path` relative to `root`, if it lies underneath it.
///
/// Both arguments are expected to be normalized already.
#[must_use]
pub fn relative_to<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return path.strip_prefix('/');
    }
    path.strip_prefix(root)?.strip_prefix('/')
}

/// Convert a [`Path`] into the normalized string form.
#[must_use]
pub fn normalize_fs_path(path: &Path) -> String {
    normalize_path(&path.to_string_lossy())
}

fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

fn drive_prefix(path: &str) -> Option<&str> {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        if bytes.len() == 2 || bytes[2] == b'/' {
            return Some(&path[..2]);
        }
    }
    None
}

fn normalize_components(path: &str) -> String {
    let (prefix, rest) = match drive_prefix(path) {
        Some(drive) => (drive.to_ascii_uppercase(), &path[2..]),
        None => (String::new(), path),
    };
    let absolute = !prefix.is_empty() || rest.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("{prefix}/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_relative_path_joined_to_base() {
        assert_eq!(
            normalize_path_with_base("src/foo.lua", "/work"),
            "/work/src/foo.lua"
        );
    }

    #[test]
    fn test_dot_slash_and_trailing_slash_equivalent() {
        let a = normalize_path_with_base("./src/foo.lua", "/work");
        let b = normalize_path_with_base("src/foo.lua/", "/work");
        let c = normalize_path_with_base("src\\foo.lua", "/work");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_parent_segments_resolved() {
        assert_eq!(
            normalize_path_with_base("../lib/../src/./x.lua", "/work/proj"),
            "/work/src/x.lua"
        );
    }

    #[test]
    fn test_parent_above_root_is_clamped() {
        assert_eq!(normalize_path_with_base("/../../a.lua", "/"), "/a.lua");
    }

    #[test]
    fn test_root_stays_root() {
        assert_eq!(normalize_path_with_base("/", "/work"), "/");
        assert_eq!(normalize_path_with_base("//", "/work"), "/");
    }

    #[test]
    fn test_windows_drive_is_absolute() {
        assert_eq!(
            normalize_path_with_base("c:\\proj\\src\\a.lua", "/work"),
            "C:/proj/src/a.lua"
        );
        assert!(is_absolute("C:/x"));
    }

    #[test]
    fn test_duplicate_separators_collapse() {
        assert_eq!(normalize_path_with_base("/a//b///c.lua", "/"), "/a/b/c.lua");
    }

    #[test]
    fn test_relative_to_root() {
        assert_eq!(relative_to("/work/src/a.lua", "/work"), Some("src/a.lua"));
        assert_eq!(relative_to("/work/src/a.lua", "/work/"), Some("src/a.lua"));
        assert_eq!(relative_to("/workspace/a.lua", "/work"), None);
        assert_eq!(relative_to("/other/a.lua", "/work"), None);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(path in "[a-z./\\\\]{0,24}") {
            let once = normalize_path_with_base(&path, "/base/dir");
            let twice = normalize_path_with_base(&once, "/base/dir");
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_normalized_paths_are_absolute(path in "[a-z./]{0,24}") {
            let normalized = normalize_path_with_base(&path, "/base");
            prop_assert!(normalized.starts_with('/'));
            prop_assert!(normalized == "/" || !normalized.ends_with('/'));
        }
    }
}
