//! Recursive enumeration built on the oracle's pattern lookup.

use std::path::{Path, PathBuf};

use fsconform_core::{ErrorKind, FsOracle, FsResult, NamePattern};

/// Everything found below a directory, in discovery order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Walk {
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
}

/// Visit every entry below `root`, keeping files whose name matches
/// `file_pattern`. Directories are always recorded. Reparse points are
/// listed but never descended into.
pub fn walk(oracle: &dyn FsOracle, root: &Path, file_pattern: &NamePattern) -> FsResult<Walk> {
    let mut found = Walk::default();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match oracle.enumerate(&dir.join("*")) {
            Ok(entries) => entries,
            // A directory with nothing visible in it.
            Err(err) if err.kind() == ErrorKind::NotFound && oracle.exists(&dir) => continue,
            Err(err) => return Err(err),
        };

        for entry in entries {
            if entry.is_dot_entry() {
                continue;
            }
            let path = dir.join(&entry.name);
            if entry.is_dir() {
                if !entry.is_reparse_point() {
                    pending.push(path.clone());
                }
                found.directories.push(path);
            } else if file_pattern.matches(&entry.name) {
                found.files.push(path);
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsconform_core::{Access, CaseSensitivity, Disposition, MemoryFs, OpenRequest};

    fn touch(fs: &MemoryFs, path: &str) {
        let h = fs
            .create(
                Path::new(path),
                &OpenRequest::new(Disposition::CreateNew, Access::READ_WRITE),
            )
            .unwrap();
        fs.close(h).unwrap();
    }

    #[test]
    fn test_walk_collects_nested_entries() {
        let fs = MemoryFs::default();
        for dir in ["/t", "/t/a", "/t/a/b", "/t/c"] {
            fs.create_directory(Path::new(dir)).unwrap();
        }
        touch(&fs, "/t/top.txt");
        touch(&fs, "/t/a/b/deep.txt");
        touch(&fs, "/t/a/skip.log");
        fs.create_symbolic_link(Path::new("/t/loop"), Path::new("/t"), true)
            .unwrap();

        let pattern = NamePattern::new("*.txt", CaseSensitivity::InsensitivePreserving).unwrap();
        let walk = walk(&fs, Path::new("/t"), &pattern).unwrap();

        let mut files = walk.files.clone();
        files.sort();
        assert_eq!(
            files,
            vec![PathBuf::from("/t/a/b/deep.txt"), PathBuf::from("/t/top.txt")]
        );
        // a, a/b, c and the link itself
        assert_eq!(walk.directories.len(), 4);
    }

    #[test]
    fn test_walk_missing_root_fails() {
        let fs = MemoryFs::default();
        let pattern = NamePattern::new("*", CaseSensitivity::Sensitive).unwrap();
        let err = walk(&fs, Path::new("/nope"), &pattern).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
