//! Whole-file replacement that readers never observe half-written.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Write `contents` to a uniquely named temp file beside `path`, then rename
/// it over `path`. Concurrent writers each use their own temp file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp file {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync temp file {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn creates_parents_and_replaces_existing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("a").join("b").join("state.json");
        write_atomic(&path, "first\n").expect("write");
        write_atomic(&path, "second\n").expect("rewrite");
        assert_eq!(fs::read_to_string(&path).expect("read"), "second\n");
    }

    #[test]
    fn concurrent_writers_do_not_collide() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("runtimes.json");
        let writers: Vec<_> = (0..8)
            .map(|n| {
                let path = path.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        write_atomic(&path, &format!("writer {n}\n"))?;
                    }
                    anyhow::Ok(())
                })
            })
            .collect();
        for writer in writers {
            writer.join().expect("join").expect("write");
        }

        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.starts_with("writer "), "{contents}");
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .expect("read_dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("runtimes.json")]);
    }
}
