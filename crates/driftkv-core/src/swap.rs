//! File swap — snapshot writes and the startup load
//!
//! A flush never edits the main file in place:
//! 1. Write every record to the side file (`<main>.changes`)
//! 2. Sync the side file
//! 3. Rename the side file over the main file (atomic replace)
//! 4. Sync the parent directory
//!
//! If the process crashes before step 3 the main file still holds the
//! previous snapshot and the orphaned side file is overwritten by the next
//! flush. After step 3 the main file is the new snapshot.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::{self, LineError, LineParse};
use crate::config::SIDE_FILE_SUFFIX;
use crate::durability::{sync_dir, sync_file};
use crate::entry::Entry;
use crate::error::{StoreError, StoreResult};

/// `<main path>.changes`
pub fn side_path(main: &Path) -> PathBuf {
    let mut name = OsString::from(main.as_os_str());
    name.push(SIDE_FILE_SUFFIX);
    PathBuf::from(name)
}

fn parent_dir(main: &Path) -> &Path {
    match main.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Read the main file. A missing file is an empty store.
///
/// Lines that do not split into exactly three fields are skipped. An unknown
/// type tag or an undecodable string value fails the whole load.
pub fn load_entries(main: &Path) -> StoreResult<Vec<Entry>> {
    let file = match File::open(main) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(main, e, "Failed to open store file")),
    };

    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| StoreError::io(main, e, "Failed to read store file"))?;
        let line_no = index + 1;

        match codec::decode_line(&line) {
            Ok(LineParse::Record(entry)) => entries.push(entry),
            Ok(LineParse::Malformed) => {
                skipped += 1;
                debug!(path = %main.display(), line = line_no, "skipping malformed record");
            }
            Err(LineError::UnknownTypeTag(tag)) => {
                return Err(StoreError::UnknownTypeTag { path: main.to_path_buf(), line: line_no, tag });
            }
            Err(LineError::Decode(message)) => {
                return Err(StoreError::Decode { path: main.to_path_buf(), line: line_no, message });
            }
        }
    }

    debug!(path = %main.display(), loaded = entries.len(), skipped, "loaded store file");
    Ok(entries)
}

/// Write `lines` as the new main file using the side-file protocol.
/// Returns the number of records written.
pub fn write_snapshot(main: &Path, lines: &[String], sync: bool) -> StoreResult<usize> {
    let side = side_path(main);

    {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&side)
            .map_err(|e| StoreError::io(&side, e, "Failed to create side file"))?;

        let mut writer = BufWriter::new(file);
        for line in lines {
            writeln!(writer, "{}", line)
                .map_err(|e| StoreError::io(&side, e, "Failed to write side file"))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| StoreError::io(&side, e.into_error(), "Failed to flush side file"))?;

        if sync {
            sync_file(&file).map_err(|e| StoreError::io(&side, e, "Failed to sync side file"))?;
        }
    }

    fs::rename(&side, main).map_err(|e| StoreError::io(main, e, "Failed to replace store file"))?;

    if sync {
        let dir = parent_dir(main);
        sync_dir(dir).map_err(|e| StoreError::io(dir, e, "Failed to sync store directory"))?;
    }

    Ok(lines.len())
}

/// Delete the main and side files if present. Both removals are attempted;
/// the first failure is returned.
pub fn remove_files(main: &Path) -> StoreResult<()> {
    let side = side_path(main);
    let mut first_err = None;

    for path in [main, side.as_path()] {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(StoreError::io(path, e, "Failed to delete store file"));
                }
            }
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ValueType;
    use tempfile::TempDir;

    fn lines_of(entries: &[Entry]) -> Vec<String> {
        entries.iter().map(codec::encode_line).collect()
    }

    #[test]
    fn test_side_path() {
        assert_eq!(side_path(Path::new("/a/prefs.txt")), PathBuf::from("/a/prefs.txt.changes"));
        assert_eq!(side_path(Path::new("prefs")), PathBuf::from("prefs.changes"));
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let entries = load_entries(&tmp.path().join("absent.txt")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_write_then_load() {
        let tmp = TempDir::new().unwrap();
        let main = tmp.path().join("prefs.txt");
        let entries = vec![
            Entry::new("name", ValueType::String, "a|b\nc"),
            Entry::new("score", ValueType::Int, "100"),
            Entry::new("ratio", ValueType::Float, "-0.125"),
            Entry::new("on", ValueType::Bool, "true"),
        ];

        let written = write_snapshot(&main, &lines_of(&entries), true).unwrap();
        assert_eq!(written, 4);
        assert!(!side_path(&main).exists(), "side file must be renamed away");

        assert_eq!(load_entries(&main).unwrap(), entries);
    }

    #[test]
    fn test_overwrite_replaces_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let main = tmp.path().join("prefs.txt");

        write_snapshot(&main, &["score|Int|100".to_string()], false).unwrap();
        write_snapshot(&main, &["score|Int|200".to_string()], false).unwrap();

        assert_eq!(fs::read_to_string(&main).unwrap(), "score|Int|200\n");
    }

    #[test]
    fn test_stale_side_file_is_overwritten() {
        let tmp = TempDir::new().unwrap();
        let main = tmp.path().join("prefs.txt");
        fs::write(side_path(&main), "garbage|from|a|crash\n".repeat(50)).unwrap();

        write_snapshot(&main, &["k|Int|1".to_string()], false).unwrap();
        assert_eq!(fs::read_to_string(&main).unwrap(), "k|Int|1\n");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let tmp = TempDir::new().unwrap();
        let main = tmp.path().join("prefs.txt");
        fs::write(&main, "a|Int|1\nb|Int|2|extra\nc|Bool|false\n\n").unwrap();

        let entries = load_entries(&main).unwrap();
        assert_eq!(entries, vec![
            Entry::new("a", ValueType::Int, "1"),
            Entry::new("c", ValueType::Bool, "false"),
        ]);
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let main = tmp.path().join("prefs.txt");
        fs::write(&main, "a|Int|1\nb|Decimal|2\nc|Int|3\n").unwrap();

        match load_entries(&main) {
            Err(StoreError::UnknownTypeTag { line, tag, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(tag, "Decimal");
            }
            other => panic!("Expected UnknownTypeTag, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_string_encoding_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let main = tmp.path().join("prefs.txt");
        fs::write(&main, "a|String|***\n").unwrap();

        assert!(matches!(load_entries(&main), Err(StoreError::Decode { line: 1, .. })));
    }

    #[test]
    fn test_remove_files() {
        let tmp = TempDir::new().unwrap();
        let main = tmp.path().join("prefs.txt");
        fs::write(&main, "a|Int|1\n").unwrap();
        fs::write(side_path(&main), "a|Int|2\n").unwrap();

        remove_files(&main).unwrap();
        assert!(!main.exists());
        assert!(!side_path(&main).exists());

        // Nothing left to delete: still ok
        remove_files(&main).unwrap();
    }
}
