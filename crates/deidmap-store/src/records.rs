//! Two-column record files: the on-disk shape of every store.
//!
//! One header line, one record per line, comma-separated, UTF-8. Records
//! are append-only: writers may add lines but never rewrite or remove
//! existing ones, so the version-control history reads as a pure append
//! log. The file itself is still replaced atomically on write.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A parsed two-column record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFile {
    /// Column names, written exactly once as the first line.
    pub header: (String, String),
    /// Records in file order. Order is meaningful: appends go at the end.
    pub records: Vec<(String, String)>,
}

impl RecordFile {
    pub fn new(left_column: impl Into<String>, right_column: impl Into<String>) -> Self {
        Self {
            header: (left_column.into(), right_column.into()),
            records: Vec::new(),
        }
    }
}

/// Errors from record-file operations.
#[derive(Debug, thiserror::Error)]
pub enum RecordFileError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: expected exactly two comma-separated fields, found {1:?}")]
    Shape(usize, String),

    #[error("field {0:?} cannot be stored (commas and line breaks are not allowed)")]
    Field(String),

    #[error("corrupted record file: {0}")]
    Corrupt(String),
}

/// Read a record file. Returns `None` when the file does not exist or is
/// empty (a store that has never been written).
pub fn read_record_file(path: impl AsRef<Path>) -> Result<Option<RecordFile>, RecordFileError> {
    let path = path.as_ref();
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RecordFileError::Io(0, format!("{}: {e}", path.display()))),
    };
    validate_substrate_bytes(path, &bytes)?;

    let text = String::from_utf8(bytes)
        .map_err(|e| RecordFileError::Corrupt(format!("{}: {e}", path.display())))?;

    let mut header = None;
    let mut records = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim_end_matches('\r');
        if trimmed.trim().is_empty() {
            continue;
        }
        let fields = split_two(trimmed).ok_or_else(|| {
            RecordFileError::Shape(line_no + 1, trimmed.to_string())
        })?;
        match &header {
            None => header = Some(fields),
            Some(_) => records.push(fields),
        }
    }

    Ok(header.map(|header| RecordFile { header, records }))
}

/// Write a record file atomically (temp file, rename, directory fsync).
pub fn write_record_file(
    path: impl AsRef<Path>,
    file: &RecordFile,
) -> Result<(), RecordFileError> {
    let path = path.as_ref();
    validate_field(&file.header.0)?;
    validate_field(&file.header.1)?;
    for (left, right) in &file.records {
        validate_field(left)?;
        validate_field(right)?;
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| RecordFileError::Io(0, format!("{}: {e}", parent.display())))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), RecordFileError> {
        let handle = File::create(&tmp_path)
            .map_err(|e| RecordFileError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        let mut writer = BufWriter::new(handle);
        writeln!(writer, "{},{}", file.header.0, file.header.1)
            .map_err(|e| RecordFileError::Io(0, e.to_string()))?;
        for (left, right) in &file.records {
            writeln!(writer, "{left},{right}").map_err(|e| RecordFileError::Io(0, e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| RecordFileError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        let handle = writer
            .into_inner()
            .map_err(|e| RecordFileError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        handle
            .sync_all()
            .map_err(|e| RecordFileError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        RecordFileError::Io(
            0,
            format!("{} -> {}: {e}", tmp_path.display(), path.display()),
        )
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir = File::open(parent)
            .map_err(|e| RecordFileError::Io(0, format!("{}: {e}", parent.display())))?;
        dir.sync_all()
            .map_err(|e| RecordFileError::Io(0, format!("{}: {e}", parent.display())))?;
    }

    Ok(())
}

/// Locate the single `.csv` record file in a store working copy, if any.
pub fn find_record_file(dir: impl AsRef<Path>) -> Result<Option<PathBuf>, RecordFileError> {
    let dir = dir.as_ref();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RecordFileError::Io(0, format!("{}: {e}", dir.display()))),
    };
    let mut found = None;
    for entry in entries {
        let entry = entry.map_err(|e| RecordFileError::Io(0, e.to_string()))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "csv") {
            if found.is_some() {
                return Err(RecordFileError::Corrupt(format!(
                    "{}: multiple record files present",
                    dir.display()
                )));
            }
            found = Some(path);
        }
    }
    Ok(found)
}

fn split_two(line: &str) -> Option<(String, String)> {
    let mut parts = line.splitn(2, ',');
    let left = parts.next()?;
    let right = parts.next()?;
    if right.contains(',') {
        return None;
    }
    Some((left.to_string(), right.to_string()))
}

fn validate_field(field: &str) -> Result<(), RecordFileError> {
    if field.is_empty() || field.contains(',') || field.contains('\n') || field.contains('\r') {
        return Err(RecordFileError::Field(field.to_string()));
    }
    Ok(())
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

fn validate_substrate_bytes(path: &Path, bytes: &[u8]) -> Result<(), RecordFileError> {
    if bytes.contains(&0) {
        return Err(RecordFileError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(RecordFileError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "deidmap-records-{prefix}-{}-{unique}.csv",
            std::process::id()
        ))
    }

    #[test]
    fn read_returns_none_for_missing_file() {
        let path = temp_path("missing");
        assert!(read_record_file(&path).expect("read should succeed").is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let path = temp_path("roundtrip");
        let mut file = RecordFile::new("record_id", "jdc_person_id");
        file.records.push(("1".to_string(), "J1000123-4".to_string()));
        file.records.push(("2".to_string(), "J1000456-8".to_string()));
        write_record_file(&path, &file).expect("write should succeed");

        let read = read_record_file(&path)
            .expect("read should succeed")
            .expect("file should be non-empty");
        assert_eq!(read, file);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn header_is_written_exactly_once() {
        let path = temp_path("header");
        let mut file = RecordFile::new("record_id", "offset_days");
        file.records.push(("A".to_string(), "124".to_string()));
        write_record_file(&path, &file).expect("write should succeed");
        file.records.push(("B".to_string(), "-87".to_string()));
        write_record_file(&path, &file).expect("second write should succeed");

        let text = fs::read_to_string(&path).expect("file should read");
        assert_eq!(
            text.lines().filter(|l| *l == "record_id,offset_days").count(),
            1
        );
        assert_eq!(text.lines().count(), 3);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn read_rejects_rows_with_wrong_field_count() {
        let path = temp_path("shape");
        fs::write(&path, "a,b\n1,2,3\n").expect("fixture should write");
        let err = read_record_file(&path).expect_err("three fields must be rejected");
        assert!(matches!(err, RecordFileError::Shape(2, _)));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn read_rejects_nul_bytes() {
        let path = temp_path("nul");
        fs::write(&path, b"a,b\n1,\0x\n").expect("fixture should write");
        let err = read_record_file(&path).expect_err("NUL must be rejected");
        assert!(matches!(err, RecordFileError::Corrupt(_)));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn write_rejects_fields_with_separators() {
        let path = temp_path("field");
        let mut file = RecordFile::new("record_id", "jdc_person_id");
        file.records.push(("1,2".to_string(), "x".to_string()));
        let err = write_record_file(&path, &file).expect_err("comma in field must be rejected");
        assert!(matches!(err, RecordFileError::Field(_)));
    }
}
