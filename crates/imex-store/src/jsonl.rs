//! Line-delimited JSON encoding of the curation store.
//!
//! One publication per line, evidence records nested inside it. Blank lines
//! and `#` comments are tolerated on read and never written.

use imex_kernel::Publication;
use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Errors from JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: read failed: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: not a publication record: {message}")]
    Parse { line: usize, message: String },

    #[error("could not encode publication {ac}: {message}")]
    Encode { ac: String, message: String },

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("store file {path} is not clean UTF-8 text: {reason}")]
    Corrupt { path: String, reason: &'static str },
}

impl JsonlError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Decode every publication line from `reader`.
pub fn read_publications(reader: impl BufRead) -> Result<Vec<Publication>, JsonlError> {
    let mut out = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| JsonlError::Read {
            line: line_no,
            source,
        })?;
        let record = line.trim();
        if record.is_empty() || record.starts_with('#') {
            continue;
        }
        let publication =
            serde_json::from_str::<Publication>(record).map_err(|e| JsonlError::Parse {
                line: line_no,
                message: e.to_string(),
            })?;
        out.push(publication);
    }
    Ok(out)
}

/// Encode `publications` one per line into `writer`.
pub fn write_publications(
    writer: &mut impl Write,
    publications: &[Publication],
) -> Result<(), JsonlError> {
    for publication in publications {
        let encoded = serde_json::to_string(publication).map_err(|e| JsonlError::Encode {
            ac: publication.ac.clone(),
            message: e.to_string(),
        })?;
        writer
            .write_all(encoded.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(JsonlError::Write)?;
    }
    Ok(())
}

/// Load a store file, refusing files with NUL bytes or invalid UTF-8.
pub fn read_publications_from_path(path: impl AsRef<Path>) -> Result<Vec<Publication>, JsonlError> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|e| JsonlError::io(path, e))?;
    let corrupt = |reason| JsonlError::Corrupt {
        path: path.display().to_string(),
        reason,
    };
    if raw.contains(&0) {
        return Err(corrupt("contains NUL bytes"));
    }
    let text = std::str::from_utf8(&raw).map_err(|_| corrupt("invalid UTF-8"))?;
    read_publications(text.as_bytes())
}

/// Replace the store file at `path` with `publications`.
///
/// Content goes to a per-process staging file that is synced and then
/// renamed over `path`; readers never observe a half-written store.
pub fn write_publications_to_path(
    path: impl AsRef<Path>,
    publications: &[Publication],
) -> Result<(), JsonlError> {
    let path = path.as_ref();
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(|e| JsonlError::io(dir, e))?;
    }

    let staging = staging_path(path);
    if let Err(e) = write_staged(&staging, publications) {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(JsonlError::io(path, e));
    }
    Ok(())
}

fn write_staged(staging: &Path, publications: &[Publication]) -> Result<(), JsonlError> {
    let file = File::create(staging).map_err(|e| JsonlError::io(staging, e))?;
    let mut writer = BufWriter::new(file);
    write_publications(&mut writer, publications)?;
    let file = writer
        .into_inner()
        .map_err(|e| JsonlError::io(staging, e.into_error()))?;
    file.sync_all().map_err(|e| JsonlError::io(staging, e))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".staging.{}", std::process::id()));
    PathBuf::from(name)
}
