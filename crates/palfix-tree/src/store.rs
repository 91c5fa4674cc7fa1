//! Document files on disk.
//!
//! Writes go to a sibling temp file, are synced, and then renamed over the
//! target so a crash never leaves a half-written save behind.

use crate::codec::{CodecError, DocumentCodec, SaveFormat};
use crate::document::Document;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Read and decode a document from `path`.
pub fn read_document_from_path(
    path: impl AsRef<Path>,
    codec: &dyn DocumentCodec,
) -> Result<Document, CodecError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| CodecError::Io(format!("{}: {e}", path.display())))?;
    codec.load(&bytes).map_err(|e| match e {
        CodecError::Parse(message) => CodecError::Parse(format!("{}: {message}", path.display())),
        CodecError::Corrupt(message) => {
            CodecError::Corrupt(format!("{}: {message}", path.display()))
        }
        other => other,
    })
}

/// Encode `document` with `format` and atomically replace `path`.
pub fn write_document_to_path(
    path: impl AsRef<Path>,
    document: &Document,
    format: SaveFormat,
    codec: &dyn DocumentCodec,
) -> Result<(), CodecError> {
    let path = path.as_ref();
    let bytes = codec.store(document, format)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| CodecError::Io(format!("{parent:?}: {e}")))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), CodecError> {
        let file = File::create(&tmp_path)
            .map_err(|e| CodecError::Io(format!("{}: {e}", tmp_path.display())))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&bytes)
            .map_err(|e| CodecError::Io(format!("{}: {e}", tmp_path.display())))?;
        writer
            .flush()
            .map_err(|e| CodecError::Io(format!("{}: {e}", tmp_path.display())))?;
        let file = writer
            .into_inner()
            .map_err(|e| CodecError::Io(format!("{}: {e}", tmp_path.display())))?;
        file.sync_all()
            .map_err(|e| CodecError::Io(format!("{}: {e}", tmp_path.display())))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        CodecError::Io(format!(
            "{} -> {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })?;

    log::debug!("wrote {} ({} bytes, {:?})", path.display(), bytes.len(), format);
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
