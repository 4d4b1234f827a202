use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use csv::{Writer, WriterBuilder};

use crate::{
    domain::{BusinessRecord, EXPORT_HEADER},
    error::ExportError,
};

use super::RecordSink;

/// Append-only CSV export, held open for the whole run.
///
/// The header row is written only when the file is new or empty, so repeated
/// runs keep adding rows under the same header.
pub struct ExportWriter {
    path: PathBuf,
    writer: Writer<File>,
    rows_written: usize,
}

impl ExportWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(EXPORT_HEADER)?;
            writer.flush()?;
        }

        log::info!("Writing businesses to {}", path.display());

        Ok(ExportWriter {
            path,
            writer,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and returns how many rows this writer appended.
    pub fn finish(mut self) -> Result<usize, ExportError> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }
}

impl RecordSink for ExportWriter {
    fn append(&mut self, record: &BusinessRecord) -> Result<(), ExportError> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }
}

impl Drop for ExportWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::error!("Failed to flush {}: {:?}", self.path.display(), e);
        }
    }
}
