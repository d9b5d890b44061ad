use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{RegistryError, RegistryResult};

/// A run artifact being written next to its final location. Nothing is
/// visible at `target` until [`StagedFile::commit`]; a staged file dropped
/// before commit is removed.
pub struct StagedFile {
    target: PathBuf,
    partial: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl StagedFile {
    pub fn begin(target: &Path) -> RegistryResult<Self> {
        let file_name = target
            .file_name()
            .ok_or_else(|| RegistryError::InvalidPath(target.display().to_string()))?;
        if let Some(parent) = parent_dir(target) {
            create_dir_all(parent)?;
        }
        let partial = target.with_file_name(format!(
            ".{}.{}.partial",
            file_name.to_string_lossy(),
            uuid::Uuid::new_v4().simple()
        ));
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&partial)?;
        Ok(Self {
            target: target.to_path_buf(),
            partial,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Flush to disk and move the artifact into place.
    pub fn commit(mut self) -> RegistryResult<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|err| err.into_error())?;
            file.sync_all()?;
        }
        std::fs::rename(&self.partial, &self.target)?;
        if let Some(parent) = parent_dir(&self.target) {
            File::open(parent)?.sync_all()?;
        }
        Ok(())
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(std::io::Error::other("staged file already committed")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.writer.is_some() {
            let _ = std::fs::remove_file(&self.partial);
        }
    }
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

/// Pretty JSON artifact, replaced in one step.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> RegistryResult<()> {
    let mut staged = StagedFile::begin(path)?;
    serde_json::to_writer_pretty(&mut staged, value)?;
    staged.write_all(b"\n")?;
    staged.commit()
}

pub fn write_text_atomic(path: &Path, text: &str) -> RegistryResult<()> {
    let mut staged = StagedFile::begin(path)?;
    staged.write_all(text.as_bytes())?;
    staged.commit()
}
