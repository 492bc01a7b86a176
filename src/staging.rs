//! Temporary files owned by a single request.
//!
//! The staged copy of the input and the not-yet-published output both live in
//! [`tempfile::NamedTempFile`]s, so they are removed on every exit path,
//! including unwinding. Explicit release logs removal failures.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi"];

pub(crate) const TEMP_PREFIX: &str = "vidloop-";

fn supported_extension(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else if extension.is_empty() {
        Err(Error::UnsupportedFormat(format!(
            "{} has no file extension",
            path.display()
        )))
    } else {
        Err(Error::UnsupportedFormat(format!(".{extension}")))
    }
}

fn release_temp(file: NamedTempFile, what: &str) {
    let path = file.path().to_path_buf();
    match file.close() {
        Ok(()) => tracing::debug!(path = %path.display(), "removed {}", what),
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "failed to remove {}", what)
        }
    }
}

/// A private copy of the uploaded video.
#[derive(Debug)]
pub struct StagedInput {
    file: NamedTempFile,
}

impl StagedInput {
    pub fn acquire(source: &Path) -> Result<Self> {
        if !source.is_file() {
            return Err(Error::InputNotFound(source.to_path_buf()));
        }
        let extension = supported_extension(source)?;

        let mut file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&format!(".{extension}"))
            .tempfile()?;

        let mut reader = std::fs::File::open(source)?;
        let copied = std::io::copy(&mut reader, file.as_file_mut())?;
        tracing::debug!(
            source = %source.display(),
            staged = %file.path().display(),
            bytes = copied,
            "staged input"
        );

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn release(self) {
        release_temp(self.file, "staged input");
    }
}

/// Scratch file the encoder writes into before it is published.
#[derive(Debug)]
pub struct OutputSlot {
    file: NamedTempFile,
}

impl OutputSlot {
    /// Creates the slot in the destination's directory so publishing is a rename.
    pub fn beside(destination: &Path) -> Result<Self> {
        let directory = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".mp4")
            .tempfile_in(directory)?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn persist(self, destination: &Path) -> Result<PathBuf> {
        self.file
            .persist(destination)
            .map_err(|error| Error::Io(error.error))?;
        Ok(destination.to_path_buf())
    }

    pub fn discard(self) {
        release_temp(self.file, "unfinished output");
    }
}
