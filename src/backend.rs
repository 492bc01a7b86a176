use crate::encode::{self, RenderJob};
use crate::error::Result;
use crate::probe::{self, SourceClip};
use std::path::{Path, PathBuf};

/// The external video library: decodes clips and encodes timelines.
pub trait VideoBackend {
    fn probe(&self, path: &Path) -> Result<SourceClip>;

    /// Encodes `job` to `output`, returning the written size in bytes.
    fn render(&self, job: &RenderJob, output: &Path) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl VideoBackend for Ffmpeg {
    fn probe(&self, path: &Path) -> Result<SourceClip> {
        probe::probe(&self.ffprobe, path)
    }

    fn render(&self, job: &RenderJob, output: &Path) -> Result<u64> {
        encode::render(&self.ffmpeg, job, output)
    }
}
