use std::path::PathBuf;
use std::process::ExitStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error)]
pub enum Error {
    #[error("ffmpeg not found in PATH, install it from https://ffmpeg.org")]
    FfmpegNotFound,

    #[error("ffprobe not found in PATH, install it from https://ffmpeg.org")]
    FfprobeNotFound,

    #[error("ffplay not found in PATH, install it from https://ffmpeg.org")]
    FfplayNotFound,

    #[error("please provide a video file first")]
    MissingInput,

    #[error("input file does not exist: {0}")]
    InputNotFound(PathBuf),

    #[error("unsupported video format: {0} (expected mp4, mov, mkv or avi)")]
    UnsupportedFormat(String),

    #[error("invalid source clip: {0}")]
    InvalidSource(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("ffprobe failed: {0}")]
    ProbeFailed(String),

    #[error("ffmpeg encoding failed: {0}")]
    EncodeFailed(String),

    #[error("ffplay failed: {0}")]
    PreviewFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// A warning leaves nothing half-done: the pipeline never started.
    pub fn is_warning(&self) -> bool {
        matches!(self, Error::MissingInput)
    }
}

/// The trimmed stderr of a failed tool run, or its exit status when it printed nothing.
pub(crate) fn failure_detail(tool: &str, stderr: &[u8], status: ExitStatus) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("{tool} exited with {status}")
    } else {
        stderr.to_string()
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{self}")
    }
}
