use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;

pub fn preview_args(path: &Path) -> Vec<String> {
    vec![
        "-autoexit".into(),
        "-loglevel".into(),
        "error".into(),
        "-window_title".into(),
        "vidloop preview".into(),
        path.to_string_lossy().into_owned(),
    ]
}

/// Plays the rendered file in a window and blocks until playback ends.
pub fn preview(ffplay: &Path, path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }

    let status = Command::new(ffplay)
        .args(preview_args(path))
        .status()
        .map_err(|_| Error::FfplayNotFound)?;

    if !status.success() {
        return Err(Error::PreviewFailed(format!("ffplay exited with {status}")));
    }
    Ok(())
}
