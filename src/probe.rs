use crate::error::{Error, Result, failure_detail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

/// A decoded source video as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceClip {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    pub frame_rate: Option<f64>,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<StreamInfo>,
    format: FormatInfo,
}

#[derive(Deserialize)]
struct StreamInfo {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

fn parse_frame_rate(raw: &str) -> Option<f64> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() == 2 {
        let numerator: f64 = parts[0].parse().ok()?;
        let denominator: f64 = parts[1].parse().ok()?;
        if denominator > 0.0 {
            return Some(numerator / denominator);
        }
        return None;
    }
    raw.parse().ok()
}

fn parse_probe_output(stdout: &[u8]) -> Result<SourceClip> {
    let parsed: FfprobeOutput = serde_json::from_slice(stdout)?;

    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| Error::ProbeFailed("no video stream found".into()))?;

    let width = stream
        .width
        .ok_or_else(|| Error::ProbeFailed("missing width".into()))?;

    let height = stream
        .height
        .ok_or_else(|| Error::ProbeFailed("missing height".into()))?;

    // "0/0" is how ffprobe spells an unknown rate
    let frame_rate = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .filter_map(|rate| rate.as_deref().and_then(parse_frame_rate))
        .find(|rate| rate.is_finite() && *rate > 0.0);

    let duration_secs = parsed
        .format
        .duration
        .as_deref()
        .and_then(|duration| duration.parse::<f64>().ok())
        .ok_or_else(|| Error::ProbeFailed("missing duration".into()))?;

    Ok(SourceClip {
        width,
        height,
        duration_secs,
        frame_rate,
    })
}

pub fn probe(ffprobe: &Path, path: &Path) -> Result<SourceClip> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate",
            "-show_entries",
            "format=duration",
        ])
        .arg(path)
        .output()
        .map_err(|_| Error::FfprobeNotFound)?;

    if !output.status.success() {
        return Err(Error::ProbeFailed(failure_detail(
            "ffprobe",
            &output.stderr,
            output.status,
        )));
    }

    let clip = parse_probe_output(&output.stdout)?;
    tracing::debug!(
        path = %path.display(),
        width = clip.width,
        height = clip.height,
        duration_secs = clip.duration_secs,
        frame_rate = ?clip.frame_rate,
        "probed source clip"
    );
    Ok(clip)
}
