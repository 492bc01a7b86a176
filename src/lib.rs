pub mod backend;
pub mod encode;
pub mod error;
pub mod preview;
pub mod probe;
pub mod session;
pub mod settings;
pub mod staging;
pub mod timeline;

use backend::VideoBackend;
use encode::RenderJob;
use error::Result;
use serde::Serialize;
use settings::{LoopMode, LoopSettings, Resolution};
use staging::{OutputSlot, StagedInput};
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT_NAME: &str = "looped_video.mp4";

/// Summary of a finished render.
#[derive(Debug, Clone, Serialize)]
pub struct Rendered {
    pub path: PathBuf,
    pub mode: LoopMode,
    pub resolution: Resolution,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub source_secs: f64,
    pub repeat_count: usize,
    pub assembled_secs: f64,
    pub output_secs: f64,
    pub size_bytes: u64,
}

fn describe_frame_rate(frame_rate: Option<f64>) -> String {
    match frame_rate {
        Some(rate) => format!("{rate:.2}fps"),
        None => "unknown fps".to_string(),
    }
}

/// Loops `input` according to `settings` and publishes the result at `destination`.
///
/// The input is copied to a private temporary file first; that copy and any
/// half-written output are removed whether or not the run succeeds.
pub fn process(
    input: &Path,
    settings: &LoopSettings,
    destination: &Path,
    backend: &impl VideoBackend,
    mut on_progress: impl FnMut(&str),
) -> Result<Rendered> {
    let staged = StagedInput::acquire(input)?;
    let result = render_staged(
        staged.path(),
        settings,
        destination,
        backend,
        &mut on_progress,
    );
    staged.release();
    result
}

fn render_staged(
    staged: &Path,
    settings: &LoopSettings,
    destination: &Path,
    backend: &impl VideoBackend,
    on_progress: &mut impl FnMut(&str),
) -> Result<Rendered> {
    let clip = backend.probe(staged)?;
    on_progress(&format!(
        "input: {}x{}, {}, {:.1}s",
        clip.width,
        clip.height,
        describe_frame_rate(clip.frame_rate),
        clip.duration_secs
    ));

    let timeline = timeline::assemble(clip.duration_secs, settings.duration, settings.mode)?;
    let fps = encode::output_frame_rate(clip.frame_rate);
    let width = settings.resolution.scaled_width(clip.width, clip.height);
    let height = settings.resolution.height();

    let repeat_count = timeline.repeat_count();
    let assembled_secs = timeline.assembled_secs();
    let output_secs = timeline.output_secs();

    on_progress(&format!(
        "{} loop: {} segment(s), {:.1}s assembled, trimmed to {:.1}s",
        settings.mode, repeat_count, assembled_secs, output_secs
    ));
    if output_secs < settings.duration.as_secs_f64() {
        on_progress(&format!(
            "  note: {} mode falls short of the {} target",
            settings.mode, settings.duration
        ));
    }

    let job = RenderJob {
        input: staged.to_path_buf(),
        timeline,
        height,
        fps,
    };

    let slot = OutputSlot::beside(destination)?;
    on_progress(&format!(
        "encoding {}x{} @ {}fps -> {}",
        width,
        height,
        fps,
        destination.display()
    ));

    let size_bytes = match backend.render(&job, slot.path()) {
        Ok(size) => size,
        Err(error) => {
            slot.discard();
            return Err(error);
        }
    };
    let path = slot.persist(destination)?;

    on_progress(&format!(
        "done: {:.2} MB written to {}",
        size_bytes as f64 / (1024.0 * 1024.0),
        path.display()
    ));

    Ok(Rendered {
        path,
        mode: settings.mode,
        resolution: settings.resolution,
        width,
        height,
        fps,
        source_secs: clip.duration_secs,
        repeat_count,
        assembled_secs,
        output_secs,
        size_bytes,
    })
}
