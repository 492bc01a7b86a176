//! Loop assembly: how many copies of the source clip to lay down for a loop
//! mode, how they overlap, and where the result gets trimmed.

use crate::error::{Error, Result};
use crate::settings::{LoopMode, TargetDuration};
use serde::Serialize;

/// Length of the transition between consecutive crossfade copies.
pub const CROSSFADE_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Playback {
    Forward,
    Reversed,
}

/// One copy of the source clip on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub playback: Playback,
    /// Overlap with the previous segment, faded in over the same span.
    pub fade_in_secs: f64,
}

impl Segment {
    fn plain(playback: Playback) -> Self {
        Self {
            playback,
            fade_in_secs: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub mode: LoopMode,
    pub clip_secs: f64,
    pub target: TargetDuration,
    pub segments: Vec<Segment>,
}

impl Timeline {
    pub fn repeat_count(&self) -> usize {
        self.segments.len()
    }

    /// Length of the concatenated segments before trimming.
    pub fn assembled_secs(&self) -> f64 {
        let overlap: f64 = self
            .segments
            .iter()
            .map(|segment| segment.fade_in_secs)
            .sum();
        (self.segments.len() as f64 * self.clip_secs - overlap).max(0.0)
    }

    /// Final output length: the target, or less when the loop mode undershoots.
    pub fn output_secs(&self) -> f64 {
        self.target.as_secs_f64().min(self.assembled_secs()).max(0.0)
    }

    /// Whether the timeline is a plain repetition of the forward clip.
    pub fn is_plain_repeat(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| segment.playback == Playback::Forward && segment.fade_in_secs == 0.0)
    }
}

fn validate_clip(clip_secs: f64) -> Result<()> {
    if !clip_secs.is_finite() || clip_secs <= 0.0 {
        return Err(Error::InvalidSource(format!(
            "clip duration must be positive, got {clip_secs}"
        )));
    }
    Ok(())
}

/// `floor(target / clip) + 1`, so that plain repetition always covers the target.
pub fn repeat_count(target: TargetDuration, clip_secs: f64) -> Result<usize> {
    validate_clip(clip_secs)?;

    let count = (target.as_secs_f64() / clip_secs).floor() + 1.0;
    if count > u32::MAX as f64 {
        return Err(Error::InvalidSource(format!(
            "clip of {clip_secs}s is too short to loop to {target}"
        )));
    }
    Ok(count as usize)
}

pub fn assemble(clip_secs: f64, target: TargetDuration, mode: LoopMode) -> Result<Timeline> {
    validate_clip(clip_secs)?;

    let segments = match mode {
        LoopMode::Normal => {
            let count = repeat_count(target, clip_secs)?;
            vec![Segment::plain(Playback::Forward); count]
        }
        LoopMode::Crossfade => {
            let count = repeat_count(target, clip_secs)?;
            if count > 1 && clip_secs < CROSSFADE_SECS {
                return Err(Error::InvalidSource(format!(
                    "clip of {clip_secs}s is too short for a {CROSSFADE_SECS}s crossfade"
                )));
            }
            let mut segments = Vec::with_capacity(count);
            segments.push(Segment::plain(Playback::Forward));
            segments.extend((1..count).map(|_| Segment {
                playback: Playback::Forward,
                fade_in_secs: CROSSFADE_SECS,
            }));
            segments
        }
        LoopMode::PingPong => vec![
            Segment::plain(Playback::Forward),
            Segment::plain(Playback::Reversed),
        ],
    };

    Ok(Timeline {
        mode,
        clip_secs,
        target,
        segments,
    })
}
