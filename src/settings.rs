use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_DURATION_SECS: u32 = 5;
pub const MAX_DURATION_SECS: u32 = 600;
pub const DEFAULT_DURATION_SECS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LoopMode {
    /// Back-to-back copies with hard cuts
    #[default]
    Normal,
    /// Copies overlapping by a one second crossfade
    Crossfade,
    /// The clip followed by its time-reversed copy
    PingPong,
}

impl fmt::Display for LoopMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopMode::Normal => "normal",
            LoopMode::Crossfade => "crossfade",
            LoopMode::PingPong => "ping-pong",
        };
        formatter.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Resolution {
    #[default]
    #[value(name = "480p")]
    #[serde(rename = "480p")]
    Sd480,
    #[value(name = "720p")]
    #[serde(rename = "720p")]
    Hd720,
    #[value(name = "1080p")]
    #[serde(rename = "1080p")]
    FullHd1080,
}

impl Resolution {
    pub fn height(self) -> u32 {
        match self {
            Resolution::Sd480 => 480,
            Resolution::Hd720 => 720,
            Resolution::FullHd1080 => 1080,
        }
    }

    /// Width after scaling to this height with the aspect ratio kept, rounded
    /// to the even value ffmpeg picks for `scale=-2:<height>`.
    pub fn scaled_width(self, width: u32, height: u32) -> u32 {
        if height == 0 {
            return 0;
        }
        let exact = width as f64 * self.height() as f64 / height as f64;
        let even = (exact / 2.0).round() * 2.0;
        (even as u32).max(2)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}p", self.height())
    }
}

/// Requested output length in whole seconds, within `5..=600`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TargetDuration(u32);

impl TargetDuration {
    pub fn new(secs: u32) -> Result<Self> {
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&secs) {
            return Err(Error::InvalidInput(format!(
                "target duration must be between {MIN_DURATION_SECS} and {MAX_DURATION_SECS} seconds, got {secs}"
            )));
        }
        Ok(Self(secs))
    }

    pub fn secs(self) -> u32 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64
    }
}

impl Default for TargetDuration {
    fn default() -> Self {
        Self(DEFAULT_DURATION_SECS)
    }
}

impl TryFrom<u32> for TargetDuration {
    type Error = Error;

    fn try_from(secs: u32) -> Result<Self> {
        Self::new(secs)
    }
}

impl From<TargetDuration> for u32 {
    fn from(duration: TargetDuration) -> Self {
        duration.0
    }
}

impl FromStr for TargetDuration {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let secs = raw
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::InvalidInput(format!("not a whole number of seconds: {raw}")))?;
        Self::new(secs)
    }
}

impl fmt::Display for TargetDuration {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}s", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoopSettings {
    pub mode: LoopMode,
    pub resolution: Resolution,
    pub duration: TargetDuration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_heights() {
        assert_eq!(Resolution::Sd480.height(), 480);
        assert_eq!(Resolution::Hd720.height(), 720);
        assert_eq!(Resolution::FullHd1080.height(), 1080);
    }

    #[test]
    fn scaled_width_keeps_aspect_ratio() {
        assert_eq!(Resolution::Hd720.scaled_width(1920, 1080), 1280);
        assert_eq!(Resolution::Sd480.scaled_width(1920, 1080), 854);
        assert_eq!(Resolution::FullHd1080.scaled_width(640, 480), 1440);
    }

    #[test]
    fn scaled_width_allows_upscaling_portrait() {
        assert_eq!(Resolution::FullHd1080.scaled_width(360, 640), 608);
    }

    #[test]
    fn scaled_width_is_even() {
        let width = Resolution::Hd720.scaled_width(1001, 999);
        assert_eq!(width % 2, 0);
    }

    #[test]
    fn target_duration_bounds() {
        assert!(TargetDuration::new(4).is_err());
        assert!(TargetDuration::new(5).is_ok());
        assert!(TargetDuration::new(600).is_ok());
        assert!(TargetDuration::new(601).is_err());
    }

    #[test]
    fn target_duration_accepts_values_off_the_step() {
        assert_eq!(TargetDuration::new(7).unwrap().secs(), 7);
    }

    #[test]
    fn target_duration_default_is_twenty_seconds() {
        assert_eq!(TargetDuration::default().secs(), 20);
    }

    #[test]
    fn target_duration_parses_from_str() {
        assert_eq!("45".parse::<TargetDuration>().unwrap().secs(), 45);
        assert!("abc".parse::<TargetDuration>().is_err());
        assert!("-5".parse::<TargetDuration>().is_err());
        assert!("1000".parse::<TargetDuration>().is_err());
    }

    #[test]
    fn settings_serialize_with_display_names() {
        let settings = LoopSettings {
            mode: LoopMode::PingPong,
            resolution: Resolution::Hd720,
            duration: TargetDuration::new(30).unwrap(),
        };
        let json = serde_json::to_value(settings).unwrap();
        assert_eq!(json["mode"], "ping-pong");
        assert_eq!(json["resolution"], "720p");
        assert_eq!(json["duration"], 30);
    }

    #[test]
    fn settings_reject_out_of_range_duration_when_deserializing() {
        let raw = r#"{"mode":"normal","resolution":"480p","duration":2}"#;
        assert!(serde_json::from_str::<LoopSettings>(raw).is_err());
    }

    #[test]
    fn display_names() {
        assert_eq!(LoopMode::Crossfade.to_string(), "crossfade");
        assert_eq!(Resolution::FullHd1080.to_string(), "1080p");
        assert_eq!(TargetDuration::new(20).unwrap().to_string(), "20s");
    }
}
