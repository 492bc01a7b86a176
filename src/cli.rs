use clap::Parser;
use std::path::PathBuf;
use vidloop::DEFAULT_OUTPUT_NAME;
use vidloop::settings::{LoopMode, LoopSettings, Resolution, TargetDuration};

#[derive(Parser)]
#[command(
    name = "vidloop",
    version,
    about = "Loop a video clip to a target duration"
)]
pub struct Cli {
    /// Video to loop (mp4, mov, mkv or avi)
    pub input: Option<PathBuf>,

    #[arg(short, long, default_value = DEFAULT_OUTPUT_NAME, help = "Where to write the looped video")]
    pub output: PathBuf,

    #[arg(short, long, value_enum, default_value_t = LoopMode::Normal, help = "Looping mode")]
    pub mode: LoopMode,

    #[arg(short, long, value_enum, default_value_t = Resolution::Sd480, help = "Output resolution")]
    pub resolution: Resolution,

    #[arg(
        short,
        long,
        default_value = "20",
        help = "Target duration in whole seconds (5 to 600)"
    )]
    pub duration: TargetDuration,

    #[arg(long, help = "Play the result with ffplay once it is written")]
    pub preview: bool,

    #[arg(long, help = "Print a JSON summary of the render to stdout")]
    pub json: bool,

    #[arg(long, default_value = "ffmpeg", help = "ffmpeg executable")]
    pub ffmpeg_bin: PathBuf,

    #[arg(long, default_value = "ffprobe", help = "ffprobe executable")]
    pub ffprobe_bin: PathBuf,

    #[arg(long, default_value = "ffplay", help = "ffplay executable")]
    pub ffplay_bin: PathBuf,
}

impl Cli {
    pub fn settings(&self) -> LoopSettings {
        LoopSettings {
            mode: self.mode,
            resolution: self.resolution,
            duration: self.duration,
        }
    }
}
