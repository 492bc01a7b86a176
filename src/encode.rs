use crate::error::{Error, Result, failure_detail};
use crate::timeline::{Playback, Segment, Timeline};
use std::path::{Path, PathBuf};
use std::process::Command;

pub const DEFAULT_FPS: u32 = 30;
pub const VIDEO_CODEC: &str = "libx264";

/// Upper bound on `-i` inputs, and so on open decoders, in one ffmpeg run.
pub const MAX_INPUTS_PER_PASS: usize = 16;

const OUTPUT_LABEL: &str = "vout";
const KEEP_LABEL: &str = "vkeep";

pub struct RenderJob {
    pub input: PathBuf,
    pub timeline: Timeline,
    pub height: u32,
    pub fps: u32,
}

/// Whole frames per second of the source, or [`DEFAULT_FPS`] when unknown.
pub fn output_frame_rate(source: Option<f64>) -> u32 {
    match source {
        Some(rate) if rate.is_finite() && rate >= 1.0 => rate as u32,
        _ => DEFAULT_FPS,
    }
}

/// A run of consecutive crossfade copies rendered in one ffmpeg pass.
///
/// Only `keep_from_secs..keep_until_secs` (measured from the batch's first
/// copy) is kept. Inside that window every copy still fading in over an
/// earlier one is part of the batch, so the frames match a single-pass render.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub first: usize,
    pub count: usize,
    pub keep_from_secs: f64,
    pub keep_until_secs: f64,
}

impl Batch {
    pub fn kept_secs(&self) -> f64 {
        self.keep_until_secs - self.keep_from_secs
    }
}

/// Splits a crossfade timeline into batches of at most [`MAX_INPUTS_PER_PASS`]
/// copies whose kept windows tile `0..output_secs`.
pub fn crossfade_batches(timeline: &Timeline) -> Result<Vec<Batch>> {
    let count = timeline.repeat_count();
    let limit = timeline.output_secs();
    let fade_secs = timeline
        .segments
        .iter()
        .skip(1)
        .map(|segment| segment.fade_in_secs)
        .fold(0.0, f64::max);
    let step_secs = timeline.clip_secs - fade_secs;

    if count <= 1 || step_secs <= 0.0 {
        // every copy starts on the same frame, so one copy is the whole picture
        return Ok(vec![Batch {
            first: 0,
            count: 1,
            keep_from_secs: 0.0,
            keep_until_secs: limit,
        }]);
    }
    if count <= MAX_INPUTS_PER_PASS {
        return Ok(vec![Batch {
            first: 0,
            count,
            keep_from_secs: 0.0,
            keep_until_secs: limit,
        }]);
    }

    // copies a batch has to repeat from its predecessor before its frames are exact
    let lookback = (fade_secs / step_secs).ceil() as usize;
    if lookback >= MAX_INPUTS_PER_PASS {
        return Err(Error::InvalidSource(format!(
            "clip of {}s is too short to crossfade: copies would start {:.3}s apart",
            timeline.clip_secs, step_secs
        )));
    }

    let mut batches = Vec::new();
    let mut first = 0;
    let mut window_start = 0.0;
    loop {
        let batch_count = MAX_INPUTS_PER_PASS.min(count - first);
        let origin = first as f64 * step_secs;
        let next_first = (first + batch_count < count).then(|| first + batch_count - lookback);
        let window_end = match next_first {
            Some(next) => (next as f64 * step_secs + fade_secs).min(limit),
            None => limit,
        };

        batches.push(Batch {
            first,
            count: batch_count,
            keep_from_secs: window_start - origin,
            keep_until_secs: window_end - origin,
        });

        match next_first {
            Some(next) if window_end < limit => {
                window_start = window_end;
                first = next;
            }
            _ => break,
        }
    }
    Ok(batches)
}

/// The ffmpeg runs that produce one render.
#[derive(Debug)]
pub struct RenderPlan {
    /// Argument lists, run in order; the last one writes the output.
    pub passes: Vec<Vec<String>>,
    /// Concat list to write before the passes run, when the render is split into chunks.
    pub concat_list: Option<(PathBuf, String)>,
}

impl RenderPlan {
    fn single(args: Vec<String>) -> Self {
        Self {
            passes: vec![args],
            concat_list: None,
        }
    }

    pub fn input_count(&self) -> usize {
        self.passes
            .iter()
            .map(|args| args.iter().filter(|arg| *arg == "-i").count())
            .max()
            .unwrap_or(0)
    }
}

/// Lays out the ffmpeg runs for `job`. Chunk files, if any, go in `scratch`.
pub fn plan(job: &RenderJob, output: &Path, scratch: &Path) -> Result<RenderPlan> {
    let timeline = &job.timeline;

    if timeline.is_plain_repeat() {
        return Ok(RenderPlan::single(looped_args(job, output)));
    }
    if timeline
        .segments
        .iter()
        .all(|segment| segment.fade_in_secs == 0.0)
    {
        return Ok(RenderPlan::single(sequence_args(job, output)));
    }

    let batches = crossfade_batches(timeline)?;
    if let [batch] = batches.as_slice() {
        return Ok(RenderPlan::single(batch_args(job, batch, output)));
    }

    let mut passes = Vec::with_capacity(batches.len() + 1);
    let mut list = String::new();
    for (index, batch) in batches.iter().enumerate() {
        let chunk = scratch.join(format!("chunk-{index:04}.mp4"));
        passes.push(batch_args(job, batch, &chunk));
        list.push_str(&concat_entry(&chunk));
    }

    let list_path = scratch.join("chunks.txt");
    passes.push(concat_args(&list_path, timeline.output_secs(), output));
    Ok(RenderPlan {
        passes,
        concat_list: Some((list_path, list)),
    })
}

fn normalize_chain(input_index: usize, height: u32, fps: u32) -> String {
    format!("[{input_index}:v]scale=-2:{height},setsar=1,fps={fps}")
}

/// One normalized chain per segment, labelled `s<i>`, or `vout` for a lone segment.
fn segment_chains(segments: &[Segment], height: u32, fps: u32) -> Vec<String> {
    let count = segments.len();
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let mut chain = normalize_chain(index, height, fps);
            if segment.playback == Playback::Reversed {
                chain.push_str(",reverse");
            }
            if count == 1 {
                chain.push_str(&format!("[{OUTPUT_LABEL}]"));
            } else {
                chain.push_str(&format!("[s{index}]"));
            }
            chain
        })
        .collect()
}

fn crossfade_graph(segments: &[Segment], clip_secs: f64, height: u32, fps: u32) -> String {
    let count = segments.len();
    let mut filters = segment_chains(segments, height, fps);

    let mut accumulated_secs = clip_secs;
    let mut current_label = "s0".to_string();

    // the first copy of a batch is laid down plain, whatever its fade
    for (index, segment) in segments.iter().enumerate().skip(1) {
        let fade_secs = segment.fade_in_secs;
        let offset_secs = (accumulated_secs - fade_secs).max(0.0);
        let out_label = if index == count - 1 {
            OUTPUT_LABEL.to_string()
        } else {
            format!("x{index}")
        };

        if fade_secs > 0.0 {
            filters.push(format!(
                "[{current_label}][s{index}]xfade=transition=fade:duration={fade_secs:.3}:offset={offset_secs:.3}[{out_label}]"
            ));
        } else {
            filters.push(format!(
                "[{current_label}][s{index}]concat=n=2:v=1:a=0[{out_label}]"
            ));
        }

        accumulated_secs += clip_secs - fade_secs;
        current_label = out_label;
    }

    filters.join(";")
}

fn repeated_inputs(input: &Path, count: usize) -> Vec<String> {
    let input = input.to_string_lossy().into_owned();
    (0..count)
        .flat_map(|_| ["-i".to_string(), input.clone()])
        .collect()
}

fn encode_args(
    inputs: Vec<String>,
    graph: String,
    label: &str,
    fps: u32,
    duration_secs: f64,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-nostdin", "-v", "error"]
        .into_iter()
        .map(String::from)
        .collect();

    args.extend(inputs);
    args.extend(["-filter_complex".into(), graph]);
    args.extend(["-map".into(), format!("[{label}]")]);
    args.push("-an".into());
    args.extend(["-c:v".into(), VIDEO_CODEC.into()]);
    args.extend(["-pix_fmt".into(), "yuv420p".into()]);
    args.extend(["-r".into(), fps.to_string()]);
    args.extend(["-t".into(), format!("{duration_secs:.3}")]);
    args.extend(["-movflags".into(), "+faststart".into()]);
    args.extend(["-f".into(), "mp4".into()]);
    args.push(output.to_string_lossy().into_owned());

    args
}

/// Plain repetition: one input, looped by the demuxer.
fn looped_args(job: &RenderJob, output: &Path) -> Vec<String> {
    let extra_loops = job.timeline.repeat_count().saturating_sub(1);
    let mut inputs = vec!["-stream_loop".to_string(), extra_loops.to_string()];
    inputs.extend(repeated_inputs(&job.input, 1));

    encode_args(
        inputs,
        format!("{}[{OUTPUT_LABEL}]", normalize_chain(0, job.height, job.fps)),
        OUTPUT_LABEL,
        job.fps,
        job.timeline.output_secs(),
        output,
    )
}

/// Segments played back to back, some of them reversed.
fn sequence_args(job: &RenderJob, output: &Path) -> Vec<String> {
    let segments = &job.timeline.segments;
    let count = segments.len();
    let mut filters = segment_chains(segments, job.height, job.fps);
    if count > 1 {
        let labels: String = (0..count).map(|index| format!("[s{index}]")).collect();
        filters.push(format!(
            "{labels}concat=n={count}:v=1:a=0[{OUTPUT_LABEL}]"
        ));
    }

    encode_args(
        repeated_inputs(&job.input, count),
        filters.join(";"),
        OUTPUT_LABEL,
        job.fps,
        job.timeline.output_secs(),
        output,
    )
}

fn batch_args(job: &RenderJob, batch: &Batch, output: &Path) -> Vec<String> {
    let segments = &job.timeline.segments[batch.first..batch.first + batch.count];
    let mut graph = crossfade_graph(segments, job.timeline.clip_secs, job.height, job.fps);

    let label = if batch.keep_from_secs > 0.0 {
        graph.push_str(&format!(
            ";[{OUTPUT_LABEL}]trim=start={:.3},setpts=PTS-STARTPTS[{KEEP_LABEL}]",
            batch.keep_from_secs
        ));
        KEEP_LABEL
    } else {
        OUTPUT_LABEL
    };

    encode_args(
        repeated_inputs(&job.input, batch.count),
        graph,
        label,
        job.fps,
        batch.kept_secs(),
        output,
    )
}

fn concat_entry(chunk: &Path) -> String {
    let path = chunk.to_string_lossy().replace('\'', r"'\''");
    format!("file '{path}'\n")
}

/// Joins encoded chunks without re-encoding them.
fn concat_args(list: &Path, duration_secs: f64, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-nostdin", "-v", "error", "-f", "concat", "-safe", "0"]
        .into_iter()
        .map(String::from)
        .collect();

    args.extend(["-i".into(), list.to_string_lossy().into_owned()]);
    args.extend(["-map".into(), "0:v:0".into()]);
    args.push("-an".into());
    args.extend(["-c".into(), "copy".into()]);
    args.extend(["-t".into(), format!("{duration_secs:.3}")]);
    args.extend(["-movflags".into(), "+faststart".into()]);
    args.extend(["-f".into(), "mp4".into()]);
    args.push(output.to_string_lossy().into_owned());

    args
}

fn run_ffmpeg(ffmpeg: &Path, args: &[String]) -> Result<()> {
    let result = Command::new(ffmpeg)
        .args(args)
        .output()
        .map_err(|_| Error::FfmpegNotFound)?;

    if !result.status.success() {
        return Err(Error::EncodeFailed(failure_detail(
            "ffmpeg",
            &result.stderr,
            result.status,
        )));
    }
    Ok(())
}

/// Encodes the job to `output` and returns the written size in bytes.
pub fn render(ffmpeg: &Path, job: &RenderJob, output: &Path) -> Result<u64> {
    let scratch = tempfile::Builder::new()
        .prefix(crate::staging::TEMP_PREFIX)
        .tempdir()?;
    let plan = plan(job, output, scratch.path())?;

    if let Some((path, contents)) = &plan.concat_list {
        std::fs::write(path, contents)?;
    }

    let total = plan.passes.len();
    for (index, args) in plan.passes.iter().enumerate() {
        tracing::debug!(ffmpeg = %ffmpeg.display(), pass = index + 1, total, ?args, "running ffmpeg");
        run_ffmpeg(ffmpeg, args)?;
    }

    let scratch_path = scratch.path().to_path_buf();
    if let Err(error) = scratch.close() {
        tracing::warn!(path = %scratch_path.display(), %error, "failed to remove render chunks");
    }

    let metadata = std::fs::metadata(output)?;
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{LoopMode, TargetDuration};
    use crate::timeline::assemble;

    const EPSILON: f64 = 1e-9;

    fn job(clip_secs: f64, target: u32, mode: LoopMode) -> RenderJob {
        RenderJob {
            input: PathBuf::from("/tmp/in.mov"),
            timeline: assemble(clip_secs, TargetDuration::new(target).unwrap(), mode).unwrap(),
            height: 720,
            fps: 25,
        }
    }

    fn single_pass(job: &RenderJob) -> Vec<String> {
        let plan = plan(job, Path::new("out.mp4"), Path::new("/scratch")).unwrap();
        assert_eq!(plan.passes.len(), 1);
        assert!(plan.concat_list.is_none());
        plan.passes.into_iter().next().unwrap()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let position = args.iter().position(|arg| arg == flag).unwrap();
        &args[position + 1]
    }

    fn input_count(args: &[String]) -> usize {
        args.iter().filter(|arg| *arg == "-i").count()
    }

    #[test]
    fn frame_rate_truncates_source() {
        assert_eq!(output_frame_rate(Some(29.97)), 29);
        assert_eq!(output_frame_rate(Some(60.0)), 60);
    }

    #[test]
    fn frame_rate_defaults_when_unknown_or_degenerate() {
        assert_eq!(output_frame_rate(None), DEFAULT_FPS);
        assert_eq!(output_frame_rate(Some(0.0)), DEFAULT_FPS);
        assert_eq!(output_frame_rate(Some(-24.0)), DEFAULT_FPS);
        assert_eq!(output_frame_rate(Some(0.5)), DEFAULT_FPS);
        assert_eq!(output_frame_rate(Some(f64::NAN)), DEFAULT_FPS);
    }

    #[test]
    fn normal_mode_loops_a_single_input() {
        let args = single_pass(&job(8.0, 20, LoopMode::Normal));
        assert_eq!(value_after(&args, "-stream_loop"), "2");
        assert_eq!(input_count(&args), 1);
        assert_eq!(
            value_after(&args, "-filter_complex"),
            "[0:v]scale=-2:720,setsar=1,fps=25[vout]"
        );
        assert_eq!(value_after(&args, "-t"), "20.000");
    }

    #[test]
    fn output_is_silent_h264_mp4() {
        let args = single_pass(&job(8.0, 20, LoopMode::Normal));
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(value_after(&args, "-c:v"), "libx264");
        assert_eq!(value_after(&args, "-r"), "25");
        assert_eq!(value_after(&args, "-f"), "mp4");
        assert_eq!(value_after(&args, "-map"), "[vout]");
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn crossfade_chains_xfade_with_overlapping_offsets() {
        let args = single_pass(&job(8.0, 20, LoopMode::Crossfade));
        assert_eq!(input_count(&args), 3);
        assert!(!args.contains(&"-stream_loop".to_string()));

        let graph = value_after(&args, "-filter_complex");
        let filters: Vec<&str> = graph.split(';').collect();
        assert_eq!(filters.len(), 5);
        assert_eq!(filters[0], "[0:v]scale=-2:720,setsar=1,fps=25[s0]");
        assert_eq!(filters[2], "[2:v]scale=-2:720,setsar=1,fps=25[s2]");
        assert_eq!(
            filters[3],
            "[s0][s1]xfade=transition=fade:duration=1.000:offset=7.000[x1]"
        );
        assert_eq!(
            filters[4],
            "[x1][s2]xfade=transition=fade:duration=1.000:offset=14.000[vout]"
        );
        assert_eq!(value_after(&args, "-t"), "20.000");
    }

    #[test]
    fn crossfade_single_copy_is_a_plain_trim() {
        let args = single_pass(&job(30.0, 20, LoopMode::Crossfade));
        assert_eq!(value_after(&args, "-stream_loop"), "0");
        assert!(!value_after(&args, "-filter_complex").contains("xfade"));
    }

    #[test]
    fn crossfade_of_one_second_clip_renders_one_copy() {
        let args = single_pass(&job(1.0, 20, LoopMode::Crossfade));
        assert_eq!(input_count(&args), 1);
        assert_eq!(
            value_after(&args, "-filter_complex"),
            "[0:v]scale=-2:720,setsar=1,fps=25[vout]"
        );
        assert_eq!(value_after(&args, "-t"), "1.000");
    }

    #[test]
    fn long_crossfade_keeps_decoders_bounded() {
        let job = job(1.5, 600, LoopMode::Crossfade);
        assert_eq!(job.timeline.repeat_count(), 401);

        let plan = plan(&job, Path::new("out.mp4"), Path::new("/scratch")).unwrap();
        assert!(plan.input_count() <= MAX_INPUTS_PER_PASS);
        for args in &plan.passes {
            let graph = args
                .iter()
                .position(|arg| arg == "-filter_complex")
                .map(|position| args[position + 1].as_str())
                .unwrap_or("");
            assert!(graph.matches("xfade").count() < MAX_INPUTS_PER_PASS);
        }

        let concat = plan.passes.last().unwrap();
        assert_eq!(value_after(concat, "-f"), "concat");
        assert_eq!(value_after(concat, "-c"), "copy");
        assert_eq!(value_after(concat, "-i"), "/scratch/chunks.txt");
        assert_eq!(value_after(concat, "-t"), "201.500");
        assert_eq!(concat.last().unwrap(), "out.mp4");

        let (list_path, list) = plan.concat_list.unwrap();
        assert_eq!(list_path, PathBuf::from("/scratch/chunks.txt"));
        assert_eq!(list.lines().count(), plan.passes.len() - 1);
        assert_eq!(list.lines().next().unwrap(), "file '/scratch/chunk-0000.mp4'");
    }

    #[test]
    fn crossfade_batches_tile_the_output() {
        let job = job(1.5, 600, LoopMode::Crossfade);
        let batches = crossfade_batches(&job.timeline).unwrap();
        let step_secs = 0.5;

        let mut covered = 0.0;
        for batch in &batches {
            assert!(batch.count <= MAX_INPUTS_PER_PASS);
            assert!(batch.kept_secs() > 0.0);
            let window_start = batch.first as f64 * step_secs + batch.keep_from_secs;
            assert!((window_start - covered).abs() < EPSILON);
            covered += batch.kept_secs();
        }
        assert!((covered - job.timeline.output_secs()).abs() < EPSILON);
        assert_eq!(batches.last().unwrap().first + batches.last().unwrap().count, 401);
    }

    #[test]
    fn later_batches_drop_their_unfaded_start() {
        let job = job(1.5, 600, LoopMode::Crossfade);
        let batches = crossfade_batches(&job.timeline).unwrap();
        assert_eq!(batches[0].keep_from_secs, 0.0);
        assert_eq!(batches[1].first, 14);
        assert!((batches[1].keep_from_secs - 1.0).abs() < EPSILON);
        assert!((batches[1].keep_until_secs - 8.0).abs() < EPSILON);

        let args = batch_args(&job, &batches[1], Path::new("chunk.mp4"));
        assert_eq!(input_count(&args), MAX_INPUTS_PER_PASS);
        assert!(value_after(&args, "-filter_complex")
            .ends_with(";[vout]trim=start=1.000,setpts=PTS-STARTPTS[vkeep]"));
        assert_eq!(value_after(&args, "-map"), "[vkeep]");
        assert_eq!(value_after(&args, "-t"), "7.000");
    }

    #[test]
    fn crossfade_with_copies_too_close_together_is_rejected() {
        let job = job(1.0625, 60, LoopMode::Crossfade);
        assert!(matches!(
            plan(&job, Path::new("out.mp4"), Path::new("/scratch")),
            Err(Error::InvalidSource(_))
        ));
    }

    #[test]
    fn concat_entries_escape_quotes() {
        assert_eq!(
            concat_entry(Path::new("/tmp/it's/chunk-0001.mp4")),
            "file '/tmp/it'\\''s/chunk-0001.mp4'\n"
        );
    }

    #[test]
    fn ping_pong_concatenates_reversed_copy() {
        let args = single_pass(&job(15.0, 20, LoopMode::PingPong));
        assert_eq!(input_count(&args), 2);
        assert_eq!(
            value_after(&args, "-filter_complex"),
            "[0:v]scale=-2:720,setsar=1,fps=25[s0];\
             [1:v]scale=-2:720,setsar=1,fps=25,reverse[s1];\
             [s0][s1]concat=n=2:v=1:a=0[vout]"
        );
        assert_eq!(value_after(&args, "-t"), "20.000");
    }

    #[test]
    fn ping_pong_undershoot_trims_to_assembled_length() {
        let args = single_pass(&job(4.0, 60, LoopMode::PingPong));
        assert_eq!(value_after(&args, "-t"), "8.000");
    }
}
