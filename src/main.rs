mod cli;

use clap::Parser;
use cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vidloop::backend::Ffmpeg;
use vidloop::session::{Outcome, Request};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = Cli::parse();

    let backend = Ffmpeg {
        ffmpeg: args.ffmpeg_bin.clone(),
        ffprobe: args.ffprobe_bin.clone(),
    };

    let mut request = Request::new(args.settings(), args.output.clone());
    if let Some(input) = &args.input {
        request.attach(input);
    }

    let rendered = match request.trigger(&backend, |message| eprintln!("{message}")) {
        Outcome::Succeeded(rendered) => rendered,
        Outcome::Rejected(warning) => {
            eprintln!("warning: {warning}");
            return ExitCode::from(2);
        }
        failed @ Outcome::Failed(_) => {
            eprintln!("{}", failed.message());
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&rendered) {
            Ok(summary) => println!("{summary}"),
            Err(error) => {
                eprintln!("error: {error}");
                return ExitCode::FAILURE;
            }
        }
    }

    if args.preview {
        if let Err(error) = vidloop::preview::preview(&args.ffplay_bin, &rendered.path) {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
