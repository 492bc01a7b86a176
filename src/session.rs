//! One user action, from "file picked" to "video ready" or "error shown".

use crate::backend::VideoBackend;
use crate::error::Error;
use crate::settings::LoopSettings;
use crate::Rendered;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    AwaitingUpload,
    Processing,
    Succeeded,
    Failed,
    Rejected,
}

#[derive(Debug)]
pub enum Outcome {
    /// Triggered without a file; nothing was started.
    Rejected(Error),
    Succeeded(Rendered),
    Failed(Error),
}

impl Outcome {
    pub fn message(&self) -> String {
        match self {
            Outcome::Rejected(warning) => warning.to_string(),
            Outcome::Succeeded(rendered) => {
                format!("video processed successfully: {}", rendered.path.display())
            }
            Outcome::Failed(error) => format!("error while processing video: {error}"),
        }
    }
}

pub struct Request {
    settings: LoopSettings,
    destination: PathBuf,
    input: Option<PathBuf>,
    state: RequestState,
}

impl Request {
    pub fn new(settings: LoopSettings, destination: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            destination: destination.into(),
            input: None,
            state: RequestState::Idle,
        }
    }

    pub fn attach(&mut self, input: impl Into<PathBuf>) {
        self.input = Some(input.into());
        self.transition(RequestState::AwaitingUpload);
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    fn transition(&mut self, next: RequestState) {
        tracing::debug!(from = ?self.state, to = ?next, "request state");
        self.state = next;
    }

    /// Runs the whole pipeline synchronously. Nothing from an earlier trigger
    /// is reused apart from the settings and the attached file.
    pub fn trigger(
        &mut self,
        backend: &impl VideoBackend,
        on_progress: impl FnMut(&str),
    ) -> Outcome {
        let Some(input) = self.input.clone() else {
            self.transition(RequestState::Rejected);
            tracing::warn!("triggered without an input file");
            return Outcome::Rejected(Error::MissingInput);
        };

        self.transition(RequestState::Processing);
        tracing::info!(
            input = %input.display(),
            mode = %self.settings.mode,
            resolution = %self.settings.resolution,
            duration = %self.settings.duration,
            "processing request"
        );

        match crate::process(
            &input,
            &self.settings,
            &self.destination,
            backend,
            on_progress,
        ) {
            Ok(rendered) => {
                self.transition(RequestState::Succeeded);
                Outcome::Succeeded(rendered)
            }
            Err(error) => {
                tracing::error!(%error, "processing failed");
                self.transition(RequestState::Failed);
                Outcome::Failed(error)
            }
        }
    }
}
