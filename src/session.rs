//src/session.rs

use std::path::{Path, PathBuf};

use crate::artifact::OutputArtifact;
use crate::channel::{TranscoderWorker, WorkerEvent};
use crate::config::TranscodeConfig;
use crate::engine::{EngineAdapter, RaceKernel};
use crate::error::{ErrorKind, TranscodeError};
use crate::source::InputSource;

/// User-facing state of a session.
#[derive(Debug)]
pub enum SessionState {
    /// Ready for a submission.
    Idle,
    /// A run is in flight; `progress` is the latest percentage seen.
    Submitted { progress: f64 },
    /// A run finished and its output is waiting to be downloaded.
    Done { artifact: OutputArtifact },
}

/// Last run failure, kept so the caller can show it after the reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Owns a background transcoder and turns user intent (submit, download)
/// into control messages.
pub struct SessionController {
    config: TranscodeConfig,
    worker: TranscoderWorker,
    state: SessionState,
    last_error: Option<SessionError>,
}

impl SessionController {
    /// Session over the built-in downsampling engine.
    pub fn new(config: TranscodeConfig) -> Result<Self, TranscodeError> {
        config.validate()?;
        let worker = TranscoderWorker::spawn(
            || EngineAdapter::new(RaceKernel::new()),
            config.transcoder_options(),
        )?;
        Ok(Self::with_worker(config, worker))
    }

    pub fn with_worker(config: TranscodeConfig, worker: TranscoderWorker) -> Self {
        Self {
            config,
            worker,
            state: SessionState::Idle,
            last_error: None,
        }
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn progress(&self) -> f64 {
        match &self.state {
            SessionState::Idle => 0.0,
            SessionState::Submitted { progress } => *progress,
            SessionState::Done { .. } => 100.0,
        }
    }

    /// Submit `source` with the session's parameters. An undownloaded
    /// result from a previous run is discarded.
    pub fn submit(&mut self, source: Box<dyn InputSource>) -> Result<(), TranscodeError> {
        if let SessionState::Submitted { .. } = self.state {
            return Err(TranscodeError::Busy);
        }
        let params = self.config.submission(source)?;
        log::info!("submitting {:?}", params);
        self.worker.submit(params)?;
        self.state = SessionState::Submitted { progress: 0.0 };
        self.last_error = None;
        Ok(())
    }

    /// Apply one worker event to the session state.
    pub fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Progress(p) => {
                if let SessionState::Submitted { progress } = &mut self.state {
                    *progress = p.max(*progress);
                }
            }
            WorkerEvent::Finished(artifact) => {
                self.state = SessionState::Done { artifact };
            }
            WorkerEvent::Error { kind, message } => {
                log::debug!("session back to idle after {:?} error", kind);
                self.last_error = Some(SessionError { kind, message });
                self.state = SessionState::Idle;
            }
        }
    }

    /// Process events already waiting, without blocking.
    pub fn poll(&mut self) -> Result<(), TranscodeError> {
        while let Some(event) = self.worker.try_recv_event()? {
            self.handle_event(event);
        }
        Ok(())
    }

    /// Block until the active run ends, calling `on_progress` for each
    /// progress update.
    pub fn wait<F>(&mut self, mut on_progress: F) -> Result<&SessionState, TranscodeError>
    where
        F: FnMut(f64),
    {
        while let SessionState::Submitted { .. } = self.state {
            let event = self.worker.recv_event()?;
            if let WorkerEvent::Progress(p) = event {
                on_progress(p);
            }
            self.handle_event(event);
        }
        Ok(&self.state)
    }

    /// Take the finished output, returning to `Idle`.
    pub fn take_artifact(&mut self) -> Option<OutputArtifact> {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Done { artifact } => Some(artifact),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Write the finished output into `dir` under the configured download
    /// name and return to `Idle`. `Ok(None)` if nothing is ready.
    pub fn download<P: AsRef<Path>>(&mut self, dir: P) -> Result<Option<PathBuf>, TranscodeError> {
        let path = dir.as_ref().join(&self.config.download_filename);
        self.download_to(path)
    }

    /// Like `download`, with an explicit destination path.
    pub fn download_to<P: AsRef<Path>>(&mut self, path: P) -> Result<Option<PathBuf>, TranscodeError> {
        let artifact = match self.take_artifact() {
            Some(artifact) => artifact,
            None => return Ok(None),
        };
        let path = path.as_ref().to_path_buf();
        if let Err(e) = artifact.persist(&path) {
            // keep the result so the download can be retried
            self.state = SessionState::Done { artifact };
            return Err(e.into());
        }
        Ok(Some(path))
    }
}
