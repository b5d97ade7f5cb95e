//src/channel.rs
//
// Control channel between a caller and a background transcoder. Commands go
// in on one kanal channel, events come back in send order on another; the
// engine and its buffer live entirely on the worker thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::artifact::OutputArtifact;
use crate::config::TranscoderOptions;
use crate::engine::ComputeEngine;
use crate::error::{ErrorKind, TranscodeError};
use crate::transcoder::Transcoder;
use crate::types::SubmissionParameters;

/// Caller -> worker.
#[derive(Debug)]
pub enum ControlMessage {
    Submit(SubmissionParameters),
    Shutdown,
}

/// Worker -> caller. Every accepted `Submit` yields zero or more `Progress`
/// events followed by exactly one `Finished` or `Error`.
#[derive(Debug)]
pub enum WorkerEvent {
    Progress(f64),
    Finished(OutputArtifact),
    Error { kind: ErrorKind, message: String },
}

impl WorkerEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerEvent::Progress(_))
    }
}

/// Identifier handed out for each accepted submission.
pub type RunId = u64;

#[derive(Debug, Default)]
struct RunSlot {
    active: Option<RunId>,
    next_id: RunId,
}

/// Caller-side handle to a background transcoder thread.
pub struct TranscoderWorker {
    commands: kanal::Sender<ControlMessage>,
    events: kanal::Receiver<WorkerEvent>,
    slot: Arc<Mutex<RunSlot>>,
    handle: Option<JoinHandle<()>>,
}

impl TranscoderWorker {
    /// Start a worker thread. `factory` builds a fresh engine for every
    /// submission; it is dropped when that run ends.
    pub fn spawn<F, E>(factory: F, options: TranscoderOptions) -> Result<Self, TranscodeError>
    where
        F: Fn() -> E + Send + 'static,
        E: ComputeEngine + 'static,
    {
        let (command_tx, command_rx) = kanal::unbounded();
        let (event_tx, event_rx) = kanal::unbounded();
        let slot = Arc::new(Mutex::new(RunSlot::default()));

        let worker_slot = Arc::clone(&slot);
        let handle = thread::Builder::new()
            .name("racedown-transcoder".to_string())
            .spawn(move || worker_loop(factory, options, command_rx, event_tx, worker_slot))?;

        Ok(Self {
            commands: command_tx,
            events: event_rx,
            slot,
            handle: Some(handle),
        })
    }

    /// Start a run. Rejected with `Busy` while another run is active.
    pub fn submit(&self, params: SubmissionParameters) -> Result<RunId, TranscodeError> {
        let id = {
            let mut slot = self.slot.lock();
            if slot.active.is_some() {
                return Err(TranscodeError::Busy);
            }
            let id = slot.next_id;
            slot.next_id += 1;
            slot.active = Some(id);
            id
        };

        if self.commands.send(ControlMessage::Submit(params)).is_err() {
            self.slot.lock().active = None;
            return Err(TranscodeError::Disconnected);
        }
        log::debug!("run {} submitted", id);
        Ok(id)
    }

    pub fn is_busy(&self) -> bool {
        self.slot.lock().active.is_some()
    }

    /// Block until the next event arrives.
    pub fn recv_event(&self) -> Result<WorkerEvent, TranscodeError> {
        self.events.recv().map_err(|_| TranscodeError::Disconnected)
    }

    /// Next event if one is already waiting.
    pub fn try_recv_event(&self) -> Result<Option<WorkerEvent>, TranscodeError> {
        self.events.try_recv().map_err(|_| TranscodeError::Disconnected)
    }

    /// Stop the worker after any active run finishes. Runs cannot be
    /// cancelled part way.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.commands.send(ControlMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("transcoder worker panicked");
            }
        }
    }
}

impl Drop for TranscoderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop<F, E>(
    factory: F,
    options: TranscoderOptions,
    commands: kanal::Receiver<ControlMessage>,
    events: kanal::Sender<WorkerEvent>,
    slot: Arc<Mutex<RunSlot>>,
) where
    F: Fn() -> E,
    E: ComputeEngine,
{
    log::debug!("transcoder worker started");

    while let Ok(message) = commands.recv() {
        let params = match message {
            ControlMessage::Submit(params) => params,
            ControlMessage::Shutdown => break,
        };

        let transcoder = Transcoder::new(factory(), options);
        let progress_events = events.clone();
        let mut listening = true;
        let result = transcoder.run(params, |event| {
            if listening && progress_events.send(WorkerEvent::Progress(event.percentage)).is_err() {
                log::debug!("event receiver dropped, discarding progress for the rest of the run");
                listening = false;
            }
        });

        let terminal = match result {
            Ok(artifact) => WorkerEvent::Finished(artifact),
            Err(e) => WorkerEvent::Error {
                kind: e.kind(),
                message: e.to_string(),
            },
        };

        // free the slot first so a caller reacting to the terminal event
        // can submit again straight away
        slot.lock().active = None;
        if events.send(terminal).is_err() {
            log::debug!("event receiver dropped, stopping worker");
            break;
        }
    }

    log::debug!("transcoder worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineAdapter, EngineParams, Kernel, RaceKernel};
    use crate::error::EngineFault;
    use crate::source::MemorySource;
    use crate::types::InputFormat;

    fn params(data: &[u8]) -> SubmissionParameters {
        SubmissionParameters::new(
            Box::new(MemorySource::new(data.to_vec())),
            50.0,
            InputFormat::Fastq,
            5,
        )
        .unwrap()
    }

    fn drain(worker: &TranscoderWorker) -> (Vec<f64>, WorkerEvent) {
        let mut progress = Vec::new();
        loop {
            match worker.recv_event().unwrap() {
                WorkerEvent::Progress(p) => progress.push(p),
                terminal => return (progress, terminal),
            }
        }
    }

    #[test]
    fn runs_back_to_back() {
        let worker = TranscoderWorker::spawn(
            || EngineAdapter::new(RaceKernel::new()),
            TranscoderOptions {
                capacity_bytes: 32,
                ..TranscoderOptions::default()
            },
        )
        .unwrap();
        let input = b"@a\nACGTACGTTT\n+\nIIIIIIIIII\n@b\nGGGCCCAAAT\n+\nIIIIIIIIII\n";

        for _ in 0..2 {
            worker.submit(params(input)).unwrap();
            let (progress, terminal) = drain(&worker);
            assert_eq!(progress.last().copied(), Some(100.0));
            match terminal {
                WorkerEvent::Finished(artifact) => assert_eq!(artifact.to_vec(), input.to_vec()),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert!(!worker.is_busy());
        worker.shutdown();
    }

    #[test]
    fn engine_fault_reported_as_error() {
        // a 42-byte record never fits a 16-byte buffer
        let worker = TranscoderWorker::spawn(
            || EngineAdapter::new(RaceKernel::new()),
            TranscoderOptions {
                capacity_bytes: 16,
                ..TranscoderOptions::default()
            },
        )
        .unwrap();
        worker
            .submit(params(b"@long\nACGTACGTACGTACGT\n+\nIIIIIIIIIIIIIIII\n"))
            .unwrap();
        let (_, terminal) = drain(&worker);
        match terminal {
            WorkerEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::EngineFault),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(!worker.is_busy());
    }

    #[test]
    fn worker_loop_returns_when_events_are_dropped() {
        let (command_tx, command_rx) = kanal::unbounded();
        let (event_tx, event_rx) = kanal::unbounded::<WorkerEvent>();
        drop(event_rx);
        let slot = Arc::new(Mutex::new(RunSlot {
            active: Some(0),
            next_id: 1,
        }));

        command_tx
            .send(ControlMessage::Submit(params(b"@a\nACGTACGTTT\n+\nIIIIIIIIII\n")))
            .unwrap();
        command_tx
            .send(ControlMessage::Submit(params(b"@b\nACGTACGTTT\n+\nIIIIIIIIII\n")))
            .unwrap();

        worker_loop(
            || EngineAdapter::new(RaceKernel::new()),
            TranscoderOptions {
                capacity_bytes: 64,
                ..TranscoderOptions::default()
            },
            command_rx,
            event_tx,
            Arc::clone(&slot),
        );

        // the first run still completes and frees the slot; the loop exits
        // without picking up the second submission
        assert_eq!(slot.lock().active, None);
        assert_eq!(command_tx.len(), 1);
    }

    /// Echo kernel that blocks each pass until the test opens the gate.
    struct Gated {
        gate: kanal::Receiver<()>,
    }

    impl Kernel for Gated {
        fn reset(&mut self) {}

        fn process(
            &mut self,
            input: &[u8],
            _end_of_stream: bool,
            _params: &EngineParams,
            output: &mut Vec<u8>,
        ) -> Result<usize, EngineFault> {
            let _ = self.gate.recv();
            output.extend_from_slice(input);
            Ok(input.len())
        }
    }

    #[test]
    fn second_submit_while_running_is_busy() {
        let (open, gate) = kanal::unbounded();
        let worker = TranscoderWorker::spawn(
            move || EngineAdapter::new(Gated { gate: gate.clone() }),
            TranscoderOptions::default(),
        )
        .unwrap();

        let first = worker.submit(params(b"@a\nACGT\n+\nIIII\n")).unwrap();
        assert!(worker.is_busy());
        assert!(matches!(
            worker.submit(params(b"@b\nACGT\n+\nIIII\n")),
            Err(TranscodeError::Busy)
        ));

        open.send(()).unwrap();
        let (_, terminal) = drain(&worker);
        assert!(terminal.is_terminal());
        assert!(matches!(terminal, WorkerEvent::Finished(_)));

        // the slot is free again
        open.send(()).unwrap();
        let second = worker.submit(params(b"@c\nACGT\n+\nIIII\n")).unwrap();
        assert_eq!(second, first + 1);
        let (_, terminal) = drain(&worker);
        assert!(matches!(terminal, WorkerEvent::Finished(_)));
    }
}
