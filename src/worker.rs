use crate::config::ExplorerConfig;
use crate::extract::SourceFile;
use crate::ingest::{self, IngestProgress, Ingestion};
use crate::model::Play;
use crate::stats::{self, CalculationRequest, CalculationResult, StatsOptions};
use anyhow::Context;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub enum WorkerRequest {
    SetRecords(Arc<[Play]>),
    Calculate(CalculationRequest),
    Parse(Vec<SourceFile>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Records,
    Calculate,
    Parse,
}

impl WorkerRequest {
    fn kind(&self) -> RunKind {
        match self {
            Self::SetRecords(_) => RunKind::Records,
            Self::Calculate(_) => RunKind::Calculate,
            Self::Parse(_) => RunKind::Parse,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutput {
    Parsed(Ingestion),
    Calculated(Box<CalculationResult>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    Progress(IngestProgress),
    Complete(WorkerOutput),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerEnvelope {
    pub run_id: u64,
    pub kind: RunKind,
    pub response: WorkerResponse,
}

#[derive(Debug)]
enum WorkerCommand {
    Run { run_id: u64, request: WorkerRequest },
    Shutdown,
}

/// Every request gets a fresh run id. Responses belonging to anything but the newest parse or
/// the newest calculation are dropped before they reach the caller.
pub struct AnalyticsWorker {
    cmd_tx: Sender<WorkerCommand>,
    event_rx: Receiver<WorkerEnvelope>,
    next_run_id: u64,
    latest_parse: u64,
    latest_calculation: u64,
}

impl AnalyticsWorker {
    pub fn spawn(config: ExplorerConfig) -> anyhow::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::Builder::new()
            .name(String::from("streamscope-worker"))
            .spawn(move || worker_loop(config, cmd_rx, event_tx))
            .context("failed to spawn analytics worker")?;
        log::debug!("analytics worker started");

        Ok(Self {
            cmd_tx,
            event_rx,
            next_run_id: 0,
            latest_parse: 0,
            latest_calculation: 0,
        })
    }

    pub fn submit(&mut self, request: WorkerRequest) -> u64 {
        self.next_run_id += 1;
        let run_id = self.next_run_id;
        match request.kind() {
            RunKind::Parse => self.latest_parse = run_id,
            RunKind::Calculate => self.latest_calculation = run_id,
            RunKind::Records => {}
        }
        if self
            .cmd_tx
            .send(WorkerCommand::Run { run_id, request })
            .is_err()
        {
            log::warn!("analytics worker is gone; run {run_id} dropped");
        }
        run_id
    }

    pub fn set_records(&mut self, records: Arc<[Play]>) -> u64 {
        self.submit(WorkerRequest::SetRecords(records))
    }

    pub fn calculate(&mut self, request: CalculationRequest) -> u64 {
        self.submit(WorkerRequest::Calculate(request))
    }

    pub fn parse(&mut self, files: Vec<SourceFile>) -> u64 {
        self.submit(WorkerRequest::Parse(files))
    }

    pub fn reset(&mut self) {
        self.next_run_id += 1;
        self.latest_parse = self.next_run_id;
        self.latest_calculation = self.next_run_id;
    }

    fn is_current(&self, envelope: &WorkerEnvelope) -> bool {
        match envelope.kind {
            RunKind::Parse => envelope.run_id == self.latest_parse,
            RunKind::Calculate => envelope.run_id == self.latest_calculation,
            RunKind::Records => false,
        }
    }

    pub fn try_recv_event(&self) -> Option<WorkerEnvelope> {
        loop {
            match self.event_rx.try_recv() {
                Ok(envelope) if self.is_current(&envelope) => return Some(envelope),
                Ok(stale) => log::trace!("dropping stale run {}", stale.run_id),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<WorkerEnvelope> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.event_rx.recv_timeout(remaining) {
                Ok(envelope) if self.is_current(&envelope) => return Some(envelope),
                Ok(stale) => log::trace!("dropping stale run {}", stale.run_id),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(WorkerCommand::Shutdown);
    }
}

impl Drop for AnalyticsWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn calculation_superseded(pending: &VecDeque<WorkerCommand>) -> bool {
    pending.iter().any(|command| {
        matches!(
            command,
            WorkerCommand::Run {
                request: WorkerRequest::Calculate(_),
                ..
            }
        )
    })
}

fn worker_loop(
    config: ExplorerConfig,
    cmd_rx: Receiver<WorkerCommand>,
    event_tx: Sender<WorkerEnvelope>,
) {
    let options = StatsOptions::from_config(&config);
    let mut records: Arc<[Play]> = Arc::from(Vec::new());
    let mut pending: VecDeque<WorkerCommand> = VecDeque::new();

    loop {
        let command = match pending.pop_front() {
            Some(command) => command,
            None => match cmd_rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };
        while let Ok(queued) = cmd_rx.try_recv() {
            pending.push_back(queued);
        }

        let (run_id, request) = match command {
            WorkerCommand::Shutdown => break,
            WorkerCommand::Run { run_id, request } => (run_id, request),
        };

        match request {
            WorkerRequest::SetRecords(snapshot) => {
                log::debug!("worker snapshot replaced with {} plays", snapshot.len());
                records = snapshot;
            }
            WorkerRequest::Calculate(request) => {
                if calculation_superseded(&pending) {
                    log::debug!("skipping superseded calculation {run_id}");
                    continue;
                }
                let result = stats::calculate(&records, &request, &options);
                let _ = event_tx.send(WorkerEnvelope {
                    run_id,
                    kind: RunKind::Calculate,
                    response: WorkerResponse::Complete(WorkerOutput::Calculated(Box::new(result))),
                });
            }
            WorkerRequest::Parse(files) => {
                let progress_tx = event_tx.clone();
                let outcome = ingest::ingest_with_progress(&files, &config, |progress| {
                    let _ = progress_tx.send(WorkerEnvelope {
                        run_id,
                        kind: RunKind::Parse,
                        response: WorkerResponse::Progress(progress),
                    });
                });
                let response = match outcome {
                    Ok(ingestion) => WorkerResponse::Complete(WorkerOutput::Parsed(ingestion)),
                    Err(err) => {
                        log::warn!("parse run {run_id} failed: {err}");
                        WorkerResponse::Error(err.to_string())
                    }
                };
                let _ = event_tx.send(WorkerEnvelope {
                    run_id,
                    kind: RunKind::Parse,
                    response,
                });
            }
        }
    }

    log::debug!("analytics worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlayFilters;

    const WAIT: Duration = Duration::from_secs(5);

    fn play(ts: &str, artist: &str) -> Play {
        Play {
            id: format!("{ts}-0"),
            timestamp: ts.to_string(),
            ms_played: 1_000,
            track_name: Some(String::from("Song")),
            artist_name: Some(artist.to_string()),
            album_name: None,
            track_uri: None,
            source: String::from("test.json"),
        }
    }

    fn wait_for_complete(worker: &AnalyticsWorker) -> Option<WorkerEnvelope> {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            let Some(envelope) = worker.recv_event_timeout(Duration::from_millis(50)) else {
                continue;
            };
            if matches!(
                envelope.response,
                WorkerResponse::Complete(_) | WorkerResponse::Error(_)
            ) {
                return Some(envelope);
            }
        }
        None
    }

    #[test]
    fn calculation_runs_against_latest_snapshot() {
        let mut worker = AnalyticsWorker::spawn(ExplorerConfig::default()).expect("spawn");
        let records: Arc<[Play]> = Arc::from(vec![
            play("2024-01-01T00:00:00Z", "A"),
            play("2024-01-02T00:00:00Z", "B"),
        ]);
        worker.set_records(records);
        let run_id = worker.calculate(CalculationRequest {
            filters: PlayFilters {
                query: String::from("artist:a"),
                ..PlayFilters::default()
            },
            ..CalculationRequest::default()
        });

        let envelope = wait_for_complete(&worker).expect("calculation result");
        assert_eq!(envelope.run_id, run_id);
        let WorkerResponse::Complete(WorkerOutput::Calculated(result)) = envelope.response else {
            panic!("expected a calculation result");
        };
        assert_eq!(result.filtered_plays.len(), 1);
        assert_eq!(result.stats.overview.total_plays, 1);
    }

    #[test]
    fn only_newest_calculation_reaches_caller() {
        let mut worker = AnalyticsWorker::spawn(ExplorerConfig::default()).expect("spawn");
        worker.set_records(Arc::from(vec![play("2024-01-01T00:00:00Z", "A")]));
        let mut last = 0;
        for _ in 0..5 {
            last = worker.calculate(CalculationRequest::default());
        }

        let envelope = wait_for_complete(&worker).expect("result");
        assert_eq!(envelope.run_id, last);
        assert!(worker.recv_event_timeout(Duration::from_millis(100)).is_none());
    }

    #[test]
    fn parse_reports_progress_then_completion() {
        let mut worker = AnalyticsWorker::spawn(ExplorerConfig::default()).expect("spawn");
        let run_id = worker.parse(vec![SourceFile::new(
            "history.json",
            br#"[{"ts":"2024-01-01T00:00:00Z"}]"#.to_vec(),
        )]);

        let mut progress = Vec::new();
        let deadline = Instant::now() + WAIT;
        let mut done = None;
        while Instant::now() < deadline && done.is_none() {
            if let Some(envelope) = worker.recv_event_timeout(Duration::from_millis(50)) {
                assert_eq!(envelope.run_id, run_id);
                match envelope.response {
                    WorkerResponse::Progress(event) => progress.push(event),
                    other => done = Some(other),
                }
            }
        }

        assert_eq!(progress.len(), 2);
        assert_eq!(progress[1].progress, 100);
        let Some(WorkerResponse::Complete(WorkerOutput::Parsed(ingestion))) = done else {
            panic!("parse did not complete");
        };
        assert_eq!(ingestion.plays.len(), 1);
    }

    #[test]
    fn fatal_parse_failure_is_an_error_response() {
        let mut worker = AnalyticsWorker::spawn(ExplorerConfig::default()).expect("spawn");
        worker.parse(vec![SourceFile::new("notes.txt", b"hi".to_vec())]);
        let envelope = wait_for_complete(&worker).expect("response");
        let WorkerResponse::Error(message) = envelope.response else {
            panic!("expected error");
        };
        assert!(message.contains("Streaming_History_Audio_"));
    }

    #[test]
    fn reset_discards_in_flight_parse() {
        let mut worker = AnalyticsWorker::spawn(ExplorerConfig::default()).expect("spawn");
        worker.parse(vec![SourceFile::new("history.json", b"[]".to_vec())]);
        worker.reset();
        assert!(worker.recv_event_timeout(Duration::from_millis(300)).is_none());
    }

    #[test]
    fn queued_calculation_marks_earlier_ones_superseded() {
        let mut pending = VecDeque::new();
        assert!(!calculation_superseded(&pending));
        pending.push_back(WorkerCommand::Run {
            run_id: 2,
            request: WorkerRequest::SetRecords(Arc::from(Vec::new())),
        });
        assert!(!calculation_superseded(&pending));
        pending.push_back(WorkerCommand::Run {
            run_id: 3,
            request: WorkerRequest::Calculate(CalculationRequest::default()),
        });
        assert!(calculation_superseded(&pending));
    }
}
