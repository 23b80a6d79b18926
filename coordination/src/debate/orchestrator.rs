//! Debate orchestrator: owns round history and drives one run at a time.
//!
//! The orchestrator is an actor. [`DebateOrchestrator`] is a cheap handle
//! that sends commands to a single task; that task is the only writer of the
//! [`DebateSnapshot`] and republishes it over a watch channel after every
//! transition.
//!
//! Each run carries a `run_id`. Starting a run cancels the previous run's
//! token and bumps the id, so a late result from a superseded run is
//! recognised by its stale id and dropped without touching history.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::prompts::{continue_prompt, start_prompt, system_prompt};
use super::settings::{resolve_model, DebateSettings};
use super::state::{DebateRound, DebateSnapshot, Persona, RunKind, RunOutcome, RunPhase};
use crate::client::{BackendConnector, ClientError, GenerationRequest};
use crate::events::{DebateEvent, SharedEventBus};
use crate::health::SharedHealthMonitor;
use crate::normalize::normalize;

const COMMAND_BUFFER: usize = 32;

/// Errors surfaced by orchestrator operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DebateError {
    #[error("Enter a topic to debate.")]
    EmptyTopic,

    #[error("Start a debate first.")]
    NoHistory,

    #[error(transparent)]
    Client(#[from] ClientError),

    /// Superseded or stopped; never shown to the user.
    #[error("debate run cancelled")]
    Cancelled,

    #[error("debate orchestrator is no longer running")]
    OrchestratorStopped,
}

impl DebateError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

type Ack<T> = oneshot::Sender<Result<T, DebateError>>;

enum Command {
    Start {
        topic: String,
        settings: DebateSettings,
        ack: Ack<u64>,
    },
    Next {
        settings: DebateSettings,
        ack: Ack<u64>,
    },
    Stop {
        ack: Ack<()>,
    },
    Reset {
        ack: Ack<()>,
    },
}

/// Normalized persona outputs, not yet committed.
#[derive(Debug)]
struct RoundDraft {
    topic: String,
    model: String,
    persona_a: String,
    persona_b: String,
}

struct RunReport {
    run_id: u64,
    result: Result<RoundDraft, DebateError>,
}

struct ActiveRun {
    run_id: u64,
    kind: RunKind,
    server_url: String,
    cancel: CancellationToken,
}

/// Everything a spawned run needs, captured when the run starts.
struct RunJob {
    kind: RunKind,
    topic: String,
    history: Vec<DebateRound>,
    settings: DebateSettings,
}

/// Handle to the orchestrator task.
#[derive(Clone)]
pub struct DebateOrchestrator {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<DebateSnapshot>,
    events: SharedEventBus,
}

impl DebateOrchestrator {
    /// Spawn the orchestrator task on the current runtime.
    ///
    /// The task exits once every handle is dropped, cancelling any run in flight.
    pub fn spawn(
        connector: Arc<dyn BackendConnector>,
        health: SharedHealthMonitor,
        events: SharedEventBus,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot) = watch::channel(DebateSnapshot::default());
        let (report_tx, report_rx) = mpsc::unbounded_channel();

        let actor = Actor {
            connector,
            health,
            events: Arc::clone(&events),
            snapshot: snapshot_tx,
            state: DebateSnapshot::default(),
            active: None,
            last_run_id: 0,
            report_tx,
        };
        tokio::spawn(actor.run(command_rx, report_rx));

        Self {
            commands,
            snapshot,
            events,
        }
    }

    /// Begin a new debate on `topic`, cancelling any run in flight.
    ///
    /// Returns the run id once the run is underway. The committed round
    /// replaces the existing history.
    pub async fn start_round(
        &self,
        topic: impl Into<String>,
        settings: DebateSettings,
    ) -> Result<u64, DebateError> {
        let topic = topic.into();
        self.request(|ack| Command::Start {
            topic,
            settings,
            ack,
        })
        .await
    }

    /// Run one more round on the current topic, cancelling any run in flight.
    pub async fn next_round(&self, settings: DebateSettings) -> Result<u64, DebateError> {
        self.request(|ack| Command::Next { settings, ack }).await
    }

    /// Cancel the run in flight, keeping history.
    pub async fn stop(&self) -> Result<(), DebateError> {
        self.request(|ack| Command::Stop { ack }).await
    }

    /// Cancel the run in flight and clear history, error, and status.
    pub async fn reset(&self) -> Result<(), DebateError> {
        self.request(|ack| Command::Reset { ack }).await
    }

    pub fn snapshot(&self) -> DebateSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every snapshot transition.
    pub fn subscribe(&self) -> watch::Receiver<DebateSnapshot> {
        self.snapshot.clone()
    }

    pub fn events(&self) -> SharedEventBus {
        Arc::clone(&self.events)
    }

    /// Wait until no run is in flight and return that snapshot.
    pub async fn wait_until_idle(&self) -> Result<DebateSnapshot, DebateError> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| !s.is_running())
            .await
            .map_err(|_| DebateError::OrchestratorStopped)?;
        Ok(snapshot.clone())
    }

    async fn request<T>(&self, build: impl FnOnce(Ack<T>) -> Command) -> Result<T, DebateError> {
        let (ack, reply) = oneshot::channel();
        self.commands
            .send(build(ack))
            .await
            .map_err(|_| DebateError::OrchestratorStopped)?;
        reply.await.map_err(|_| DebateError::OrchestratorStopped)?
    }
}

struct Actor {
    connector: Arc<dyn BackendConnector>,
    health: SharedHealthMonitor,
    events: SharedEventBus,
    snapshot: watch::Sender<DebateSnapshot>,
    state: DebateSnapshot,
    active: Option<ActiveRun>,
    last_run_id: u64,
    report_tx: mpsc::UnboundedSender<RunReport>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut reports: mpsc::UnboundedReceiver<RunReport>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(report) = reports.recv() => self.complete(report),
            }
        }

        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
        debug!("debate orchestrator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start {
                topic,
                settings,
                ack,
            } => {
                let topic = topic.trim().to_string();
                let result = if topic.is_empty() {
                    Err(self.reject(DebateError::EmptyTopic))
                } else {
                    let job = RunJob {
                        kind: RunKind::Start,
                        topic,
                        history: Vec::new(),
                        settings,
                    };
                    Ok(self.launch(job))
                };
                let _ = ack.send(result);
            }
            Command::Next { settings, ack } => {
                let result = match self.state.last_round() {
                    None => Err(self.reject(DebateError::NoHistory)),
                    Some(last) => {
                        let job = RunJob {
                            kind: RunKind::Continue,
                            topic: last.topic.clone(),
                            history: self.state.rounds.clone(),
                            settings,
                        };
                        Ok(self.launch(job))
                    }
                };
                let _ = ack.send(result);
            }
            Command::Stop { ack } => {
                self.cancel_active();
                self.state.phase = RunPhase::Idle;
                self.state.status_message.clear();
                self.publish();
                let _ = ack.send(Ok(()));
            }
            Command::Reset { ack } => {
                self.cancel_active();
                self.state = DebateSnapshot::default();
                self.publish();
                self.events.publish(DebateEvent::HistoryReset {
                    timestamp: Utc::now(),
                });
                info!("debate history reset");
                let _ = ack.send(Ok(()));
            }
        }
    }

    /// Record a validation failure without starting a run.
    fn reject(&mut self, err: DebateError) -> DebateError {
        self.state.last_error = Some(err.to_string());
        self.publish();
        err
    }

    fn launch(&mut self, job: RunJob) -> u64 {
        self.cancel_active();

        self.last_run_id += 1;
        let run_id = self.last_run_id;
        let cancel = CancellationToken::new();
        self.active = Some(ActiveRun {
            run_id,
            kind: job.kind,
            server_url: job.settings.server_url.clone(),
            cancel: cancel.clone(),
        });

        self.state.phase = RunPhase::Running;
        self.state.last_error = None;
        self.state.status_message = job.kind.status_text().to_string();
        self.publish();
        self.events.publish(DebateEvent::RunStarted {
            run_id,
            kind: job.kind,
            timestamp: Utc::now(),
        });
        info!(run_id, kind = ?job.kind, topic = %job.topic, "debate run started");

        let connector = Arc::clone(&self.connector);
        let report_tx = self.report_tx.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(DebateError::Cancelled),
                result = execute(connector.as_ref(), job) => result,
            };
            // The actor may already be gone; nothing to report to.
            let _ = report_tx.send(RunReport { run_id, result });
        });

        run_id
    }

    /// Cancel the run in flight, if any. History is untouched.
    fn cancel_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.cancel.cancel();
        self.state.last_outcome = Some(RunOutcome::Cancelled);
        self.events.publish(DebateEvent::RunCancelled {
            run_id: active.run_id,
            timestamp: Utc::now(),
        });
        debug!(run_id = active.run_id, "debate run cancelled");
        self.health.refresh(&active.server_url);
    }

    fn complete(&mut self, report: RunReport) {
        let is_current = self
            .active
            .as_ref()
            .is_some_and(|active| active.run_id == report.run_id);
        if !is_current {
            debug!(run_id = report.run_id, "discarding result of superseded run");
            return;
        }
        let Some(active) = self.active.take() else {
            return;
        };

        self.state.phase = RunPhase::Idle;
        match report.result {
            Ok(draft) => {
                let round =
                    DebateRound::new(draft.topic, draft.model, draft.persona_a, draft.persona_b);
                let round_id = round.id;
                let model = round.model.clone();
                match active.kind {
                    RunKind::Start => self.state.rounds = vec![round],
                    RunKind::Continue => self.state.rounds.push(round),
                }
                let round_index = self.state.rounds.len() - 1;

                self.state.status_message.clear();
                self.state.resolved_model = Some(model.clone());
                self.state.last_outcome = Some(RunOutcome::Succeeded);
                self.publish();
                self.events.publish(DebateEvent::RoundCommitted {
                    run_id: active.run_id,
                    round_id,
                    round_index,
                    model: model.clone(),
                    timestamp: Utc::now(),
                });
                info!(run_id = active.run_id, round_index, %model, "round committed");
                self.health.refresh(&active.server_url);
            }
            Err(DebateError::Cancelled) => {
                self.state.status_message.clear();
                self.state.last_outcome = Some(RunOutcome::Cancelled);
                self.publish();
                self.events.publish(DebateEvent::RunCancelled {
                    run_id: active.run_id,
                    timestamp: Utc::now(),
                });
                self.health.refresh(&active.server_url);
            }
            Err(err) => {
                let message = err.to_string();
                warn!(run_id = active.run_id, error = %message, "debate run failed");
                self.state.last_error = Some(message.clone());
                self.state.status_message.clear();
                self.state.last_outcome = Some(RunOutcome::Failed);
                self.publish();
                self.events.publish(DebateEvent::RunFailed {
                    run_id: active.run_id,
                    message,
                    timestamp: Utc::now(),
                });
                self.health.refresh(&active.server_url);
            }
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.state.clone());
    }
}

/// Resolve the model, ask both personas concurrently, and normalize.
async fn execute(connector: &dyn BackendConnector, job: RunJob) -> Result<RoundDraft, DebateError> {
    let settings = &job.settings;
    let backend = connector.connect(&settings.server_url)?;
    let model = resolve_model(
        backend.as_ref(),
        &settings.model_override,
        &settings.preferences,
    )
    .await?;
    debug!(%model, "model resolved");

    let request_for = |persona: Persona| {
        let prompt = match job.kind {
            RunKind::Start => start_prompt(&job.topic, persona),
            RunKind::Continue => continue_prompt(&job.history, persona, settings.context_mode),
        };
        GenerationRequest::new(model.as_str(), prompt)
            .with_system(system_prompt(persona, settings.output_mode))
            .with_temperature(persona.temperature(settings.temperature))
            .with_max_tokens(settings.effective_max_tokens())
            .with_context_window(settings.context_window)
    };
    let explorer = request_for(Persona::Explorer);
    let skeptic = request_for(Persona::Skeptic);

    let (a, b) = tokio::try_join!(backend.generate(&explorer), backend.generate(&skeptic))?;

    Ok(RoundDraft {
        topic: job.topic,
        persona_a: normalize(&a, settings.output_mode),
        persona_b: normalize(&b, settings.output_mode),
        model,
    })
}
