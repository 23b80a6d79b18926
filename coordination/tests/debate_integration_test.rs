//! Debate orchestrator end-to-end against an in-process mock backend.
//!
//! Covers: connector ↔ model resolution ↔ prompts ↔ concurrent generation
//! ↔ normalizer ↔ commit ↔ health refresh, over real sockets.

mod common;

use std::sync::Arc;

use common::{dead_url, MockBackend};
use debate_coordination::client::{BackendConnector, OllamaConnector};
use debate_coordination::debate::{
    ContextMode, DebateOrchestrator, DebateSettings, RunOutcome,
};
use debate_coordination::events::{DebateEvent, EventBus};
use debate_coordination::health::{HealthMonitor, HealthStatus, SharedHealthMonitor};
use debate_coordination::normalize::OutputMode;

const ANSWER: &str = "**Plan**\n1) Outcome: run `cargo test -- --nocapture` on every push\n\
* Outcome: pin toolchains\n- Question: speed or safety?";

fn wire() -> (DebateOrchestrator, SharedHealthMonitor) {
    let connector: Arc<dyn BackendConnector> = Arc::new(OllamaConnector::new());
    let events = EventBus::new().shared();
    let health = HealthMonitor::new(connector.clone())
        .with_events(events.clone())
        .shared();
    (
        DebateOrchestrator::spawn(connector, health.clone(), events),
        health,
    )
}

fn settings_for(url: &str) -> DebateSettings {
    DebateSettings {
        server_url: url.to_string(),
        model_override: String::new(),
        ..DebateSettings::default()
    }
}

#[tokio::test]
async fn test_round_over_http() {
    let backend = MockBackend::ollama(&["llama3:8b", "gemma3:1b"], ANSWER).await;
    let (orchestrator, _) = wire();

    orchestrator
        .start_round("CI policy", settings_for(&backend.url))
        .await
        .unwrap();
    let snapshot = orchestrator.wait_until_idle().await.unwrap();

    assert_eq!(snapshot.last_outcome, Some(RunOutcome::Succeeded));
    let round = &snapshot.rounds[0];
    assert_eq!(round.model, "gemma3:1b");
    assert_eq!(
        round.persona_a,
        "- Outcome: Plan\n\
- Outcome: run `cargo test -- --nocapture` on every push\n\
- Outcome: pin toolchains\n\
- Question: speed or safety?"
    );
    assert_eq!(round.persona_a, round.persona_b);

    let recorded = backend.recorded();
    let generates: Vec<_> = recorded
        .iter()
        .filter(|r| r.path == "/api/generate")
        .collect();
    assert_eq!(generates.len(), 2);
    assert!(recorded.iter().any(|r| r.path == "/api/tags"));
}

#[tokio::test]
async fn test_continue_round_carries_history() {
    let backend = MockBackend::ollama(&["gemma3:4b"], ANSWER).await;
    let (orchestrator, _) = wire();
    let settings = DebateSettings {
        context_mode: ContextMode::Manual,
        ..settings_for(&backend.url)
    };

    orchestrator
        .start_round("CI policy", settings.clone())
        .await
        .unwrap();
    orchestrator.wait_until_idle().await.unwrap();
    orchestrator.next_round(settings).await.unwrap();
    let snapshot = orchestrator.wait_until_idle().await.unwrap();
    assert_eq!(snapshot.rounds.len(), 2);

    let last_prompt = backend
        .recorded()
        .iter()
        .rev()
        .find(|r| r.path == "/api/generate")
        .map(|r| serde_json::from_str::<serde_json::Value>(&r.body).unwrap())
        .unwrap();
    let prompt = last_prompt["prompt"].as_str().unwrap();
    assert!(prompt.starts_with("Topic: CI policy\n\nPrevious round:"));
    assert!(prompt.contains("Continue the debate for one more round."));
}

#[tokio::test]
async fn test_paragraph_mode_passes_through() {
    let backend =
        MockBackend::ollama(&["gemma3:1b"], "🧠 First **point**.\n\n❓ Which matters?").await;
    let (orchestrator, _) = wire();
    let settings = DebateSettings {
        output_mode: OutputMode::FreeParagraphs,
        ..settings_for(&backend.url)
    };

    orchestrator.start_round("style", settings).await.unwrap();
    let snapshot = orchestrator.wait_until_idle().await.unwrap();
    assert_eq!(
        snapshot.rounds[0].persona_a,
        "🧠 First point.\n\n❓ Which matters?"
    );
}

#[tokio::test]
async fn test_unreachable_backend_marks_health_down() {
    let url = dead_url().await;
    let (orchestrator, health) = wire();
    let mut events = orchestrator.events().subscribe();
    let mut status = health.subscribe();

    orchestrator
        .start_round("anything", settings_for(&url))
        .await
        .unwrap();
    let snapshot = orchestrator.wait_until_idle().await.unwrap();

    assert!(snapshot.rounds.is_empty());
    assert!(snapshot
        .last_error
        .as_deref()
        .unwrap()
        .starts_with("Backend unreachable"));
    status
        .wait_for(|s| *s == HealthStatus::Down)
        .await
        .unwrap();

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        saw_failure |= matches!(event, DebateEvent::RunFailed { .. });
    }
    assert!(saw_failure);
}
