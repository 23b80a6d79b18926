//! Debate coordination library
//!
//! This library provides:
//! - A typed client for an Ollama-compatible generation backend
//! - A backend health monitor with superseding probes
//! - The output normalizer enforcing the debate output contract
//! - A two-persona debate orchestrator with cooperative cancellation
//! - An event bus announcing every orchestrator and health transition
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use debate_coordination::client::{BackendConnector, OllamaConnector};
//! use debate_coordination::debate::{DebateOrchestrator, DebateSettings};
//! use debate_coordination::events::EventBus;
//! use debate_coordination::health::HealthMonitor;
//!
//! # async fn run() -> Result<(), debate_coordination::debate::DebateError> {
//! let connector: Arc<dyn BackendConnector> = Arc::new(OllamaConnector::new());
//! let events = EventBus::new().shared();
//! let health = HealthMonitor::new(connector.clone())
//!     .with_events(events.clone())
//!     .shared();
//! let orchestrator = DebateOrchestrator::spawn(connector, health, events);
//!
//! orchestrator
//!     .start_round("Monorepo or polyrepo?", DebateSettings::default())
//!     .await?;
//! let snapshot = orchestrator.wait_until_idle().await?;
//! println!("{} rounds", snapshot.rounds.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod debate;
pub mod events;
pub mod health;
pub mod normalize;
