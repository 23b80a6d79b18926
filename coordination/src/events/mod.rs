//! Event-driven notification for debate state
//!
//! The orchestrator and the health monitor publish a [`DebateEvent`] on
//! every transition. Presentation code subscribes instead of polling.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Orchestrator │────▶│  Event Bus   │────▶│  Subscribers │
//! │ HealthMonitor│     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, SharedEventBus};
pub use types::DebateEvent;
