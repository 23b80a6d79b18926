//! Two-persona debate orchestration.
//!
//! Each round asks two fixed personas the same question concurrently,
//! normalizes both answers, and commits them together as one
//! [`DebateRound`]. A round is committed only when both calls succeed.
//!
//! # Run Flow
//!
//! ```text
//! start_round(topic) / next_round()
//!   │
//!   ├─ cancel predecessor (its result is discarded)
//!   ├─ connect ─► resolve model ─► build prompts
//!   ├─ generate(Agent X) ║ generate(Agent C)     (joined)
//!   ├─ normalize both
//!   └─ commit round ─► Idle
//!        any failure ─► Idle + last_error + health refresh
//! ```

pub mod orchestrator;
pub mod prompts;
pub mod settings;
pub mod state;

pub use orchestrator::{DebateError, DebateOrchestrator};
pub use settings::{resolve_model, DebateSettings, ModelPreferences, AUTO_MODEL};
pub use state::{
    ContextMode, DebateRound, DebateSnapshot, Persona, RunKind, RunOutcome, RunPhase,
};
