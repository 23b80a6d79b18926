//! Debate state: personas, rounds, and the observable snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the two fixed generation personalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    /// Creative, exploratory. Shown as "Agent X".
    Explorer,
    /// Structured, skeptical. Shown as "Agent C".
    Skeptic,
}

impl Persona {
    pub const ALL: [Persona; 2] = [Persona::Explorer, Persona::Skeptic];

    /// Display name used in transcripts and prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Explorer => "Agent X",
            Self::Skeptic => "Agent C",
        }
    }

    /// Identity line opening the system prompt.
    pub fn identity(self) -> &'static str {
        match self {
            Self::Explorer => "You are AgentX, a creative, exploratory senior engineer.",
            Self::Skeptic => "You are AgentC, a structured, skeptical senior engineer.",
        }
    }

    /// Closing instruction of every user prompt.
    pub fn stance(self) -> &'static str {
        match self {
            Self::Explorer => "Be bold, creative, and practical.",
            Self::Skeptic => "Be skeptical, systematic, and reliability-focused.",
        }
    }

    /// Effective sampling temperature for `configured`.
    ///
    /// The skeptic runs at 30% of the configured value; both are clamped to [0.1, 2.0].
    pub fn temperature(self, configured: f64) -> f64 {
        let scaled = match self {
            Self::Explorer => configured,
            Self::Skeptic => configured * 0.3,
        };
        if scaled.is_nan() {
            return 0.1;
        }
        scaled.clamp(0.1, 2.0)
    }

    pub fn other(self) -> Self {
        match self {
            Self::Explorer => Self::Skeptic,
            Self::Skeptic => Self::Explorer,
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// How much prior history a continuation prompt carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Every prior round, each output clipped to 900 characters.
    #[default]
    Auto,
    /// Only the previous round, each output clipped to 1200 characters.
    Manual,
    /// Each persona sees only the other persona's previous output.
    CrossReply,
}

impl ContextMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "Auto context",
            Self::Manual => "Manual context",
            Self::CrossReply => "Cross-reply context",
        }
    }
}

impl std::str::FromStr for ContextMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            "cross-reply" | "cross_reply" | "crossreply" => Ok(Self::CrossReply),
            other => Err(format!("unknown context mode: {other}")),
        }
    }
}

/// One committed unit of debate history. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRound {
    pub id: Uuid,
    pub topic: String,
    pub model: String,
    /// Normalized explorer output.
    pub persona_a: String,
    /// Normalized skeptic output.
    pub persona_b: String,
    pub created_at: DateTime<Utc>,
}

impl DebateRound {
    pub fn new(
        topic: impl Into<String>,
        model: impl Into<String>,
        persona_a: impl Into<String>,
        persona_b: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            model: model.into(),
            persona_a: persona_a.into(),
            persona_b: persona_b.into(),
            created_at: Utc::now(),
        }
    }

    /// Text written by `persona` in this round.
    pub fn text(&self, persona: Persona) -> &str {
        match persona {
            Persona::Explorer => &self.persona_a,
            Persona::Skeptic => &self.persona_b,
        }
    }
}

/// Whether a run opens a new debate or extends the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Start,
    Continue,
}

impl RunKind {
    /// Status text shown while the run is in flight.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Start => "Running…",
            Self::Continue => "Continuing…",
        }
    }
}

/// Orchestrator phase.
///
/// ```text
/// Idle ──start/next──► Running ──┬─ success ──► Idle
///                        │       ├─ failure ──► Idle (last_error set)
///                        │       └─ cancel ───► Idle (silent)
///                        └─start/next─► Running (predecessor cancelled)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// How the most recent run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Cancelled,
    Failed,
}

/// Observable orchestrator state, republished on every transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateSnapshot {
    pub phase: RunPhase,
    pub rounds: Vec<DebateRound>,
    pub last_error: Option<String>,
    pub status_message: String,
    pub resolved_model: Option<String>,
    pub last_outcome: Option<RunOutcome>,
}

impl DebateSnapshot {
    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    pub fn last_round(&self) -> Option<&DebateRound> {
        self.rounds.last()
    }
}
