//! Output normalizer: enforces the output contract on raw model text.
//!
//! Pure and deterministic. Two policies, selected by [`OutputMode`]:
//!
//! ```text
//! StructuredBullets
//!   strip bullet prefixes ─► split question / outcomes ─► keep ≤5 outcomes
//!   ─► relabel "Outcome: …" ─► clip each to 16 tokens ─► one "Question: …?"
//!
//! FreeParagraphs
//!   strip bullet prefixes + "**" only; line structure passes through
//! ```
//!
//! Both modes normalize line endings and trim first; empty input yields
//! empty output.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum outcome bullets kept in structured mode.
pub const MAX_OUTCOMES: usize = 5;
/// Maximum whitespace tokens per structured bullet.
pub const MAX_WORDS: usize = 16;
/// Appended when clipping drops content.
pub const ELLIPSIS: char = '…';

const OUTCOME_LABEL: &str = "Outcome:";
const QUESTION_LABEL: &str = "Question:";
const FALLBACK_QUESTION: &str =
    "Favor Agent X, Agent C, or a hybrid: which client outcome matters most";

/// Which output contract to enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputMode {
    /// "- Outcome: …" bullets plus exactly one trailing "- Question: …?".
    #[default]
    StructuredBullets,
    /// Short emoji-tagged paragraphs, passed through after light cleanup.
    FreeParagraphs,
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StructuredBullets => write!(f, "structured_bullets"),
            Self::FreeParagraphs => write!(f, "free_paragraphs"),
        }
    }
}

/// Apply the output contract for `mode` to `text`.
pub fn normalize(text: &str, mode: OutputMode) -> String {
    match mode {
        OutputMode::StructuredBullets => normalize_structured(text),
        OutputMode::FreeParagraphs => normalize_paragraphs(text),
    }
}

fn prepare(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace("**", "")
        .trim()
        .to_string()
}

fn normalize_structured(text: &str) -> String {
    let raw = prepare(text);
    if raw.is_empty() {
        return String::new();
    }

    let lines: Vec<String> = raw
        .split('\n')
        .map(strip_bullet_prefix)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return raw;
    }

    let question_idx = lines.iter().rposition(|line| is_question(line));
    let question_raw = question_idx.map(|idx| lines[idx].as_str()).unwrap_or("");

    let mut bullets: Vec<String> = lines
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != question_idx)
        .take(MAX_OUTCOMES)
        .map(|(_, line)| {
            let cleaned = strip_label(line, OUTCOME_LABEL);
            let labeled = format!("{OUTCOME_LABEL} {cleaned}");
            format!("- {}", clip_words_preserving_backticks(&labeled, MAX_WORDS))
        })
        .collect();

    let mut question = clip_words_preserving_backticks(&ensure_question(question_raw), MAX_WORDS);
    if !question.ends_with('?') {
        question.push('?');
    }
    bullets.push(format!("- {question}"));

    bullets.join("\n")
}

fn normalize_paragraphs(text: &str) -> String {
    let raw = prepare(text);
    if raw.is_empty() {
        return String::new();
    }

    raw.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                strip_bullet_prefix(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_question(line: &str) -> bool {
    let t = line.trim();
    has_label(t, QUESTION_LABEL) || t.ends_with('?')
}

fn has_label(text: &str, label: &str) -> bool {
    text.get(..label.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(label))
}

/// Remove a leading case-insensitive `label` and trim.
fn strip_label<'a>(text: &'a str, label: &str) -> &'a str {
    let t = text.trim();
    if has_label(t, label) {
        t[label.len()..].trim()
    } else {
        t
    }
}

static BULLET_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•]\s*)?(?:[0-9]{1,6}[.)]\s*)?").expect("bullet prefix regex is valid")
});

/// Strip one leading `-`, `*`, or `•` marker and/or an `N.` / `N)` numeral.
pub fn strip_bullet_prefix(line: &str) -> String {
    let trimmed = line.trim();
    BULLET_PREFIX.replace(trimmed, "").trim().to_string()
}

/// Produce `"Question: <body>?"`, synthesizing a body when `text` has none.
pub fn ensure_question(text: &str) -> String {
    let body = strip_label(text, QUESTION_LABEL);
    let body = if body.is_empty() {
        FALLBACK_QUESTION
    } else {
        body
    };
    let prefixed = format!("{QUESTION_LABEL} {body}");
    if prefixed.ends_with('?') {
        prefixed
    } else {
        format!("{prefixed}?")
    }
}

/// Split into whitespace tokens, treating a backtick span as one token.
///
/// An unterminated backtick swallows the rest of the input.
fn tokenize_preserving_backticks(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = text;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        if let Some(after) = rest.strip_prefix('`') {
            match after.find('`') {
                Some(close) => {
                    let end = 1 + close + 1;
                    tokens.push(&rest[..end]);
                    rest = &rest[end..];
                }
                None => {
                    tokens.push(rest);
                    break;
                }
            }
            continue;
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        tokens.push(&rest[..end]);
        rest = &rest[end..];
    }

    tokens
}

/// Keep at most `max_words` tokens, appending an ellipsis when clipped.
///
/// Backtick spans count as a single token and are never split. Runs of
/// whitespace collapse to one space.
pub fn clip_words_preserving_backticks(text: &str, max_words: usize) -> String {
    let tokens = tokenize_preserving_backticks(text.trim());
    if tokens.len() <= max_words {
        return tokens.join(" ");
    }
    let mut clipped = tokens[..max_words].join(" ");
    clipped.push(ELLIPSIS);
    clipped
}

/// Character-based clip with an ellipsis suffix when truncated.
pub fn clip_chars(text: &str, max_chars: usize) -> String {
    let s = text.trim();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut clipped: String = s.chars().take(max_chars).collect();
    clipped.push(ELLIPSIS);
    clipped
}
