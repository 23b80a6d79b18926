//! Prompt construction for the two personas.
//!
//! Continuation prompts are sections joined by blank lines:
//!
//! ```text
//! Topic: <topic>
//! <history, shaped by ContextMode>
//! Continue the debate for one more round.
//! <persona stance>
//! ```

use super::state::{ContextMode, DebateRound, Persona};
use crate::normalize::{clip_chars, OutputMode};

/// Per-output character budget when every round is replayed.
pub const AUTO_CONTEXT_CLIP: usize = 900;
/// Per-output character budget when only the previous round is replayed.
pub const MANUAL_CONTEXT_CLIP: usize = 1200;

const CONTINUE_INSTRUCTION: &str = "Continue the debate for one more round.";
const CROSS_REPLY_INSTRUCTION: &str = "This is the next round. Refine at least one point from \
the previous round and add at least one new improvement.";

const BULLET_CONTRACT: &str = "\
Output ONLY plain-text bullets.
Write 3–5 bullets starting with \"- Outcome: \".
End with exactly one bullet starting with \"- Question: \" and include a \"?\".
No markdown and never use **.
If you include terminal commands, wrap them in single backticks.
The Question MUST ask which client preference/constraint matters most and whether to favor AgentX, AgentC, or a hybrid.";

const PARAGRAPH_CONTRACT: &str = "\
Output must be 2 to 6 short paragraphs. Each paragraph must start with exactly one purpose emoji as the first character (examples: 🧠 explanation, 🛠️ implementation, 🔁 refinement, ✅ constraints, ❓ final question).
Do not use bullet points, numbered lists, markdown, headings, or quote blocks. Never output **.
If you include terminal commands, wrap them in single backticks.
Append exactly one origin emoji tag at the end of key sentences: 🗣️ (from the user's latest message), 💬 (paraphrased from earlier context), 🧠 (general knowledge), 🧪 (inference), 🔮 (assumption). Never more than one origin tag per sentence.
The final paragraph must start with ❓ and contain exactly one short question addressed to the user.";

/// System prompt: persona identity followed by the output contract for `mode`.
pub fn system_prompt(persona: Persona, mode: OutputMode) -> String {
    let contract = match mode {
        OutputMode::StructuredBullets => BULLET_CONTRACT,
        OutputMode::FreeParagraphs => PARAGRAPH_CONTRACT,
    };
    format!("{}\n{}", persona.identity(), contract)
}

/// First-round prompt for a fresh topic.
pub fn start_prompt(topic: &str, persona: Persona) -> String {
    format!("Debate topic: {topic}\n\n{}", persona.stance())
}

/// Prompt for one more round on top of `history`.
///
/// The topic is taken from the last round; an empty history yields a
/// prompt with no transcript section.
pub fn continue_prompt(history: &[DebateRound], persona: Persona, mode: ContextMode) -> String {
    let topic = history.last().map(|r| r.topic.as_str()).unwrap_or("Debate");
    let mut parts = vec![format!("Topic: {topic}")];

    match (mode, history.last()) {
        (_, None) => {}
        (ContextMode::Auto, Some(_)) => {
            let transcript = history
                .iter()
                .enumerate()
                .map(|(idx, round)| {
                    format!(
                        "Round {}\n{}:\n{}\n\n{}:\n{}",
                        idx + 1,
                        Persona::Explorer.display_name(),
                        clip_chars(&round.persona_a, AUTO_CONTEXT_CLIP),
                        Persona::Skeptic.display_name(),
                        clip_chars(&round.persona_b, AUTO_CONTEXT_CLIP),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n");
            parts.push("Conversation so far:".to_string());
            parts.push(transcript);
        }
        (ContextMode::Manual, Some(last)) => {
            parts.push("Previous round:".to_string());
            for speaker in Persona::ALL {
                parts.push(format!(
                    "{}:\n{}",
                    speaker.display_name(),
                    clip_chars(last.text(speaker), MANUAL_CONTEXT_CLIP)
                ));
            }
        }
        (ContextMode::CrossReply, Some(last)) => {
            let other = persona.other();
            parts.push(format!(
                "{} previously said:\n\n{}",
                other.display_name(),
                clip_chars(last.text(other), MANUAL_CONTEXT_CLIP)
            ));
            parts.push(CROSS_REPLY_INSTRUCTION.to_string());
        }
    }

    parts.push(CONTINUE_INSTRUCTION.to_string());
    parts.push(persona.stance().to_string());
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<DebateRound> {
        vec![
            DebateRound::new("caching", "m", "x one", "c one"),
            DebateRound::new("caching", "m", "x two", "c two"),
        ]
    }

    #[test]
    fn test_start_prompt() {
        assert_eq!(
            start_prompt("Rust vs Go", Persona::Explorer),
            "Debate topic: Rust vs Go\n\nBe bold, creative, and practical."
        );
    }

    #[test]
    fn test_system_prompt_contracts() {
        let bullets = system_prompt(Persona::Skeptic, OutputMode::StructuredBullets);
        assert!(bullets.starts_with("You are AgentC"));
        assert!(bullets.contains("- Question: "));

        let paragraphs = system_prompt(Persona::Explorer, OutputMode::FreeParagraphs);
        assert!(paragraphs.starts_with("You are AgentX"));
        assert!(paragraphs.contains("2 to 6 short paragraphs"));
    }

    #[test]
    fn test_auto_context_replays_every_round() {
        let prompt = continue_prompt(&history(), Persona::Explorer, ContextMode::Auto);
        let expected = "Topic: caching\n\nConversation so far:\n\n\
Round 1\nAgent X:\nx one\n\nAgent C:\nc one\n\n\
Round 2\nAgent X:\nx two\n\nAgent C:\nc two\n\n\
Continue the debate for one more round.\n\nBe bold, creative, and practical.";
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_manual_context_uses_last_round_only() {
        let prompt = continue_prompt(&history(), Persona::Skeptic, ContextMode::Manual);
        assert!(prompt.contains("Previous round:\n\nAgent X:\nx two\n\nAgent C:\nc two"));
        assert!(!prompt.contains("x one"));
        assert!(prompt.ends_with("Be skeptical, systematic, and reliability-focused."));
    }

    #[test]
    fn test_cross_reply_shows_other_persona() {
        let prompt = continue_prompt(&history(), Persona::Skeptic, ContextMode::CrossReply);
        assert!(prompt.contains("Agent X previously said:\n\nx two"));
        assert!(!prompt.contains("c two"));
    }

    #[test]
    fn test_auto_context_clips_long_outputs() {
        let long = "a".repeat(2000);
        let rounds = vec![DebateRound::new("t", "m", long.clone(), "short")];
        let prompt = continue_prompt(&rounds, Persona::Explorer, ContextMode::Auto);
        assert!(!prompt.contains(&long));
        assert!(prompt.contains(&format!("{}…", "a".repeat(AUTO_CONTEXT_CLIP))));
    }
}
