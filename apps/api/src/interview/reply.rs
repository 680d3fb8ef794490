use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm_client::strip_json_fences;

/// First `{` through last `}`, across newlines.
static JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap_or_else(|e| panic!("invalid JSON_BLOCK: {e}")));

/// The interviewer's next message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextTurn {
    pub text: String,
    #[serde(default)]
    pub followups: Vec<String>,
}

/// Normalises raw model output into a `NextTurn`.
///
/// Tries, in order: the whole (fence-stripped) output as JSON, the first
/// `{...}` block inside it, and finally the trimmed output as plain text.
pub fn parse_reply(raw: &str) -> NextTurn {
    let unfenced = strip_json_fences(raw);

    if let Some(turn) = try_json(unfenced) {
        return turn;
    }
    if let Some(turn) = JSON_BLOCK.find(unfenced).and_then(|m| try_json(m.as_str())) {
        return turn;
    }

    NextTurn {
        text: unfenced.trim().to_string(),
        followups: Vec::new(),
    }
}

fn try_json(candidate: &str) -> Option<NextTurn> {
    let mut turn: NextTurn = serde_json::from_str(candidate).ok()?;
    turn.text = turn.text.trim().to_string();
    if turn.text.is_empty() {
        return None;
    }
    turn.followups.retain(|f| !f.trim().is_empty());
    Some(turn)
}
