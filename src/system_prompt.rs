//! System directive construction
//!
//! The directive is a fixed preamble followed by a tail chosen by the
//! conversation mode. It is rebuilt for every completion request and never
//! stored in the conversation log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Safety, formatting and tooling rules shared by every mode
const BASE_PROMPT: &str = r"You are a helpful conversational assistant.

Safety:
- Decline requests that would cause harm, and say briefly why.
- Do not invent facts. If you are unsure, say so.

Formatting:
- Reply in Markdown. Use fenced code blocks with a language tag for code.
- Keep answers focused on what was asked.

Tools:
- Call generate_image when the user asks for a picture, drawing or illustration. The tool returns a Markdown image reference; include it verbatim in your reply so the image is shown.
- Call web_search when the user asks about current events or facts you cannot know. Search may be unavailable; if so, say so plainly.
- Only call a tool when it is needed to answer.";

const EXPLANATORY_TAIL: &str = r"

Style: explain your reasoning step by step. Define terms the user may not know and give a short example where it helps understanding.";

const PROFESSIONAL_TAIL: &str = r"

Style: be concise and precise. Use a formal tone, lead with the answer, and avoid small talk.";

const CASUAL_TAIL: &str = r"

Style: be friendly and relaxed. Use plain everyday language and keep replies short.";

/// Conversation mode, scoped to the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Explanatory,
    Professional,
    Casual,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Explanatory, Mode::Professional, Mode::Casual];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Explanatory => "explanatory",
            Mode::Professional => "professional",
            Mode::Casual => "casual",
        }
    }

    fn tail(self) -> &'static str {
        match self {
            Mode::Explanatory => EXPLANATORY_TAIL,
            Mode::Professional => PROFESSIONAL_TAIL,
            Mode::Casual => CASUAL_TAIL,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown mode: {0} (expected explanatory, professional or casual)")]
pub struct UnknownMode(String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

/// Build the system directive for `mode`
pub fn compose(mode: Mode) -> String {
    let tail = mode.tail();
    let mut prompt = String::with_capacity(BASE_PROMPT.len() + tail.len());
    prompt.push_str(BASE_PROMPT);
    prompt.push_str(tail);
    prompt
}
