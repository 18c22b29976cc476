//! Shared utility functions for provider adapters.

use vox_domain::error::Error;

use crate::traits::HistoryTurn;

/// System prompt used when no personality file is configured or readable.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Load the shared system prompt from the configured personality file.
///
/// Falls back to [`DEFAULT_SYSTEM_PROMPT`] when the path is unset, the
/// file is unreadable, or its content is empty.
pub fn load_system_prompt(path: Option<&str>) -> String {
    let Some(path) = path else {
        return DEFAULT_SYSTEM_PROMPT.to_owned();
    };
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            tracing::info!(path = %path, "loaded personality prompt");
            content.trim().to_owned()
        }
        Ok(_) => {
            tracing::warn!(path = %path, "personality file is empty, using default prompt");
            DEFAULT_SYSTEM_PROMPT.to_owned()
        }
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "failed to read personality file, using default prompt");
            DEFAULT_SYSTEM_PROMPT.to_owned()
        }
    }
}

/// Expand history into alternating user/assistant role messages in the
/// OpenAI wire shape (Anthropic accepts the same pair structure).
pub(crate) fn history_to_messages(history: &[HistoryTurn]) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(history.len() * 2);
    for turn in history {
        messages.push(serde_json::json!({"role": "user", "content": turn.user}));
        messages.push(serde_json::json!({"role": "assistant", "content": turn.assistant}));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_personality_path_uses_default() {
        assert_eq!(load_system_prompt(None), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(
            load_system_prompt(Some("/nonexistent/Personality.txt")),
            DEFAULT_SYSTEM_PROMPT
        );
    }

    #[test]
    fn personality_file_content_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  You are a grumpy pirate.  ").unwrap();
        let prompt = load_system_prompt(file.path().to_str());
        assert_eq!(prompt, "You are a grumpy pirate.");
    }

    #[test]
    fn empty_personality_file_uses_default() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let prompt = load_system_prompt(file.path().to_str());
        assert_eq!(prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn history_expands_to_role_pairs() {
        let history = vec![HistoryTurn {
            user: "hi".into(),
            assistant: "hello".into(),
        }];
        let messages = history_to_messages(&history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], "hello");
    }
}
