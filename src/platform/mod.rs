pub mod telegram;

/// A text message received from a chat platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform identifier (e.g., "telegram")
    pub platform: String,
    /// Chat the reply goes to
    pub chat_id: i64,
    /// Platform-specific sender ID, if the platform exposes one
    pub user_id: Option<u64>,
    /// Display name of the sender
    pub user_name: String,
    /// The message text
    pub text: String,
}

/// How a reply's text should be rendered by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    Plain,
    Markdown,
}

/// A reply ready to be sent back to the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingAnswer {
    pub text: String,
    pub format: ReplyFormat,
}

/// Split long messages to stay under the platform's size limit.
///
/// Splits prefer a newline, then a space, and never cut inside a UTF-8 character.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        // A single character wider than max_len
        if end == start {
            end = text[start..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| start + i)
                .unwrap_or(text.len());
        }

        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .filter(|&pos| pos > 0)
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_untouched() {
        assert_eq!(split_message("halo", 4000), vec!["halo".to_string()]);
        assert_eq!(split_message("", 4000), vec![String::new()]);
    }

    #[test]
    fn test_splits_on_newline_then_space() {
        let chunks = split_message("aaaa\nbbbb cccc", 8);
        assert_eq!(chunks, vec!["aaaa\n", "bbbb ", "cccc"]);
    }

    #[test]
    fn test_hard_split_without_separators() {
        let chunks = split_message("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_respects_char_boundaries() {
        let text = "🙏".repeat(5);
        let chunks = split_message(&text, 6);
        assert!(chunks.iter().all(|c| c.len() <= 6));
        assert_eq!(chunks.concat(), text);
    }
}
