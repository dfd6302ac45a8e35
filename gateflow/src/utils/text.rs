//! Cleanup of raw model replies.

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<think>.*?</think>").expect("valid regex")
});

#[allow(clippy::expect_used)]
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{3,}").expect("valid regex")
});

#[allow(clippy::expect_used)]
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$").expect("valid regex")
});

/// Removes `<think>...</think>` reasoning blocks from a model reply.
///
/// Only applies when both tags are present; otherwise the text is returned
/// unchanged. After removal, runs of three or more newlines collapse to two
/// and the result is trimmed.
///
/// # Examples
///
/// ```
/// use gateflow::text::remove_thinking_process;
///
/// let reply = "<think>\nplanning\n</think>\n\n\n\nOnce upon a time";
/// assert_eq!(remove_thinking_process(reply), "Once upon a time");
/// assert_eq!(remove_thinking_process("  plain  "), "  plain  ");
/// ```
#[must_use]
pub fn remove_thinking_process(text: &str) -> String {
    if !(text.contains("<think>") && text.contains("</think>")) {
        return text.to_string();
    }

    tracing::debug!("Stripping reasoning blocks from reply");
    let stripped = THINK_BLOCK.replace_all(text, "");
    BLANK_RUN.replace_all(&stripped, "\n\n").trim().to_string()
}

/// Returns the first balanced `{...}` object in a model reply.
///
/// Reasoning blocks and markdown code fences are removed first. Braces inside
/// JSON strings are respected.
#[must_use]
pub fn extract_json_object(reply: &str) -> Option<String> {
    let cleaned = remove_thinking_process(reply);
    let cleaned = CODE_FENCE.replace_all(&cleaned, "");

    let start = cleaned.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in cleaned[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(cleaned[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
