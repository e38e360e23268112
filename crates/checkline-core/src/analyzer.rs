//! Safety checks consulted before text edits.
//!
//! A text replacement is only safe when the task's free text is one
//! contiguous run and the new text cannot fuse with a tag once the line is
//! reconstructed.

use std::ops::Range;

use crate::error::CoreError;
use crate::models::TaskLine;
use crate::parser::{property_tokens, protected_spans, scan_tokens, split_line, tag_re, text_segments};

/// The separate runs of free text on `line`, with tags, annotations and the
/// block reference masked out.
///
/// A line whose text is one run yields the parsed content as its only
/// fragment. Several runs mean the text is scattered between tokens and a
/// replacement cannot be localized.
pub fn find_content_fragments(line: &str, task: &TaskLine) -> Vec<String> {
    let Some(parts) = split_line(line) else {
        return Vec::new();
    };
    let tokens = scan_tokens(parts.body);
    let segments = text_segments(parts.body, &tokens);

    if segments.len() <= 1 && !task.content.is_empty() {
        return vec![task.content.clone()];
    }
    segments.into_iter().map(|(_, text)| text.to_string()).collect()
}

pub fn has_split_content(line: &str, task: &TaskLine) -> bool {
    find_content_fragments(line, task).len() > 1
}

/// True when `text` contains a non-space character directly followed by a
/// `#tag`, e.g. `fix#bug`. Links, code and annotations are skipped.
pub fn has_embedded_tags(text: &str) -> bool {
    let annotations: Vec<Range<usize>> = property_tokens(text).into_iter().map(|token| token.span).collect();
    let mut masked = protected_spans(text, &annotations);
    masked.extend(annotations);

    tag_re().find_iter(text).any(|found| {
        let inside = masked
            .iter()
            .any(|span| found.start() < span.end && span.start < found.end());
        let fused = text[..found.start()]
            .chars()
            .next_back()
            .is_some_and(|c| !c.is_whitespace());
        fused && !inside
    })
}

/// Rejects text containing `\n` or `\r`.
pub fn ensure_single_line(text: &str) -> Result<(), CoreError> {
    if text.contains(['\n', '\r']) {
        return Err(CoreError::Validation(
            "Task text cannot contain line breaks".to_string(),
        ));
    }
    Ok(())
}
