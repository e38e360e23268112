//! Checklist line parsing.
//!
//! A line is `<indent><marker> [<status>] <body>`. The body is scanned for
//! two token classes, `[key:: value]` annotations and `#tags`; whatever text
//! is left between tokens is the task's content. Tokens that come before the
//! first piece of text are "before content", the rest are "after content".

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::CoreError;
use crate::models::{PropertyMap, TaskLine};

static PREFIX_RE: OnceLock<Regex> = OnceLock::new();
static PROPERTY_RE: OnceLock<Regex> = OnceLock::new();
static TAG_RE: OnceLock<Regex> = OnceLock::new();
static BLOCK_REF_RE: OnceLock<Regex> = OnceLock::new();
static PROTECTED_RE: OnceLock<Regex> = OnceLock::new();

fn prefix_re() -> &'static Regex {
    PREFIX_RE.get_or_init(|| {
        Regex::new(r"^([ \t]*)([-*+]|\d+\.)[ \t]+\[(.)\](?:[ \t]+|$)").expect("valid prefix pattern")
    })
}

fn property_re() -> &'static Regex {
    PROPERTY_RE.get_or_init(|| Regex::new(r"\[([^\[\]]+?)::([^\]]*)\]").expect("valid property pattern"))
}

pub(crate) fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"#[\p{L}\p{N}_/-]+").expect("valid tag pattern"))
}

fn block_ref_re() -> &'static Regex {
    BLOCK_REF_RE.get_or_init(|| Regex::new(r"(?:^|\s)\^([A-Za-z0-9-]+)\s*$").expect("valid block reference pattern"))
}

/// Wiki links, markdown links, inline code and URLs. A `#` inside one of
/// these is part of the text, not a tag.
fn protected_re() -> &'static Regex {
    PROTECTED_RE.get_or_init(|| {
        Regex::new(r"\[\[[^\]]*\]\]|\[[^\]]*\]\([^)]*\)|`[^`]*`|https?://\S+").expect("valid protected pattern")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Property { key: String, value: String },
    Tag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub span: Range<usize>,
    pub kind: TokenKind,
}

/// The pieces of a checklist line around its body.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LineParts<'a> {
    pub indent: &'a str,
    pub marker: &'a str,
    pub status: char,
    /// Text between the checkbox and the block reference.
    pub body: &'a str,
    pub block_reference: Option<&'a str>,
}

pub(crate) fn split_line(line: &str) -> Option<LineParts<'_>> {
    let captures = prefix_re().captures(line)?;
    let whole = captures.get(0)?;
    let indent = captures.get(1)?.as_str();
    let marker = captures.get(2)?.as_str();
    let status = captures.get(3)?.as_str().chars().next()?;

    let rest = line[whole.end()..].trim_end_matches(['\r', '\n']);
    let (body, block_reference) = match block_ref_re().captures(rest) {
        Some(found) => {
            let start = found.get(0).map(|m| m.start()).unwrap_or(rest.len());
            (&rest[..start], found.get(1).map(|m| m.as_str()))
        }
        None => (rest, None),
    };

    Some(LineParts {
        indent,
        marker,
        status,
        body,
        block_reference,
    })
}

/// The `[key:: value]` annotations in `body`, ordered by position.
pub(crate) fn property_tokens(body: &str) -> Vec<Token> {
    property_re()
        .captures_iter(body)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let key = captures.get(1)?.as_str().trim();
            if key.is_empty() {
                return None;
            }
            let value = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            Some(Token {
                span: whole.range(),
                kind: TokenKind::Property {
                    key: key.to_string(),
                    value: value.to_string(),
                },
            })
        })
        .collect()
}

/// Protected spans of `body`, matched with the `annotations` blanked out so
/// that a link cannot swallow an annotation. Byte offsets are unchanged.
pub(crate) fn protected_spans(body: &str, annotations: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut blanked = String::with_capacity(body.len());
    for (index, c) in body.char_indices() {
        if annotations.iter().any(|span| span.contains(&index)) {
            blanked.extend(std::iter::repeat(' ').take(c.len_utf8()));
        } else {
            blanked.push(c);
        }
    }
    protected_re().find_iter(&blanked).map(|m| m.range()).collect()
}

/// Every annotation and tag in `body`, ordered by position. Tags inside an
/// annotation or a protected span are ignored.
pub(crate) fn scan_tokens(body: &str) -> Vec<Token> {
    let mut tokens = property_tokens(body);

    let annotations: Vec<Range<usize>> = tokens.iter().map(|token| token.span.clone()).collect();
    let masked: Vec<Range<usize>> = protected_spans(body, &annotations)
        .into_iter()
        .chain(annotations)
        .collect();

    let tags = tag_re()
        .find_iter(body)
        .filter(|found| {
            !masked
                .iter()
                .any(|span| found.start() < span.end && span.start < found.end())
        })
        .map(|found| Token {
            span: found.range(),
            kind: TokenKind::Tag(found.as_str().to_string()),
        })
        .collect::<Vec<_>>();

    tokens.extend(tags);
    tokens.sort_by_key(|token| token.span.start);
    tokens
}

/// Non-blank text runs between tokens, in order, with their offsets.
pub(crate) fn text_segments<'a>(body: &'a str, tokens: &[Token]) -> Vec<(usize, &'a str)> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for token in tokens {
        if token.span.start > cursor {
            push_segment(&mut segments, body, cursor..token.span.start);
        }
        cursor = cursor.max(token.span.end);
    }
    if cursor < body.len() {
        push_segment(&mut segments, body, cursor..body.len());
    }
    segments
}

fn push_segment<'a>(segments: &mut Vec<(usize, &'a str)>, body: &'a str, range: Range<usize>) {
    let text = &body[range.clone()];
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        let offset = range.start + (text.len() - text.trim_start().len());
        segments.push((offset, trimmed));
    }
}

fn insert_property(before: &mut PropertyMap, after: &mut PropertyMap, target_before: bool, key: String, value: String) {
    if let Some(existing) = before.get_mut(&key) {
        *existing = value;
    } else if let Some(existing) = after.get_mut(&key) {
        *existing = value;
    } else if target_before {
        before.insert(key, value);
    } else {
        after.insert(key, value);
    }
}

/// Parse one line of text into a [`TaskLine`].
///
/// Returns [`CoreError::Parse`] when the line is not a checklist item; such
/// lines must be left untouched by callers.
pub fn parse_task_line(line: &str) -> Result<TaskLine, CoreError> {
    let parts = split_line(line).ok_or_else(|| CoreError::Parse(line.to_string()))?;

    let tokens = scan_tokens(parts.body);
    let segments = text_segments(parts.body, &tokens);
    // With no text at all, everything counts as before the (empty) content.
    let content_start = segments.first().map(|(offset, _)| *offset).unwrap_or(usize::MAX);

    let mut task = TaskLine {
        indent: parts.indent.to_string(),
        marker: parts.marker.to_string(),
        status: parts.status,
        tags_before: Vec::new(),
        tags_after: Vec::new(),
        properties_before: PropertyMap::new(),
        properties_after: PropertyMap::new(),
        content: segments
            .iter()
            .map(|(_, text)| *text)
            .collect::<Vec<_>>()
            .join(" "),
        block_reference: parts.block_reference.map(str::to_string),
    };

    for token in tokens {
        let before = token.span.start < content_start;
        match token.kind {
            TokenKind::Tag(tag) if before => task.tags_before.push(tag),
            TokenKind::Tag(tag) => task.tags_after.push(tag),
            TokenKind::Property { key, value } => insert_property(
                &mut task.properties_before,
                &mut task.properties_after,
                before,
                key,
                value,
            ),
        }
    }

    Ok(task)
}

/// Cheap check used when scanning whole documents.
pub fn is_task_line(line: &str) -> bool {
    prefix_re().is_match(line)
}
