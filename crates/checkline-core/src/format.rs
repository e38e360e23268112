use crate::models::TaskLine;

fn format_tag(tag: &str) -> String {
    let tag = tag.trim();
    if tag.is_empty() || tag.starts_with('#') {
        tag.to_string()
    } else {
        format!("#{}", tag)
    }
}

fn format_property(key: &str, value: &str) -> String {
    format!("[{}:: {}]", key.trim(), value.trim())
}

/// Serialize a [`TaskLine`] in canonical order: tags and annotations that
/// precede the content, the content, then trailing tags, trailing
/// annotations and the block reference.
///
/// Pieces are joined by single spaces so content can never fuse with a
/// following tag. The indentation is written back untouched.
pub fn reconstruct_task_line(task: &TaskLine) -> String {
    let mut pieces: Vec<String> = Vec::new();
    pieces.extend(task.tags_before.iter().map(|tag| format_tag(tag)));
    pieces.extend(
        task.properties_before
            .iter()
            .map(|(key, value)| format_property(key, value)),
    );
    pieces.push(task.content.trim().to_string());
    pieces.extend(task.tags_after.iter().map(|tag| format_tag(tag)));
    pieces.extend(
        task.properties_after
            .iter()
            .map(|(key, value)| format_property(key, value)),
    );
    if let Some(anchor) = &task.block_reference {
        pieces.push(format!("^{}", anchor.trim_start_matches('^')));
    }

    let body = pieces
        .into_iter()
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    format!("{}{} [{}] {}", task.indent, task.marker, task.status, body)
}
