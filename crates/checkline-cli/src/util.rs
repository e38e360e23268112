use anyhow::{anyhow, Result};
use checkline_core::error::CoreError;
use checkline_core::service::TaskService;
use checkline_core::vault::{DocumentId, Vault};
use std::path::Path;

/// Documents may be named with or without the `.md` extension.
pub fn document_id(input: &str) -> DocumentId {
    let path = Path::new(input.trim());
    if path.extension().is_some_and(|ext| ext == "md") {
        DocumentId::new(path)
    } else {
        DocumentId::new(format!("{}.md", input.trim()))
    }
}

/// Convert a 1-based line number from the command line.
pub fn line_index(line: usize) -> Result<usize> {
    line.checked_sub(1)
        .ok_or_else(|| anyhow!(CoreError::Validation("Line numbers start at 1".to_string())))
}

/// A series argument is either a recurrence id or the path of one of the
/// series' documents, which then also serves as the group origin.
pub async fn resolve_series<V: Vault>(
    service: &TaskService<V>,
    input: &str,
) -> Result<(String, Option<DocumentId>)> {
    let doc = document_id(input);
    match service.vault().read_metadata(&doc).await {
        Ok(metadata) => {
            let key = &service.config().recurrence_id_key;
            let id = metadata.get_string(key).ok_or_else(|| {
                anyhow!(CoreError::Validation(format!(
                    "Document '{}' is not part of a series (no '{}' property)",
                    doc, key
                )))
            })?;
            Ok((id, Some(doc)))
        }
        Err(CoreError::NotFound(_)) | Err(CoreError::Validation(_)) => Ok((input.trim().to_string(), None)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_adds_extension() {
        assert_eq!(document_id("inbox"), DocumentId::new("inbox.md"));
        assert_eq!(document_id("notes/today.md"), DocumentId::new("notes/today.md"));
        assert_eq!(document_id("Standup 2024-03-05"), DocumentId::new("Standup 2024-03-05.md"));
    }

    #[test]
    fn test_line_index() {
        assert_eq!(line_index(1).unwrap(), 0);
        assert!(line_index(0).is_err());
    }
}
