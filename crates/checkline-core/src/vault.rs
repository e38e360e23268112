//! Document storage.
//!
//! [`Vault`] is the boundary the service layer talks to; [`FsVault`] keeps
//! documents as markdown files under a root directory, each with an optional
//! YAML metadata block between `---` lines.

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::models::Metadata;

const DOCUMENT_EXTENSION: &str = "md";
const TRASH_DIR: &str = ".trash";

/// A document addressed by its path relative to the vault root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(PathBuf);

impl DocumentId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File name without the extension.
    pub fn stem(&self) -> Option<&str> {
        self.0.file_stem().and_then(|stem| stem.to_str())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Edits a document's metadata in place while the vault holds its lock.
pub type MetadataMutator = Box<dyn FnOnce(&mut Metadata) + Send>;

pub type DocumentPredicate = dyn Fn(&Metadata) -> bool + Send + Sync;

/// Storage operations the service layer needs. Every single-line and
/// metadata update is atomic with respect to other calls on the same vault.
#[async_trait]
pub trait Vault: Send + Sync {
    async fn read_document(&self, doc: &DocumentId) -> Result<String, CoreError>;
    async fn read_line(&self, doc: &DocumentId, line: usize) -> Result<String, CoreError>;
    /// Returns `false`, without touching the file, when the line already
    /// reads `text`.
    async fn write_line_if_changed(&self, doc: &DocumentId, line: usize, text: &str) -> Result<bool, CoreError>;
    /// Returns the index of the new line. A missing document is created.
    async fn append_line(&self, doc: &DocumentId, text: &str) -> Result<usize, CoreError>;
    async fn insert_line_after(&self, doc: &DocumentId, line: usize, text: &str) -> Result<(), CoreError>;
    async fn remove_line(&self, doc: &DocumentId, line: usize) -> Result<(), CoreError>;
    async fn read_metadata(&self, doc: &DocumentId) -> Result<Metadata, CoreError>;
    /// Returns whether the mutator changed anything.
    async fn write_metadata(&self, doc: &DocumentId, mutator: MetadataMutator) -> Result<bool, CoreError>;
    async fn find_documents(&self, predicate: &DocumentPredicate) -> Result<Vec<DocumentId>, CoreError>;
    /// Fails with [`CoreError::AlreadyExists`] rather than overwrite.
    async fn create_document(&self, path: &Path, text: &str) -> Result<DocumentId, CoreError>;
    /// Rename within the same directory; `new_base` excludes the extension.
    async fn rename_document(&self, doc: &DocumentId, new_base: &str) -> Result<DocumentId, CoreError>;
    async fn trash_document(&self, doc: &DocumentId) -> Result<(), CoreError>;
    async fn ensure_directory_exists(&self, path: &Path) -> Result<(), CoreError>;
}

/* ------------------------------ Text model ------------------------------ */

/// One line of a file and the terminator that followed it (empty for a
/// final line without one).
#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    ending: &'static str,
}

/// A file split into lines. Every line keeps its own terminator so a rewrite
/// leaves untouched lines byte-identical, even in mixed-ending files.
#[derive(Debug, Clone, PartialEq)]
struct Lines {
    lines: Vec<Line>,
    /// Terminator for new lines: the file's first one, `\n` when it has none.
    newline: &'static str,
}

impl Lines {
    fn parse(content: &str) -> Self {
        let lines: Vec<Line> = content
            .split_inclusive('\n')
            .map(|raw| match raw.strip_suffix("\r\n") {
                Some(text) => Line { text: text.to_string(), ending: "\r\n" },
                None => match raw.strip_suffix('\n') {
                    Some(text) => Line { text: text.to_string(), ending: "\n" },
                    None => Line { text: raw.to_string(), ending: "" },
                },
            })
            .collect();
        let newline = lines
            .iter()
            .map(|line| line.ending)
            .find(|ending| !ending.is_empty())
            .unwrap_or("\n");
        Self { lines, newline }
    }

    fn render(&self) -> String {
        self.lines
            .iter()
            .flat_map(|line| [line.text.as_str(), line.ending])
            .collect()
    }

    fn check(&self, doc: &DocumentId, line: usize) -> Result<(), CoreError> {
        if line < self.lines.len() {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Line {} is out of range for '{}' ({} lines)",
                line,
                doc,
                self.lines.len()
            )))
        }
    }

    fn text(&self, line: usize) -> &str {
        &self.lines[line].text
    }

    fn set(&mut self, line: usize, text: String) {
        self.lines[line].text = text;
    }

    /// Appends `text` as a terminated last line.
    fn push(&mut self, text: String) -> usize {
        if let Some(last) = self.lines.last_mut() {
            if last.ending.is_empty() {
                last.ending = self.newline;
            }
        }
        self.lines.push(Line { text, ending: self.newline });
        self.lines.len() - 1
    }

    fn insert_after(&mut self, line: usize, text: String) {
        let newline = self.newline;
        let previous = &mut self.lines[line];
        let ending = if previous.ending.is_empty() {
            previous.ending = newline;
            ""
        } else {
            newline
        };
        self.lines.insert(line + 1, Line { text, ending });
    }

    fn remove(&mut self, line: usize) {
        let removed = self.lines.remove(line);
        if removed.ending.is_empty() && line == self.lines.len() {
            if let Some(last) = self.lines.last_mut() {
                last.ending = "";
            }
        }
    }
}

fn ensure_single_line(text: &str) -> Result<(), CoreError> {
    if text.contains(['\n', '\r']) {
        return Err(CoreError::Validation(
            "Line text cannot contain line breaks".to_string(),
        ));
    }
    Ok(())
}

/// Split a document into its metadata block and the text after it.
pub fn split_frontmatter(content: &str) -> Result<(Metadata, &str), CoreError> {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return Ok((Metadata::new(), content));
    };

    let closing = if rest.starts_with("---\n") || rest.starts_with("---\r\n") || rest == "---" {
        Some((0, rest.find('\n').map(|i| i + 1).unwrap_or(rest.len())))
    } else {
        rest.find("\n---\n")
            .map(|i| (i, i + 5))
            .or_else(|| rest.find("\n---\r\n").map(|i| (i, i + 6)))
            .or_else(|| rest.strip_suffix("\n---").map(|yaml| (yaml.len(), rest.len())))
    };

    let Some((yaml_end, body_start)) = closing else {
        return Ok((Metadata::new(), content));
    };

    let yaml = &rest[..yaml_end];
    let mapping = if yaml.trim().is_empty() {
        Mapping::new()
    } else {
        match serde_yaml::from_str::<Value>(yaml)? {
            Value::Mapping(mapping) => mapping,
            Value::Null => Mapping::new(),
            _ => {
                return Err(CoreError::Validation(
                    "Metadata block is not a key/value mapping".to_string(),
                ))
            }
        }
    };
    Ok((Metadata::from_mapping(mapping), &rest[body_start..]))
}

/// Rebuild a document from its metadata and body. Empty metadata drops the
/// block entirely.
pub fn render_with_frontmatter(metadata: &Metadata, body: &str) -> Result<String, CoreError> {
    if metadata.is_empty() {
        return Ok(body.to_string());
    }
    let yaml = serde_yaml::to_string(metadata.as_mapping())?;
    Ok(format!("---\n{}\n---\n{}", yaml.trim_end_matches('\n'), body))
}

/* ------------------------------ Filesystem ------------------------------ */

pub struct FsVault {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn path_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().await;
        map.entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Resolve a root-relative path. Absolute paths and `..` components are
    /// rejected before touching the filesystem.
    fn resolve(&self, relative: &Path) -> Result<PathBuf, CoreError> {
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(CoreError::Validation(format!(
                        "Path '{}' must stay inside the vault",
                        relative.display()
                    )))
                }
            }
        }
        Ok(self.root.join(relative))
    }

    async fn read_text(&self, doc: &DocumentId, path: &Path) -> Result<String, CoreError> {
        fs::read_to_string(path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => CoreError::NotFound(format!("Document '{}'", doc)),
            _ => CoreError::storage("read", path, err),
        })
    }

    async fn write_text(&self, path: &Path, text: &str) -> Result<(), CoreError> {
        fs::write(path, text)
            .await
            .map_err(|err| CoreError::storage("write", path, err))
    }

    /// Read-modify-write of a document's lines under its lock.
    async fn edit_lines<T>(
        &self,
        doc: &DocumentId,
        edit: impl FnOnce(&mut Lines) -> Result<T, CoreError> + Send,
    ) -> Result<T, CoreError> {
        self.edit_lines_with(doc, false, edit).await
    }

    /// Like [`Self::edit_lines`]; with `create_missing` an absent document
    /// starts out empty and is created on write.
    async fn edit_lines_with<T>(
        &self,
        doc: &DocumentId,
        create_missing: bool,
        edit: impl FnOnce(&mut Lines) -> Result<T, CoreError> + Send,
    ) -> Result<T, CoreError> {
        let path = self.resolve(doc.path())?;
        let lock = self.path_lock(&path).await;
        let _guard = lock.lock().await;

        let content = match self.read_text(doc, &path).await {
            Err(CoreError::NotFound(_)) if create_missing => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|err| CoreError::storage("create directory", parent, err))?;
                }
                debug!(doc = %doc, "Creating missing document");
                String::new()
            }
            other => other?,
        };
        let mut lines = Lines::parse(&content);
        let before = lines.clone();
        let result = edit(&mut lines)?;
        if lines != before {
            self.write_text(&path, &lines.render()).await?;
        }
        Ok(result)
    }

    async fn unused_path(&self, dir: &Path, stem: &str) -> PathBuf {
        let mut candidate = dir.join(format!("{}.{}", stem, DOCUMENT_EXTENSION));
        let mut counter = 1;
        while fs::try_exists(&candidate).await.unwrap_or(false) {
            candidate = dir.join(format!("{} {}.{}", stem, counter, DOCUMENT_EXTENSION));
            counter += 1;
        }
        candidate
    }

    fn relative(&self, path: &Path) -> DocumentId {
        DocumentId::new(path.strip_prefix(&self.root).unwrap_or(path))
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

#[async_trait]
impl Vault for FsVault {
    async fn read_document(&self, doc: &DocumentId) -> Result<String, CoreError> {
        let path = self.resolve(doc.path())?;
        let lock = self.path_lock(&path).await;
        let _guard = lock.lock().await;
        self.read_text(doc, &path).await
    }

    async fn read_line(&self, doc: &DocumentId, line: usize) -> Result<String, CoreError> {
        let content = self.read_document(doc).await?;
        let lines = Lines::parse(&content);
        lines.check(doc, line)?;
        Ok(lines.text(line).to_string())
    }

    async fn write_line_if_changed(&self, doc: &DocumentId, line: usize, text: &str) -> Result<bool, CoreError> {
        ensure_single_line(text)?;
        let text = text.to_string();
        self.edit_lines(doc, move |lines| {
            lines.check(doc, line)?;
            if lines.text(line) == text {
                return Ok(false);
            }
            lines.set(line, text);
            Ok(true)
        })
        .await
    }

    async fn append_line(&self, doc: &DocumentId, text: &str) -> Result<usize, CoreError> {
        ensure_single_line(text)?;
        let text = text.to_string();
        self.edit_lines_with(doc, true, move |lines| Ok(lines.push(text)))
        .await
    }

    async fn insert_line_after(&self, doc: &DocumentId, line: usize, text: &str) -> Result<(), CoreError> {
        ensure_single_line(text)?;
        let text = text.to_string();
        self.edit_lines(doc, move |lines| {
            lines.check(doc, line)?;
            lines.insert_after(line, text);
            Ok(())
        })
        .await
    }

    async fn remove_line(&self, doc: &DocumentId, line: usize) -> Result<(), CoreError> {
        self.edit_lines(doc, move |lines| {
            lines.check(doc, line)?;
            lines.remove(line);
            Ok(())
        })
        .await
    }

    async fn read_metadata(&self, doc: &DocumentId) -> Result<Metadata, CoreError> {
        let content = self.read_document(doc).await?;
        let (metadata, _) = split_frontmatter(&content)?;
        Ok(metadata)
    }

    async fn write_metadata(&self, doc: &DocumentId, mutator: MetadataMutator) -> Result<bool, CoreError> {
        let path = self.resolve(doc.path())?;
        let lock = self.path_lock(&path).await;
        let _guard = lock.lock().await;

        let content = self.read_text(doc, &path).await?;
        let (mut metadata, body) = split_frontmatter(&content)?;
        let before = metadata.clone();
        mutator(&mut metadata);
        if metadata == before {
            return Ok(false);
        }

        let rendered = render_with_frontmatter(&metadata, body)?;
        self.write_text(&path, &rendered).await?;
        debug!(doc = %doc, "Wrote metadata");
        Ok(true)
    }

    async fn find_documents(&self, predicate: &DocumentPredicate) -> Result<Vec<DocumentId>, CoreError> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|err| CoreError::storage("list", &dir, err))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|err| CoreError::storage("list", &dir, err))?
            {
                let path = entry.path();
                if is_hidden(&path) {
                    continue;
                }
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|err| CoreError::storage("inspect", &path, err))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION) {
                    continue;
                }

                let doc = self.relative(&path);
                let content = match fs::read_to_string(&path).await {
                    Ok(content) => content,
                    Err(err) => {
                        warn!(doc = %doc, error = %err, "Skipping unreadable document");
                        continue;
                    }
                };
                match split_frontmatter(&content) {
                    Ok((metadata, _)) if predicate(&metadata) => found.push(doc),
                    Ok(_) => {}
                    Err(err) => warn!(doc = %doc, error = %err, "Skipping document with invalid metadata"),
                }
            }
        }

        found.sort();
        Ok(found)
    }

    async fn create_document(&self, path: &Path, text: &str) -> Result<DocumentId, CoreError> {
        let absolute = self.resolve(path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| CoreError::storage("create directory", parent, err))?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&absolute)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => CoreError::AlreadyExists(path.to_path_buf()),
                _ => CoreError::storage("create", &absolute, err),
            })?;
        file.write_all(text.as_bytes())
            .await
            .map_err(|err| CoreError::storage("write", &absolute, err))?;
        file.flush()
            .await
            .map_err(|err| CoreError::storage("write", &absolute, err))?;

        debug!(path = %path.display(), "Created document");
        Ok(DocumentId::new(path))
    }

    async fn rename_document(&self, doc: &DocumentId, new_base: &str) -> Result<DocumentId, CoreError> {
        let new_base = new_base.trim();
        if new_base.is_empty() || new_base.contains(['/', '\\']) {
            return Err(CoreError::Validation(format!("Invalid document name '{}'", new_base)));
        }

        let from = self.resolve(doc.path())?;
        let relative_to = doc
            .path()
            .with_file_name(format!("{}.{}", new_base, DOCUMENT_EXTENSION));
        let to = self.resolve(&relative_to)?;
        if from == to {
            return Ok(doc.clone());
        }

        let lock = self.path_lock(&from).await;
        let _guard = lock.lock().await;
        if fs::try_exists(&to).await.unwrap_or(false) {
            return Err(CoreError::AlreadyExists(relative_to));
        }
        fs::rename(&from, &to)
            .await
            .map_err(|err| CoreError::storage("rename", &from, err))?;

        debug!(from = %doc, to = %relative_to.display(), "Renamed document");
        Ok(DocumentId::new(relative_to))
    }

    async fn trash_document(&self, doc: &DocumentId) -> Result<(), CoreError> {
        let from = self.resolve(doc.path())?;
        let trash = self.root.join(TRASH_DIR);
        fs::create_dir_all(&trash)
            .await
            .map_err(|err| CoreError::storage("create directory", &trash, err))?;

        let lock = self.path_lock(&from).await;
        let _guard = lock.lock().await;
        let stem = doc.stem().unwrap_or("document");
        let to = self.unused_path(&trash, stem).await;
        fs::rename(&from, &to).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => CoreError::NotFound(format!("Document '{}'", doc)),
            _ => CoreError::storage("trash", &from, err),
        })?;

        debug!(doc = %doc, "Moved document to trash");
        Ok(())
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<(), CoreError> {
        let absolute = self.resolve(path)?;
        fs::create_dir_all(&absolute)
            .await
            .map_err(|err| CoreError::storage("create directory", &absolute, err))
    }
}
