//! Read-modify-write orchestration of the pure task operations against a
//! [`Vault`].

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyzer::{ensure_single_line, has_embedded_tags};
use crate::config::CoreConfig;
use crate::error::{CoreError, GroupApplyError};
use crate::format::reconstruct_task_line;
use crate::group::{GroupChange, GroupMember, GroupPlan, RecurrenceGroup, ScheduleUpdate};
use crate::models::{DateValue, DocumentTask, Metadata, TaskLine, TaskRecord};
use crate::mutation::{apply_date_edit, apply_status_transition, edit_task_line_text, DateEdit};
use crate::parser::parse_task_line;
use crate::recurrence::{generate_occurrence_sequence, parse_recurrence_pattern};
use crate::timezone::local_today;
use crate::vault::{render_with_frontmatter, split_frontmatter, DocumentId, Vault};

pub type DocumentGroup = RecurrenceGroup<DocumentId, DocumentTask>;

/// Result of editing one checklist line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineUpdate {
    pub line: usize,
    pub text: String,
    pub changed: bool,
    /// Line index and text of a spawned next occurrence.
    pub next: Option<(usize, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListedTask {
    pub line: usize,
    pub task: TaskLine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpdate {
    pub changed: bool,
    /// Document created for the next occurrence.
    pub next: Option<DocumentId>,
}

#[derive(Debug, Clone)]
pub struct SeriesRequest {
    pub title: String,
    pub rule: String,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub all_day: bool,
    /// Overrides the configured number of pre-created children.
    pub child_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesCreated {
    pub recurrence_id: String,
    pub parent: DocumentId,
    pub children: Vec<DocumentId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupReport {
    pub updated: Vec<DocumentId>,
    pub removed: Vec<DocumentId>,
    pub renamed: Vec<(DocumentId, DocumentId)>,
}

/// Characters a document name cannot carry on common filesystems.
fn document_name(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '^' | '[' | ']' => '-',
            c => c,
        })
        .collect()
}

pub struct TaskService<V: Vault> {
    vault: V,
    config: CoreConfig,
    timezone: Tz,
    fixed_today: Option<NaiveDate>,
}

impl<V: Vault> TaskService<V> {
    pub fn new(vault: V, config: CoreConfig, timezone: Tz) -> Self {
        Self {
            vault,
            config,
            timezone,
            fixed_today: None,
        }
    }

    /// Pin the date used for status stamps.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(|| local_today(self.timezone))
    }

    /* -------------------------- Checklist lines -------------------------- */

    pub async fn task_at(&self, doc: &DocumentId, line: usize) -> Result<TaskLine, CoreError> {
        let text = self.vault.read_line(doc, line).await?;
        parse_task_line(&text)
    }

    /// Every checklist line of `doc`, with its zero-based line index.
    pub async fn list_tasks(&self, doc: &DocumentId) -> Result<Vec<ListedTask>, CoreError> {
        let content = self.vault.read_document(doc).await?;
        Ok(content
            .lines()
            .enumerate()
            .filter_map(|(line, text)| parse_task_line(text).ok().map(|task| ListedTask { line, task }))
            .collect())
    }

    /// Move a line into status `symbol`. Completing a recurring task inserts
    /// its next occurrence directly below.
    pub async fn set_line_status(&self, doc: &DocumentId, line: usize, symbol: char) -> Result<LineUpdate, CoreError> {
        let text = self.vault.read_line(doc, line).await?;
        let task = parse_task_line(&text)?;
        let result = apply_status_transition(&task, symbol, self.today(), &self.config)?;

        if !result.changed() {
            return Ok(LineUpdate {
                line,
                text,
                changed: false,
                next: None,
            });
        }

        let rendered = reconstruct_task_line(result.record());
        let changed = self.vault.write_line_if_changed(doc, line, &rendered).await?;
        let next = match result.next() {
            Some(next) => {
                let next_text = reconstruct_task_line(next);
                self.vault.insert_line_after(doc, line, &next_text).await?;
                info!(doc = %doc, line, next = %next_text, "Inserted next occurrence");
                Some((line + 1, next_text))
            }
            None => None,
        };

        debug!(doc = %doc, line, status = %symbol, "Updated task status");
        Ok(LineUpdate {
            line,
            text: rendered,
            changed,
            next,
        })
    }

    /// Advance a line to the next status in the table.
    pub async fn toggle_line(&self, doc: &DocumentId, line: usize) -> Result<LineUpdate, CoreError> {
        let task = self.task_at(doc, line).await?;
        let symbol = self.config.statuses.next_after(task.status);
        self.set_line_status(doc, line, symbol).await
    }

    pub async fn edit_line_text(
        &self,
        doc: &DocumentId,
        line: usize,
        expected: &str,
        replacement: &str,
    ) -> Result<LineUpdate, CoreError> {
        let text = self.vault.read_line(doc, line).await?;
        let outcome = edit_task_line_text(&text, expected, replacement)?;
        let changed = outcome.changed && self.vault.write_line_if_changed(doc, line, &outcome.record).await?;
        Ok(LineUpdate {
            line,
            text: outcome.record,
            changed,
            next: None,
        })
    }

    pub async fn edit_line_dates(
        &self,
        doc: &DocumentId,
        line: usize,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        all_day: bool,
    ) -> Result<LineUpdate, CoreError> {
        if end.is_some_and(|end| end < start) {
            return Err(CoreError::Validation("End must not be before start".to_string()));
        }

        let text = self.vault.read_line(doc, line).await?;
        let task = parse_task_line(&text)?;
        let edit = DateEdit::for_record(&task, start, end, all_day, &self.config);
        let outcome = apply_date_edit(&task, &edit, &self.config);
        if !outcome.changed {
            return Ok(LineUpdate {
                line,
                text,
                changed: false,
                next: None,
            });
        }

        let rendered = reconstruct_task_line(&outcome.record);
        let changed = self.vault.write_line_if_changed(doc, line, &rendered).await?;
        Ok(LineUpdate {
            line,
            text: rendered,
            changed,
            next: None,
        })
    }

    /// Append a new open task, creating `doc` if needed. Tags and annotations
    /// typed into `content` are recognized like on any other line.
    pub async fn append_task(
        &self,
        doc: &DocumentId,
        content: &str,
        due: Option<DateValue>,
        recurrence: Option<&str>,
    ) -> Result<LineUpdate, CoreError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::Validation("Task text must not be empty".to_string()));
        }
        ensure_single_line(content)?;

        let mut task = parse_task_line(&format!("- [{}] {}", self.config.statuses.incomplete_symbol(), content))?;
        if let Some(due) = due {
            task.set_property(&self.config.due_key, &due.to_string());
        }
        if let Some(rule) = recurrence {
            let parsed = parse_recurrence_pattern(rule)
                .ok_or_else(|| CoreError::Validation(format!("Unrecognized recurrence rule \"{}\"", rule)))?;
            task.set_property(&self.config.recurrence_key, &parsed.to_string());
        }

        let text = reconstruct_task_line(&task);
        let line = self.vault.append_line(doc, &text).await?;
        debug!(doc = %doc, line, "Appended task");
        Ok(LineUpdate {
            line,
            text,
            changed: true,
            next: None,
        })
    }

    /* -------------------------- Document tasks -------------------------- */

    pub async fn document_task(&self, doc: &DocumentId) -> Result<DocumentTask, CoreError> {
        let metadata = self.vault.read_metadata(doc).await?;
        Ok(DocumentTask::new(metadata, &self.config))
    }

    async fn replace_metadata(&self, doc: &DocumentId, metadata: Metadata) -> Result<bool, CoreError> {
        self.vault
            .write_metadata(doc, Box::new(move |current: &mut Metadata| *current = metadata))
            .await
    }

    /// Create `<dir>/<stem>.md`, adding a counter to the name until it is free.
    async fn create_unique(&self, dir: &Path, stem: &str, text: &str) -> Result<DocumentId, CoreError> {
        let stem = document_name(stem);
        let mut counter = 0;
        loop {
            let name = if counter == 0 {
                format!("{}.md", stem)
            } else {
                format!("{} {}.md", stem, counter)
            };
            match self.vault.create_document(&dir.join(name), text).await {
                Err(CoreError::AlreadyExists(path)) => {
                    debug!(path = %path.display(), "Document name taken");
                    counter += 1;
                }
                other => return other,
            }
        }
    }

    /// Status transition on a document task. Completing a recurring one
    /// creates the next occurrence as a sibling document named after its
    /// title and new due date.
    pub async fn set_document_status(&self, doc: &DocumentId, symbol: char) -> Result<DocumentUpdate, CoreError> {
        let content = self.vault.read_document(doc).await?;
        let (metadata, body) = split_frontmatter(&content)?;
        let task = DocumentTask::new(metadata, &self.config);
        let result = apply_status_transition(&task, symbol, self.today(), &self.config)?;

        let changed = if result.changed() {
            self.replace_metadata(doc, result.record().metadata.clone()).await?
        } else {
            false
        };

        let next = match result.next() {
            Some(next) => {
                let title = match next.content() {
                    "" => doc.stem().unwrap_or("Task").to_string(),
                    title => title.to_string(),
                };
                let due = next.property(&self.config.due_key).unwrap_or_default();
                let text = render_with_frontmatter(&next.metadata, body)?;
                let created = self.create_unique(&document_dir(doc), &format!("{} {}", title, due), &text).await?;
                info!(doc = %doc, next = %created, "Created next occurrence");
                Some(created)
            }
            None => None,
        };

        Ok(DocumentUpdate { changed, next })
    }

    /* -------------------------- Recurrence groups -------------------------- */

    fn dated_metadata(
        &self,
        title: &str,
        recurrence_id: &str,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        all_day: bool,
    ) -> DocumentTask {
        let mut metadata = Metadata::new();
        metadata.set_str(&self.config.title_key, title);
        metadata.set_str(&self.config.status_key, &self.config.statuses.incomplete_symbol().to_string());
        metadata.set_str(&self.config.recurrence_id_key, recurrence_id);
        let task = DocumentTask::new(metadata, &self.config);

        let edit = DateEdit {
            start,
            end,
            all_day,
            was_all_day: all_day,
            was_multi_day: false,
        };
        apply_date_edit(&task, &edit, &self.config).record
    }

    /// Create a recurring series in `dir`: a parent document carrying the
    /// rule plus pre-created children for the following occurrences.
    pub async fn create_series(&self, dir: &Path, request: SeriesRequest) -> Result<SeriesCreated, CoreError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("Series title must not be empty".to_string()));
        }
        ensure_single_line(title)?;
        if has_embedded_tags(title) {
            return Err(CoreError::Validation(format!(
                "Title \"{}\" has a tag glued to a word; separate tags with a space",
                title
            )));
        }
        let rule = parse_recurrence_pattern(&request.rule)
            .ok_or_else(|| CoreError::Validation(format!("Unrecognized recurrence rule \"{}\"", request.rule)))?;
        if request.end.is_some_and(|end| end < request.start) {
            return Err(CoreError::Validation("End must not be before start".to_string()));
        }

        self.vault.ensure_directory_exists(dir).await?;
        let recurrence_id = Uuid::now_v7().to_string();

        let mut parent = self.dated_metadata(title, &recurrence_id, request.start, request.end, request.all_day);
        parent.set_property(&self.config.recurrence_key, &rule.to_string());
        let parent_doc = self
            .create_unique(dir, title, &render_with_frontmatter(&parent.metadata, "")?)
            .await?;

        let span = request.end.map(|end| end - request.start);
        let count = request.child_count.unwrap_or(self.config.child_count);
        let anchor = DateValue::from_naive(request.start, request.all_day);
        let mut children = Vec::with_capacity(count);
        for occurrence in generate_occurrence_sequence(anchor, rule).take(count) {
            let start = occurrence.naive();
            let child = self.dated_metadata(title, &recurrence_id, start, span.map(|span| start + span), request.all_day);
            let name = format!("{} {}", title, occurrence.date().format("%Y-%m-%d"));
            let doc = self
                .create_unique(dir, &name, &render_with_frontmatter(&child.metadata, "")?)
                .await?;
            children.push(doc);
        }

        info!(recurrence_id = %recurrence_id, parent = %parent_doc, children = children.len(), "Created series");
        Ok(SeriesCreated {
            recurrence_id,
            parent: parent_doc,
            children,
        })
    }

    pub async fn load_group(&self, recurrence_id: &str, origin: Option<&DocumentId>) -> Result<DocumentGroup, CoreError> {
        let key = self.config.recurrence_id_key.clone();
        let wanted = recurrence_id.to_string();
        let predicate = move |metadata: &Metadata| metadata.get_string(&key).as_deref() == Some(wanted.as_str());
        let docs = self.vault.find_documents(&predicate).await?;

        let mut members = Vec::with_capacity(docs.len());
        for doc in docs {
            let task = self.document_task(&doc).await?;
            members.push(GroupMember::new(doc, task));
        }
        RecurrenceGroup::discover(recurrence_id, members, origin, &self.config)
    }

    /// Write a plan member by member. Stops at the first failure and
    /// reports how many members were already written.
    pub async fn apply_group_plan(&self, plan: GroupPlan<DocumentId, DocumentTask>) -> Result<GroupReport, GroupApplyError> {
        let total = plan.len();
        let mut report = GroupReport::default();
        for (applied, change) in plan.into_iter().enumerate() {
            let outcome = match change {
                GroupChange::Update { id, record } => {
                    let written = self.replace_metadata(&id, record.into_metadata()).await;
                    written.map(|_| report.updated.push(id))
                }
                GroupChange::Remove { id } => {
                    let trashed = self.vault.trash_document(&id).await;
                    trashed.map(|_| report.removed.push(id))
                }
            };
            if let Err(source) = outcome {
                warn!(applied, total, error = %source, "Group update stopped partway");
                return Err(GroupApplyError { applied, total, source });
            }
        }
        Ok(report)
    }

    pub async fn group_set_status(
        &self,
        recurrence_id: &str,
        origin: Option<&DocumentId>,
        symbol: char,
        after: Option<NaiveDate>,
    ) -> Result<GroupReport, CoreError> {
        let group = self.load_group(recurrence_id, origin).await?;
        let plan = match after {
            Some(threshold) => group.set_status_after(symbol, threshold, self.today(), &self.config)?,
            None => group.set_status(symbol, self.today(), &self.config.statuses)?,
        };
        Ok(self.apply_group_plan(plan).await?)
    }

    pub async fn group_update_schedule(
        &self,
        recurrence_id: &str,
        origin: Option<&DocumentId>,
        update: &ScheduleUpdate,
        after: Option<NaiveDate>,
    ) -> Result<GroupReport, CoreError> {
        if update.end.is_some_and(|end| end < update.start) {
            return Err(CoreError::Validation("End must not be before start".to_string()));
        }
        let group = self.load_group(recurrence_id, origin).await?;
        let plan = match after {
            Some(threshold) => group.update_schedule_after(update, threshold, &self.config)?,
            None => group.update_schedule(update, &self.config)?,
        };
        Ok(self.apply_group_plan(plan).await?)
    }

    /// Retitle a series. Documents whose file name was the old title follow
    /// the new one; a rename that would collide is skipped.
    pub async fn group_update_text(
        &self,
        recurrence_id: &str,
        origin: Option<&DocumentId>,
        new_text: &str,
    ) -> Result<GroupReport, CoreError> {
        let group = self.load_group(recurrence_id, origin).await?;
        let old_stem = document_name(group.parent.record.content());
        let new_stem = document_name(new_text);
        let plan = group.update_text(new_text)?;
        let mut report = self.apply_group_plan(plan).await?;

        if old_stem.is_empty() || old_stem == new_stem {
            return Ok(report);
        }
        for doc in report.updated.clone() {
            let Some(stem) = doc.stem() else { continue };
            let Some(suffix) = stem.strip_prefix(old_stem.as_str()) else {
                continue;
            };
            if !suffix.is_empty() && !suffix.starts_with(' ') {
                continue;
            }
            match self.vault.rename_document(&doc, &format!("{}{}", new_stem, suffix)).await {
                Ok(renamed) => report.renamed.push((doc, renamed)),
                Err(CoreError::AlreadyExists(path)) => {
                    warn!(doc = %doc, taken = %path.display(), "Kept old document name")
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    pub async fn group_delete(
        &self,
        recurrence_id: &str,
        origin: Option<&DocumentId>,
        after: Option<NaiveDate>,
    ) -> Result<GroupReport, CoreError> {
        let group = self.load_group(recurrence_id, origin).await?;
        let plan = match after {
            Some(threshold) => group.delete_after(threshold, &self.config),
            None => group.delete(&self.config),
        };
        Ok(self.apply_group_plan(plan).await?)
    }
}

/// Directory of `doc` inside the vault, for placing related documents.
pub fn document_dir(doc: &DocumentId) -> PathBuf {
    doc.path().parent().map(Path::to_path_buf).unwrap_or_default()
}
