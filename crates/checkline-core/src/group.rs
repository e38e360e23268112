//! Recurrence groups: a parent record plus its materialized child
//! occurrences, all sharing one recurrence id.
//!
//! Every bulk operation is pure. It returns a [`GroupPlan`] listing the
//! per-member writes, and the caller applies those one member at a time.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::analyzer::{ensure_single_line, has_embedded_tags};
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::models::{DateValue, TaskRecord};
use crate::mutation::{apply_date_edit, transition_status, DateEdit};
use crate::recurrence::{generate_occurrence_sequence, parse_recurrence_pattern, RecurrenceRule};
use crate::status::StatusTable;

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember<I, R> {
    pub id: I,
    pub record: R,
}

impl<I, R> GroupMember<I, R> {
    pub fn new(id: I, record: R) -> Self {
        Self { id, record }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupChange<I, R> {
    Update { id: I, record: R },
    /// The member is deleted outright.
    Remove { id: I },
}

impl<I, R> GroupChange<I, R> {
    pub fn id(&self) -> &I {
        match self {
            GroupChange::Update { id, .. } => id,
            GroupChange::Remove { id } => id,
        }
    }
}

/// Ordered writes produced by a group operation. Members that would not
/// change are left out.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan<I, R> {
    pub changes: Vec<GroupChange<I, R>>,
}

impl<I, R> GroupPlan<I, R> {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupChange<I, R>> {
        self.changes.iter()
    }
}

impl<I, R> IntoIterator for GroupPlan<I, R> {
    type Item = GroupChange<I, R>;
    type IntoIter = std::vec::IntoIter<GroupChange<I, R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// New dates, and optionally a new rule, for a whole group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleUpdate {
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub all_day: bool,
    /// Replacement rule text. `None` keeps the parent's current rule.
    pub rule: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceGroup<I, R> {
    pub recurrence_id: String,
    pub parent: GroupMember<I, R>,
    /// Ordered by occurrence date, then id.
    pub children: Vec<GroupMember<I, R>>,
}

impl<I, R> RecurrenceGroup<I, R>
where
    I: Clone + Ord + fmt::Display,
    R: TaskRecord,
{
    /// Collect the members of `recurrence_id` from `candidates`.
    ///
    /// The parent is the member carrying a recurrence rule, `origin` when
    /// several do. Without any rule-carrying member, `origin` itself is the
    /// parent. Returns [`CoreError::NotFound`] if neither exists.
    pub fn discover(
        recurrence_id: &str,
        candidates: impl IntoIterator<Item = GroupMember<I, R>>,
        origin: Option<&I>,
        config: &CoreConfig,
    ) -> Result<Self, CoreError> {
        let mut members: Vec<GroupMember<I, R>> = candidates
            .into_iter()
            .filter(|member| {
                member.record.property(&config.recurrence_id_key).as_deref() == Some(recurrence_id)
            })
            .collect();

        let is_origin = |member: &GroupMember<I, R>| origin == Some(&member.id);
        let has_rule = |member: &GroupMember<I, R>| member.record.has_property(&config.recurrence_key);

        let parent_index = members
            .iter()
            .position(|member| has_rule(member) && is_origin(member))
            .or_else(|| members.iter().position(has_rule))
            .or_else(|| members.iter().position(is_origin))
            .ok_or_else(|| CoreError::NotFound(format!("Parent of recurrence group {}", recurrence_id)))?;

        let parent = members.remove(parent_index);
        members.sort_by(|a, b| {
            let a_date = a.record.occurrence_date(config).map(|date| date.naive());
            let b_date = b.record.occurrence_date(config).map(|date| date.naive());
            a_date.cmp(&b_date).then_with(|| a.id.cmp(&b.id))
        });

        debug!(recurrence_id, parent = %parent.id, children = members.len(), "Discovered recurrence group");
        Ok(Self {
            recurrence_id: recurrence_id.to_string(),
            parent,
            children: members,
        })
    }

    pub fn members(&self) -> impl Iterator<Item = &GroupMember<I, R>> {
        std::iter::once(&self.parent).chain(self.children.iter())
    }

    pub fn len(&self) -> usize {
        self.children.len() + 1
    }

    fn is_after(member: &GroupMember<I, R>, threshold: NaiveDate, config: &CoreConfig) -> bool {
        member
            .record
            .occurrence_date(config)
            .is_some_and(|date| date.date() > threshold)
    }

    fn status_plan<'a>(
        members: impl Iterator<Item = &'a GroupMember<I, R>>,
        symbol: char,
        today: NaiveDate,
        statuses: &StatusTable,
    ) -> Result<GroupPlan<I, R>, CoreError>
    where
        I: 'a,
        R: 'a,
    {
        let mut changes = Vec::new();
        for member in members {
            let outcome = transition_status(&member.record, symbol, today, statuses)?;
            if outcome.changed {
                changes.push(GroupChange::Update {
                    id: member.id.clone(),
                    record: outcome.record,
                });
            }
        }
        Ok(GroupPlan { changes })
    }

    /// Apply the status transition to every member. Completing members here
    /// never spawns further occurrences.
    pub fn set_status(&self, symbol: char, today: NaiveDate, statuses: &StatusTable) -> Result<GroupPlan<I, R>, CoreError> {
        Self::status_plan(self.members(), symbol, today, statuses)
    }

    /// Like [`set_status`](Self::set_status), limited to members dated
    /// strictly after `threshold`.
    pub fn set_status_after(
        &self,
        symbol: char,
        threshold: NaiveDate,
        today: NaiveDate,
        config: &CoreConfig,
    ) -> Result<GroupPlan<I, R>, CoreError> {
        let members = self
            .members()
            .filter(|member| Self::is_after(member, threshold, config));
        Self::status_plan(members, symbol, today, &config.statuses)
    }

    fn resolve_rule(&self, update: &ScheduleUpdate, config: &CoreConfig) -> Result<RecurrenceRule, CoreError> {
        let text = match &update.rule {
            Some(text) => text.clone(),
            None => self.parent.record.property(&config.recurrence_key).unwrap_or_default(),
        };
        parse_recurrence_pattern(&text)
            .ok_or_else(|| CoreError::Validation(format!("Unrecognized recurrence rule \"{}\"", text)))
    }

    fn with_rule_text(record: &mut R, update: &ScheduleUpdate, config: &CoreConfig) {
        if let Some(text) = &update.rule {
            record.set_property(&config.recurrence_key, text.trim());
        }
    }

    /// Reassign `children` to successive occurrences after `anchor`, each
    /// keeping the update's span.
    fn reschedule_children<'a>(
        children: impl Iterator<Item = &'a GroupMember<I, R>>,
        anchor: NaiveDateTime,
        rule: RecurrenceRule,
        update: &ScheduleUpdate,
        config: &CoreConfig,
        changes: &mut Vec<GroupChange<I, R>>,
    ) where
        I: 'a,
        R: 'a,
    {
        let span: Option<Duration> = update.end.map(|end| end - update.start);
        let occurrences = generate_occurrence_sequence(DateValue::from_naive(anchor, update.all_day), rule);

        for (child, occurrence) in children.zip(occurrences) {
            let start = occurrence.naive();
            let end = span.map(|span| start + span);
            let edit = DateEdit::for_record(&child.record, start, end, update.all_day, config);
            let outcome = apply_date_edit(&child.record, &edit, config);
            if outcome.changed {
                changes.push(GroupChange::Update {
                    id: child.id.clone(),
                    record: outcome.record,
                });
            }
        }
    }

    /// Regenerate the whole schedule from a new start and rule. The parent
    /// takes the new dates directly, children take the following
    /// occurrences in order. Only the parent stores the rule text.
    pub fn update_schedule(&self, update: &ScheduleUpdate, config: &CoreConfig) -> Result<GroupPlan<I, R>, CoreError> {
        let rule = self.resolve_rule(update, config)?;
        let mut changes = Vec::new();

        let edit = DateEdit::for_record(&self.parent.record, update.start, update.end, update.all_day, config);
        let mut parent = apply_date_edit(&self.parent.record, &edit, config).record;
        Self::with_rule_text(&mut parent, update, config);
        if parent != self.parent.record {
            changes.push(GroupChange::Update {
                id: self.parent.id.clone(),
                record: parent,
            });
        }

        Self::reschedule_children(self.children.iter(), update.start, rule, update, config, &mut changes);
        Ok(GroupPlan { changes })
    }

    /// Reschedule only the children dated strictly after `threshold`.
    /// Occurrences are generated from the threshold day at the update's
    /// time of day. The parent's dates are kept; only its rule text changes.
    pub fn update_schedule_after(
        &self,
        update: &ScheduleUpdate,
        threshold: NaiveDate,
        config: &CoreConfig,
    ) -> Result<GroupPlan<I, R>, CoreError> {
        let rule = self.resolve_rule(update, config)?;
        let mut changes = Vec::new();

        let mut parent = self.parent.record.clone();
        Self::with_rule_text(&mut parent, update, config);
        if parent != self.parent.record {
            changes.push(GroupChange::Update {
                id: self.parent.id.clone(),
                record: parent,
            });
        }

        let anchor = threshold.and_time(update.start.time());
        let future = self
            .children
            .iter()
            .filter(|child| Self::is_after(child, threshold, config));
        Self::reschedule_children(future, anchor, rule, update, config, &mut changes);
        Ok(GroupPlan { changes })
    }

    /// Overwrite the parent's text, and each child's text that still equals
    /// the parent's previous text. Children with their own text, or with no
    /// text at all, keep it.
    pub fn update_text(&self, new_text: &str) -> Result<GroupPlan<I, R>, CoreError> {
        ensure_single_line(new_text)?;
        if has_embedded_tags(new_text) {
            return Err(CoreError::Validation(format!(
                "New text \"{}\" has a tag glued to a word; separate tags with a space",
                new_text
            )));
        }

        let previous = self.parent.record.content().to_string();
        let mut changes = Vec::new();
        for (index, member) in self.members().enumerate() {
            let inherits = index == 0 || (!member.record.content().is_empty() && member.record.content() == previous);
            if !inherits {
                continue;
            }
            let mut record = member.record.clone();
            record.set_content(new_text);
            if record.content() != member.record.content() {
                changes.push(GroupChange::Update {
                    id: member.id.clone(),
                    record,
                });
            }
        }
        Ok(GroupPlan { changes })
    }

    fn stripped_parent(&self, config: &CoreConfig) -> GroupChange<I, R> {
        let mut record = self.parent.record.clone();
        record.strip_task(config);
        GroupChange::Update {
            id: self.parent.id.clone(),
            record,
        }
    }

    /// End the series: the parent is stripped to a plain record and every
    /// child is removed.
    pub fn delete(&self, config: &CoreConfig) -> GroupPlan<I, R> {
        let mut changes = vec![self.stripped_parent(config)];
        changes.extend(
            self.children
                .iter()
                .map(|child| GroupChange::Remove { id: child.id.clone() }),
        );
        GroupPlan { changes }
    }

    /// Strip the parent and remove the children dated strictly after
    /// `threshold`.
    pub fn delete_after(&self, threshold: NaiveDate, config: &CoreConfig) -> GroupPlan<I, R> {
        let mut changes = vec![self.stripped_parent(config)];
        changes.extend(
            self.children
                .iter()
                .filter(|child| Self::is_after(child, threshold, config))
                .map(|child| GroupChange::Remove { id: child.id.clone() }),
        );
        GroupPlan { changes }
    }
}
