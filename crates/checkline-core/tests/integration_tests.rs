use checkline_core::config::CoreConfig;
use checkline_core::error::CoreError;
use checkline_core::group::ScheduleUpdate;
use checkline_core::models::{DateValue, Metadata, TaskRecord};
use checkline_core::service::{SeriesRequest, TaskService};
use checkline_core::vault::{DocumentId, FsVault, Vault};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use tempfile::TempDir;

fn day(text: &str) -> NaiveDate {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap()
}

fn midnight(text: &str) -> NaiveDateTime {
    day(text).and_hms_opt(0, 0, 0).unwrap()
}

/// Helper function to create a service over a temporary vault
fn setup_vault(files: &[(&str, &str)]) -> (TaskService<FsVault>, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    for (name, content) in files {
        let path = temp_dir.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).expect("Failed to write fixture");
    }

    let service = TaskService::new(FsVault::new(temp_dir.path()), CoreConfig::default(), chrono_tz::UTC)
        .with_today(day("2024-03-10"));
    (service, temp_dir)
}

fn read(dir: &TempDir, name: &str) -> String {
    std::fs::read_to_string(dir.path().join(name)).expect("Failed to read document")
}

fn doc(name: &str) -> DocumentId {
    DocumentId::new(name)
}

#[tokio::test]
async fn test_completing_recurring_line_inserts_next_occurrence() {
    let (service, dir) = setup_vault(&[(
        "chores.md",
        "# Chores\n- [ ] Review budget [recurrence:: every week] [due:: 2024-03-04]\nNotes\n",
    )]);

    let update = service.set_line_status(&doc("chores.md"), 1, 'x').await.unwrap();

    assert!(update.changed);
    assert_eq!(
        update.text,
        "- [x] Review budget [recurrence:: every week] [due:: 2024-03-04] [completion:: 2024-03-10]"
    );
    assert_eq!(
        update.next,
        Some((
            2,
            "- [ ] Review budget [recurrence:: every week] [due:: 2024-03-11]".to_string()
        ))
    );
    assert_eq!(
        read(&dir, "chores.md"),
        "# Chores\n\
         - [x] Review budget [recurrence:: every week] [due:: 2024-03-04] [completion:: 2024-03-10]\n\
         - [ ] Review budget [recurrence:: every week] [due:: 2024-03-11]\n\
         Notes\n"
    );
}

#[tokio::test]
async fn test_non_task_lines_are_left_untouched() {
    let content = "# Chores\n- [ ] Laundry\n";
    let (service, dir) = setup_vault(&[("chores.md", content)]);

    let heading = service.set_line_status(&doc("chores.md"), 0, 'x').await;
    assert!(matches!(heading, Err(CoreError::Parse(_))));

    let missing = service.set_line_status(&doc("chores.md"), 7, 'x').await;
    assert!(matches!(missing, Err(CoreError::Validation(_))));

    let unknown = service.set_line_status(&doc("chores.md"), 1, 'q').await;
    assert!(matches!(unknown, Err(CoreError::Validation(_))));

    assert_eq!(read(&dir, "chores.md"), content);
}

#[tokio::test]
async fn test_toggle_cycles_status_and_skips_redundant_writes() {
    let (service, dir) = setup_vault(&[("todo.md", "- [ ] Laundry\n")]);

    let toggled = service.toggle_line(&doc("todo.md"), 0).await.unwrap();
    assert_eq!(toggled.text, "- [/] Laundry");

    let same = service.set_line_status(&doc("todo.md"), 0, '/').await.unwrap();
    assert!(!same.changed);
    assert_eq!(read(&dir, "todo.md"), "- [/] Laundry\n");
}

#[tokio::test]
async fn test_text_edit_refuses_split_content() {
    let content = "- [ ] Water plants #home feed cat\n";
    let (service, dir) = setup_vault(&[("home.md", content)]);

    let result = service
        .edit_line_text(&doc("home.md"), 0, "Water plants", "Water roses")
        .await;

    match result {
        Err(CoreError::Validation(message)) => {
            assert!(message.contains("Water plants"));
            assert!(message.contains("feed cat"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(read(&dir, "home.md"), content);
}

#[tokio::test]
async fn test_text_edit_keeps_indentation() {
    let (service, dir) = setup_vault(&[("list.md", "- [ ] Parent\n\t  - [ ] Nested item #tag ^ref-1\n")]);

    let update = service
        .edit_line_text(&doc("list.md"), 1, "item", "thing")
        .await
        .unwrap();
    assert!(update.changed);
    assert_eq!(read(&dir, "list.md"), "- [ ] Parent\n\t  - [ ] Nested thing #tag ^ref-1\n");
}

#[tokio::test]
async fn test_date_edit_branches() {
    let (service, dir) = setup_vault(&[(
        "plan.md",
        "- [ ] Trip [start:: 2024-03-01] [due:: 2024-03-03]\n- [ ] Call [due:: 2024-03-01T09:00]\n",
    )]);

    service
        .edit_line_dates(&doc("plan.md"), 0, midnight("2024-03-08"), None, true)
        .await
        .unwrap();
    service
        .edit_line_dates(
            &doc("plan.md"),
            1,
            day("2024-03-02").and_hms_opt(13, 0, 0).unwrap(),
            Some(day("2024-03-02").and_hms_opt(14, 0, 0).unwrap()),
            false,
        )
        .await
        .unwrap();

    assert_eq!(
        read(&dir, "plan.md"),
        "- [ ] Trip [due:: 2024-03-08]\n- [ ] Call [due:: 2024-03-02T14:00] [start:: 2024-03-02T13:00]\n"
    );

    let backwards = service
        .edit_line_dates(&doc("plan.md"), 1, midnight("2024-03-05"), Some(midnight("2024-03-04")), true)
        .await;
    assert!(matches!(backwards, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_append_and_list_tasks() {
    let (service, dir) = setup_vault(&[("inbox.md", "# Inbox")]);
    let inbox = doc("inbox.md");

    let added = service
        .append_task(
            &inbox,
            "Buy milk #shop",
            Some(DateValue::Date(day("2024-03-12"))),
            Some("every 2 weeks"),
        )
        .await
        .unwrap();
    assert_eq!(added.line, 1);
    assert_eq!(
        read(&dir, "inbox.md"),
        "# Inbox\n- [ ] Buy milk #shop [due:: 2024-03-12] [recurrence:: every 2 weeks]\n"
    );

    let bad_rule = service.append_task(&inbox, "Stretch", None, Some("sometimes")).await;
    assert!(matches!(bad_rule, Err(CoreError::Validation(_))));
    let empty = service.append_task(&inbox, "   ", None, None).await;
    assert!(matches!(empty, Err(CoreError::Validation(_))));

    let tasks = service.list_tasks(&inbox).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].line, 1);
    assert_eq!(tasks[0].task.content, "Buy milk");
}

#[tokio::test]
async fn test_document_completion_creates_next_document() {
    let (service, dir) = setup_vault(&[(
        "bills/Pay rent.md",
        "---\ntitle: Pay rent\ndue: 2024-03-01\nrecurrence: every month\n---\nLandlord details\n",
    )]);

    let update = service
        .set_document_status(&doc("bills/Pay rent.md"), 'x')
        .await
        .unwrap();
    assert!(update.changed);
    let next = update.next.expect("next occurrence document");
    assert_eq!(next, doc("bills/Pay rent 2024-04-01.md"));

    let original = service.document_task(&doc("bills/Pay rent.md")).await.unwrap();
    assert_eq!(original.status(), 'x');
    assert_eq!(original.property("completion").as_deref(), Some("2024-03-10"));

    let spawned = service.document_task(&next).await.unwrap();
    assert_eq!(spawned.status(), ' ');
    assert_eq!(spawned.content(), "Pay rent");
    assert_eq!(spawned.property("due").as_deref(), Some("2024-04-01"));
    assert!(!spawned.has_property("completion"));
    assert!(read(&dir, "bills/Pay rent 2024-04-01.md").ends_with("---\nLandlord details\n"));
}

async fn create_standup(service: &TaskService<FsVault>) -> String {
    let created = service
        .create_series(
            Path::new("series"),
            SeriesRequest {
                title: "Standup".to_string(),
                rule: "every day".to_string(),
                start: midnight("2024-03-04"),
                end: None,
                all_day: true,
                child_count: Some(2),
            },
        )
        .await
        .unwrap();

    assert_eq!(created.parent, doc("series/Standup.md"));
    assert_eq!(
        created.children,
        vec![doc("series/Standup 2024-03-05.md"), doc("series/Standup 2024-03-06.md")]
    );
    created.recurrence_id
}

#[tokio::test]
async fn test_series_creation_and_discovery() {
    let (service, _dir) = setup_vault(&[]);
    let recurrence_id = create_standup(&service).await;

    let group = service.load_group(&recurrence_id, None).await.unwrap();
    assert_eq!(group.parent.id, doc("series/Standup.md"));
    assert_eq!(group.parent.record.property("recurrence").as_deref(), Some("every day"));
    assert_eq!(group.parent.record.property("due").as_deref(), Some("2024-03-04"));
    let child_dues: Vec<Option<String>> = group
        .children
        .iter()
        .map(|child| child.record.property("due"))
        .collect();
    assert_eq!(
        child_dues,
        vec![Some("2024-03-05".to_string()), Some("2024-03-06".to_string())]
    );

    let missing = service.load_group("no-such-series", None).await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_group_text_update_preserves_customized_child() {
    let (service, dir) = setup_vault(&[]);
    let recurrence_id = create_standup(&service).await;

    service
        .vault()
        .write_metadata(
            &doc("series/Standup 2024-03-06.md"),
            Box::new(|metadata: &mut Metadata| metadata.set_str("title", "Standup (remote)")),
        )
        .await
        .unwrap();

    let report = service
        .group_update_text(&recurrence_id, None, "Daily sync")
        .await
        .unwrap();

    assert_eq!(report.updated.len(), 2);
    assert_eq!(
        report.renamed,
        vec![
            (doc("series/Standup.md"), doc("series/Daily sync.md")),
            (doc("series/Standup 2024-03-05.md"), doc("series/Daily sync 2024-03-05.md")),
        ]
    );
    assert!(dir.path().join("series/Daily sync.md").exists());

    let customized = service
        .document_task(&doc("series/Standup 2024-03-06.md"))
        .await
        .unwrap();
    assert_eq!(customized.content(), "Standup (remote)");
    let renamed_child = service
        .document_task(&doc("series/Daily sync 2024-03-05.md"))
        .await
        .unwrap();
    assert_eq!(renamed_child.content(), "Daily sync");
}

#[tokio::test]
async fn test_group_status_and_schedule() {
    let (service, _dir) = setup_vault(&[]);
    let recurrence_id = create_standup(&service).await;

    let report = service
        .group_set_status(&recurrence_id, None, '-', Some(day("2024-03-05")))
        .await
        .unwrap();
    assert_eq!(report.updated, vec![doc("series/Standup 2024-03-06.md")]);

    let update = ScheduleUpdate {
        start: midnight("2024-03-11"),
        end: None,
        all_day: true,
        rule: Some("every weekday".to_string()),
    };
    service
        .group_update_schedule(&recurrence_id, None, &update, None)
        .await
        .unwrap();

    let group = service.load_group(&recurrence_id, None).await.unwrap();
    assert_eq!(group.parent.record.property("due").as_deref(), Some("2024-03-11"));
    assert_eq!(group.parent.record.property("recurrence").as_deref(), Some("every weekday"));
    let dues: Vec<Option<String>> = group.children.iter().map(|c| c.record.property("due")).collect();
    assert_eq!(
        dues,
        vec![Some("2024-03-12".to_string()), Some("2024-03-13".to_string())]
    );
    assert_eq!(group.children[1].record.status(), '-');
}

#[tokio::test]
async fn test_group_delete_after_threshold() {
    let (service, dir) = setup_vault(&[]);
    let recurrence_id = create_standup(&service).await;

    let report = service
        .group_delete(&recurrence_id, None, Some(day("2024-03-05")))
        .await
        .unwrap();

    assert_eq!(report.updated, vec![doc("series/Standup.md")]);
    assert_eq!(report.removed, vec![doc("series/Standup 2024-03-06.md")]);
    assert!(!dir.path().join("series/Standup 2024-03-06.md").exists());
    assert!(dir.path().join(".trash/Standup 2024-03-06.md").exists());

    let parent = service.document_task(&doc("series/Standup.md")).await.unwrap();
    assert_eq!(parent.content(), "Standup");
    assert!(!parent.has_property("recurrence"));
    assert!(!parent.has_property("recurrence_id"));
    assert!(!parent.has_property("due"));
}

#[tokio::test]
async fn test_vault_boundaries() {
    let (service, dir) = setup_vault(&[("notes/a.md", "---\nkind: task\n---\n"), (".trash/b.md", "---\nkind: task\n---\n")]);
    let vault = service.vault();

    let escape = vault.read_line(&doc("../outside.md"), 0).await;
    assert!(matches!(escape, Err(CoreError::Validation(_))));

    let taken = vault.create_document(Path::new("notes/a.md"), "x").await;
    assert!(matches!(taken, Err(CoreError::AlreadyExists(_))));

    let missing = vault.read_document(&doc("nope.md")).await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));

    let found = vault
        .find_documents(&|metadata: &Metadata| metadata.get_str("kind") == Some("task"))
        .await
        .unwrap();
    assert_eq!(found, vec![doc("notes/a.md")]);

    let unchanged = vault
        .write_metadata(&doc("notes/a.md"), Box::new(|metadata: &mut Metadata| metadata.set_str("kind", "task")))
        .await
        .unwrap();
    assert!(!unchanged);
    assert_eq!(read(&dir, "notes/a.md"), "---\nkind: task\n---\n");
}

#[tokio::test]
async fn test_vault_line_operations_keep_line_endings() {
    let (service, dir) = setup_vault(&[("crlf.md", "# Title\r\n- [ ] one\r\n- [ ] two\r\n")]);
    let vault = service.vault();
    let crlf = doc("crlf.md");

    vault.remove_line(&crlf, 1).await.unwrap();
    assert_eq!(read(&dir, "crlf.md"), "# Title\r\n- [ ] two\r\n");

    vault.insert_line_after(&crlf, 0, "- [ ] zero").await.unwrap();
    let appended = vault.append_line(&crlf, "- [ ] three").await.unwrap();
    assert_eq!(appended, 3);
    assert_eq!(
        read(&dir, "crlf.md"),
        "# Title\r\n- [ ] zero\r\n- [ ] two\r\n- [ ] three\r\n"
    );

    assert!(!vault.write_line_if_changed(&crlf, 2, "- [ ] two").await.unwrap());
    let out_of_range = vault.remove_line(&crlf, 4).await;
    assert!(matches!(out_of_range, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_vault_keeps_mixed_line_endings() {
    let content = "# Title\r\n- [ ] one\n- [ ] two\r\n";
    let (service, dir) = setup_vault(&[("mixed.md", content)]);

    service.toggle_line(&doc("mixed.md"), 1).await.unwrap();
    assert_eq!(read(&dir, "mixed.md"), "# Title\r\n- [/] one\n- [ ] two\r\n");
}

#[tokio::test]
async fn test_line_breaks_in_text_are_rejected() {
    let content = "- [ ] Buy milk\n";
    let (service, dir) = setup_vault(&[("shop.md", content)]);
    let shop = doc("shop.md");

    let edited = service
        .edit_line_text(&shop, 0, "milk", "milk\n- [x] injected")
        .await;
    assert!(matches!(edited, Err(CoreError::Validation(_))));

    let appended = service.append_task(&shop, "call\n# Heading", None, None).await;
    assert!(matches!(appended, Err(CoreError::Validation(_))));

    let raw = service.vault().write_line_if_changed(&shop, 0, "- [ ] a\r- [ ] b").await;
    assert!(matches!(raw, Err(CoreError::Validation(_))));

    let series = service
        .create_series(
            Path::new("series"),
            SeriesRequest {
                title: "Stand\nup".to_string(),
                rule: "every day".to_string(),
                start: midnight("2024-03-04"),
                end: None,
                all_day: true,
                child_count: Some(1),
            },
        )
        .await;
    assert!(matches!(series, Err(CoreError::Validation(_))));

    assert_eq!(read(&dir, "shop.md"), content);
    assert!(!dir.path().join("series").exists());
}

#[tokio::test]
async fn test_append_creates_missing_document() {
    let (service, dir) = setup_vault(&[]);

    let added = service
        .append_task(&doc("lists/inbox.md"), "Buy milk", None, None)
        .await
        .unwrap();
    assert_eq!(added.line, 0);
    assert_eq!(read(&dir, "lists/inbox.md"), "- [ ] Buy milk\n");

    service.append_task(&doc("lists/inbox.md"), "Pay rent", None, None).await.unwrap();
    assert_eq!(read(&dir, "lists/inbox.md"), "- [ ] Buy milk\n- [ ] Pay rent\n");
}

#[tokio::test]
async fn test_single_day_all_day_edit_keeps_due_on_start() {
    let (service, dir) = setup_vault(&[("plan.md", "- [ ] Trip [due:: 2024-03-01]\n")]);

    service
        .edit_line_dates(&doc("plan.md"), 0, midnight("2024-03-04"), Some(midnight("2024-03-04")), true)
        .await
        .unwrap();
    assert_eq!(
        read(&dir, "plan.md"),
        "- [ ] Trip [due:: 2024-03-04] [start:: 2024-03-04]\n"
    );
}
