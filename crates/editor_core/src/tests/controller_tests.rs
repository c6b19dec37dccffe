use std::time::Duration;

use super::*;
use serde_json::json;
use shared::{domain::fields, error::RemoteError, protocol::publications};
use tokio::time::{sleep, timeout};

use crate::{
    notice::{NoticeCategory, NoticeSeverity},
    store::{MemoryStore, ReactiveStore, Topic},
    test_support::{GatedExecutor, ScriptedExecutor},
    EditorContext, EditorError,
};

fn member(id: &str, role: &str) -> Row {
    Row::new(
        id,
        fields([
            ("firstName", "Ada"),
            ("lastName", "Tester"),
            ("email", "ada@example.com"),
            ("role", role),
            ("currentRole", role),
        ]),
    )
}

fn company_editor(rows: Vec<Row>, executor: Arc<dyn CommandExecutor>) -> SharedRowEditor {
    SharedRowEditor::new(
        RowCollectionEditor::with_rows(
            EntityKind::CompanyMember,
            EditorContext::for_company("c1"),
            rows,
        ),
        executor,
    )
}

fn role_of(rows: &[Row], id: &str) -> Option<String> {
    rows.iter()
        .find(|row| row.id.as_str() == id)
        .and_then(|row| row.field("role"))
        .map(ToString::to_string)
}

#[tokio::test]
async fn lock_is_released_while_the_command_is_in_flight() {
    let (executor, mut calls) = GatedExecutor::new();
    let editor = company_editor(vec![member("u1", "noRole"), member("u2", "noRole")], Arc::new(executor));
    let mut notices = editor.subscribe_notices();

    let task = {
        let editor = editor.clone();
        tokio::spawn(async move {
            editor
                .update_row(&EntityId::new("u1"), fields([("role", "admin")]))
                .await
        })
    };
    let call = timeout(Duration::from_secs(1), calls.recv())
        .await
        .expect("call in time")
        .expect("call");
    assert_eq!(call.command.name, "users.updateRole");

    assert!(editor.is_in_flight(&EntityId::new("u1")).await);
    assert_eq!(role_of(&editor.rows().await, "u1").as_deref(), Some("admin"));

    editor
        .reconcile(vec![member("u1", "noRole"), member("u2", "admin")])
        .await;
    let rows = editor.rows().await;
    assert_eq!(role_of(&rows, "u1").as_deref(), Some("admin"));
    assert_eq!(role_of(&rows, "u2").as_deref(), Some("admin"));

    assert_eq!(
        editor
            .update_row(&EntityId::new("u1"), fields([("role", "noRole")]))
            .await,
        Err(EditorError::Conflict(EntityId::new("u1")))
    );
    let conflict = notices.recv().await.expect("conflict notice");
    assert_eq!(conflict.category(), NoticeCategory::Conflict);

    call.reject(RemoteError::new(
        shared::error::ErrorCode::Unknown,
        "Email already exists",
    ));
    let err = task.await.expect("join").expect_err("rejected");
    assert_eq!(err.to_string(), "Email already exists");

    let notice = notices.recv().await.expect("failure notice");
    assert_eq!(notice.message(), "Email already exists");
    assert_eq!(notice.severity(), NoticeSeverity::Error);
    assert_eq!(role_of(&editor.rows().await, "u1").as_deref(), Some("noRole"));
    assert!(!editor.is_in_flight(&EntityId::new("u1")).await);
}

#[tokio::test]
async fn success_emits_the_confirmation_notice() {
    let executor = Arc::new(ScriptedExecutor::replying([Ok(json!("u9")), Ok(json!(true))]));
    let editor = company_editor(vec![], executor.clone());
    let mut notices = editor.subscribe_notices();

    let outcome = editor
        .add_row(fields([
            ("firstName", "Cy"),
            ("lastName", "Tester"),
            ("email", "cy@example.com"),
            ("role", "noRole"),
        ]))
        .await
        .expect("added");
    assert!(matches!(&outcome, RowOutcome::Added(row) if row.id.as_str() == "u9"));
    assert_eq!(
        notices.recv().await.expect("notice").message(),
        "User Invited Successfully."
    );

    let outcome = editor.delete_row(&EntityId::new("u9")).await.expect("deleted");
    assert_eq!(outcome, RowOutcome::Deleted(EntityId::new("u9")));
    assert_eq!(
        notices.recv().await.expect("notice").message(),
        "User Removed Successfully."
    );
    assert!(editor.rows().await.is_empty());
    assert_eq!(executor.calls().len(), 2);
}

#[tokio::test]
async fn reconcile_task_follows_store_snapshots() {
    let store = MemoryStore::new();
    let topic = Topic::new(publications::PEOPLES).with_param("companyId", "c1");
    let editor = company_editor(vec![], Arc::new(ScriptedExecutor::default()));
    assert_eq!(editor.kind().await, EntityKind::CompanyMember);

    let handle = editor.spawn_reconcile_task(store.subscribe(&topic).await, rows_from_entities);
    store
        .publish(
            &topic,
            vec![
                member("u1", "admin").into(),
                Entity::new(fields([("firstName", "No id")])),
            ],
        )
        .await;

    let rows = timeout(Duration::from_secs(1), async {
        loop {
            let rows = editor.rows().await;
            if !rows.is_empty() {
                return rows;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("snapshot reconciled");
    assert_eq!(rows, vec![member("u1", "admin")]);

    drop(store);
    timeout(Duration::from_secs(1), handle)
        .await
        .expect("task ends with the store")
        .expect("join");
}

#[tokio::test]
async fn abandoned_change_still_settles() {
    let (executor, mut calls) = GatedExecutor::new();
    let editor = company_editor(vec![member("u1", "noRole")], Arc::new(executor));
    let mut notices = editor.subscribe_notices();

    let abandoned = timeout(
        Duration::from_millis(50),
        editor.update_row(&EntityId::new("u1"), fields([("role", "admin")])),
    )
    .await;
    assert!(abandoned.is_err());

    let call = timeout(Duration::from_secs(1), calls.recv())
        .await
        .expect("call in time")
        .expect("call");
    assert!(editor.is_in_flight(&EntityId::new("u1")).await);
    call.reject(RemoteError::new(
        shared::error::ErrorCode::Unknown,
        "Email already exists",
    ));

    let notice = timeout(Duration::from_secs(1), notices.recv())
        .await
        .expect("notice in time")
        .expect("failure notice");
    assert_eq!(notice.message(), "Email already exists");
    assert!(!editor.is_in_flight(&EntityId::new("u1")).await);
    assert_eq!(role_of(&editor.rows().await, "u1").as_deref(), Some("noRole"));

    let retry = {
        let editor = editor.clone();
        tokio::spawn(async move {
            editor
                .update_row(&EntityId::new("u1"), fields([("role", "admin")]))
                .await
        })
    };
    let call = timeout(Duration::from_secs(1), calls.recv())
        .await
        .expect("retry call in time")
        .expect("retry call");
    call.resolve(json!(true));
    assert!(retry.await.expect("join").is_ok());
}
