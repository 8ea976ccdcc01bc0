//! Integration tests for the history-mirrored lifecycle and undelete.

mod common;

use std::time::Duration;

use common::{init_tracing, widget_history, MemoryTransaction};
use rowkeeper_core::catalog::{CREATED_AT, DELETED, HID, ID, UPDATED_AT, UPDATED_BY};
use rowkeeper_core::proto::Value;
use rowkeeper_core::{Error, HistoricScaffold, Row, TableOptions, Transaction};
use uuid::Uuid;

const HISTORY: &str = "Widget_history";

async fn pause() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

fn id_string(row: &Row) -> String {
    row.identity()
        .and_then(Value::as_uuid)
        .map(|id| id.to_string())
        .unwrap()
}

async fn create_tables(trx: &mut MemoryTransaction, engine: &HistoricScaffold) {
    for statement in engine.compile(&TableOptions::default()) {
        trx.query(&statement).await.unwrap();
    }
    trx.clear_log();
}

#[tokio::test]
async fn test_widget_insert_delete_undelete() {
    init_tracing();
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();
    create_tables(&mut trx, &engine).await;

    let mut row = Row::from_values(engine.schema().clone(), [("name", "A")]).unwrap();
    assert!(engine.save(&mut trx, &mut row, false, None).await.unwrap());

    assert_eq!(trx.rows("Widget").len(), 1);
    let history = trx.rows(HISTORY);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].get(DELETED), Some(&Value::Bool(false)));
    assert_eq!(history[0].get(UPDATED_BY), Some(&Value::Null));
    assert_eq!(history[0].get("name"), Some(&Value::from("A")));
    assert_eq!(history[0].get(ID), row.identity());
    let first_updated = row.get(UPDATED_AT).and_then(Value::as_timestamp).unwrap();

    pause().await;
    assert!(engine.delete(&mut trx, &mut row, None).await.unwrap());
    assert!(trx.rows("Widget").is_empty());
    let history = trx.rows(HISTORY);
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].get(DELETED), Some(&Value::Bool(true)));
    assert_eq!(history[1].get("name"), Some(&Value::from("A")));
    assert_ne!(history[0].get(HID), history[1].get(HID));

    pause().await;
    let restored = engine
        .undelete(&mut trx, &id_string(&row), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.get("name"), Some(&Value::from("A")));
    assert_eq!(restored.identity(), row.identity());
    assert_eq!(restored.get(CREATED_AT), row.get(CREATED_AT));
    assert!(restored.get(UPDATED_AT).and_then(Value::as_timestamp).unwrap() > first_updated);
    assert!(!restored.is_set(HID));

    assert_eq!(trx.rows("Widget").len(), 1);
    let history = trx.rows(HISTORY);
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].get(DELETED), Some(&Value::Bool(false)));
}

#[tokio::test]
async fn test_history_records_author_and_full_image() {
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();
    let author = Uuid::new_v4();

    let mut row = engine.row();
    row.set("name", "A").unwrap();
    engine
        .save(&mut trx, &mut row, false, Some(&author.to_string()))
        .await
        .unwrap();

    pause().await;
    // Only the note is touched; history still carries the stored name.
    let mut partial = engine.row();
    partial.set(ID, row.identity().cloned().unwrap()).unwrap();
    partial.set("note", "hello").unwrap();
    assert!(engine
        .save(&mut trx, &mut partial, false, Some(&author.to_string()))
        .await
        .unwrap());

    let history = trx.rows(HISTORY);
    assert_eq!(history.len(), 2);
    let latest = &history[1];
    assert_eq!(latest.get(UPDATED_BY), Some(&Value::Uuid(author)));
    assert_eq!(latest.get("name"), Some(&Value::from("A")));
    assert_eq!(latest.get("note"), Some(&Value::from("hello")));
    assert_eq!(latest.get(CREATED_AT), history[0].get(CREATED_AT));
    assert_eq!(latest.get(UPDATED_AT), partial.get(UPDATED_AT).cloned().as_ref());
}

#[tokio::test]
async fn test_clean_save_writes_no_history() {
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();

    let mut row = engine.row();
    row.set("name", "A").unwrap();
    engine.save(&mut trx, &mut row, false, None).await.unwrap();
    trx.clear_log();

    assert!(!engine.save(&mut trx, &mut row, false, None).await.unwrap());
    assert_eq!(trx.texts().len(), 1);
    assert_eq!(trx.rows(HISTORY).len(), 1);
}

#[tokio::test]
async fn test_invalid_identifiers_rejected_before_queries() {
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();

    let mut row = engine.row();
    row.set("name", "A").unwrap();
    let err = engine
        .save(&mut trx, &mut row, false, Some("someone"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier { what: "author", .. }));

    let err = engine.undelete(&mut trx, "not-a-uuid", None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier { what: "id", .. }));

    let err = engine
        .undelete(&mut trx, &Uuid::new_v4().to_string(), Some("someone"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier { what: "author", .. }));

    let err = engine.delete(&mut trx, &mut row, Some("")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier { .. }));

    assert!(trx.texts().is_empty());
    assert!(!row.is_set(ID));
}

#[tokio::test]
async fn test_undelete_live_row_is_noop() {
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();

    let mut row = engine.row();
    row.set("name", "A").unwrap();
    engine.save(&mut trx, &mut row, false, None).await.unwrap();
    trx.clear_log();

    let restored = engine.undelete(&mut trx, &id_string(&row), None).await.unwrap();
    assert!(restored.is_none());
    let texts = trx.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("SELECT count(*) FROM \"Widget\""));
    assert_eq!(trx.rows(HISTORY).len(), 1);
}

#[tokio::test]
async fn test_undelete_unknown_identity() {
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();

    let restored = engine
        .undelete(&mut trx, &Uuid::new_v4().to_string(), None)
        .await
        .unwrap();
    assert!(restored.is_none());
    let texts = trx.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].ends_with("ORDER BY \"updated_at\" DESC LIMIT 1"));
}

#[tokio::test]
async fn test_undelete_restores_latest_image() {
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();
    let author = Uuid::new_v4().to_string();

    let mut row = engine.row();
    row.set("name", "A").unwrap();
    engine.save(&mut trx, &mut row, false, None).await.unwrap();
    pause().await;
    row.set("name", "B").unwrap();
    engine.save(&mut trx, &mut row, false, None).await.unwrap();
    pause().await;
    engine.delete(&mut trx, &mut row, None).await.unwrap();
    pause().await;

    let restored = engine
        .undelete(&mut trx, &id_string(&row), Some(&author))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.get("name"), Some(&Value::from("B")));

    let history = trx.rows(HISTORY);
    assert_eq!(history.len(), 4);
    assert_eq!(
        history[3].get(UPDATED_BY).and_then(Value::as_uuid).map(|u| u.to_string()),
        Some(author)
    );
}

#[tokio::test]
async fn test_history_failure_unwinds_insert_stamps() {
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();
    trx.fail_when(|s| s.text().starts_with("INSERT INTO \"Widget_history\""));

    let mut row = engine.row();
    row.set("name", "A").unwrap();
    let err = engine.save(&mut trx, &mut row, false, None).await.unwrap_err();

    assert!(err.is_persistence());
    let texts = trx.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].starts_with("INSERT INTO \"Widget\""));
    assert!(!row.is_set(CREATED_AT));
    assert!(!row.is_set(UPDATED_AT));
    assert!(row.identity().is_some());
}

#[tokio::test]
async fn test_history_failure_reverts_update_stamp() {
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();

    let mut row = engine.row();
    row.set("name", "A").unwrap();
    engine.save(&mut trx, &mut row, false, None).await.unwrap();
    let updated = row.get(UPDATED_AT).cloned();

    pause().await;
    trx.fail_when(|s| s.text().starts_with("INSERT INTO \"Widget_history\""));
    row.set("name", "B").unwrap();
    assert!(engine.save(&mut trx, &mut row, false, None).await.is_err());
    assert_eq!(row.get(UPDATED_AT).cloned(), updated);

    trx.heal();
    pause().await;
    assert!(engine.delete(&mut trx, &mut row, None).await.is_ok());
}

#[tokio::test]
async fn test_delete_failure_reverts_stamp() {
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();

    let mut row = engine.row();
    row.set("name", "A").unwrap();
    engine.save(&mut trx, &mut row, false, None).await.unwrap();
    let updated = row.get(UPDATED_AT).cloned();

    pause().await;
    trx.fail_when(|s| s.text().starts_with("DELETE"));
    assert!(engine.delete(&mut trx, &mut row, None).await.is_err());
    assert_eq!(row.get(UPDATED_AT).cloned(), updated);
    assert_eq!(trx.rows(HISTORY).len(), 1);
}

#[tokio::test]
async fn test_delete_missing_writes_no_history() {
    let engine = widget_history();
    let mut trx = MemoryTransaction::new();

    let mut row = engine.row();
    row.set(ID, Uuid::new_v4()).unwrap();
    assert!(!engine.delete(&mut trx, &mut row, None).await.unwrap());
    assert!(trx.texts().iter().all(|t| !t.starts_with("DELETE")));
    assert!(trx.rows(HISTORY).is_empty());
}
