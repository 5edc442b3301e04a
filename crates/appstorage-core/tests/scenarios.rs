//! End-to-end scenarios through the public API
//!
//! These tests drive the in-memory provider exactly the way a host would:
//! through `Arc<dyn AppStorage>` handed out by an `AppStorageProvider`.

use std::sync::Arc;

use appstorage_core::{
    AppName, AppStorage, AppStorageProvider, LogPart, LogRangePlan, MemStorageProvider, Offset,
    PartitionId, QName, ReadCount, StorageError, WsId,
};
use tokio_util::sync::CancellationToken;

fn storage() -> Arc<dyn AppStorage> {
    MemStorageProvider::new([AppName::from("app1")])
        .app_storage(&AppName::from("app1"))
        .unwrap()
}

fn plan(start: u64, count: u64) -> Vec<(i64, i16, i16)> {
    LogRangePlan::new(Offset(start), ReadCount::Exactly(count))
        .map(|LogPart { part, clust_from, clust_to }| (part, clust_from, clust_to))
        .collect()
}

async fn prefix_read(
    storage: &dyn AppStorage,
    ws: WsId,
    p_key: &[u8],
    prefix: &[u8],
) -> Vec<String> {
    let cancel = CancellationToken::new();
    let mut values = Vec::new();
    storage
        .read_view(&cancel, &QName::new("bo", "Drinks"), ws, p_key, prefix, &mut |_, v| {
            values.push(String::from_utf8(v).unwrap());
            Ok(())
        })
        .await
        .unwrap();
    values
}

// ============================================================================
// Planner
// ============================================================================

#[test]
fn test_plan_ten_thousand_rows_from_4000() {
    assert_eq!(
        plan(4000, 10_000),
        vec![(0, 4000, 4095), (1, 0, 4095), (2, 0, 4095), (3, 0, 1711)]
    );
}

#[test]
fn test_plan_six_rows_from_4090() {
    assert_eq!(plan(4090, 6), vec![(0, 4090, 4095)]);
}

#[test]
fn test_plan_ten_rows_from_4090() {
    assert_eq!(plan(4090, 10), vec![(0, 4090, 4095), (1, 0, 3)]);
}

// ============================================================================
// Views
// ============================================================================

#[tokio::test]
async fn test_view_prefix_of_max_bytes() {
    let storage = storage();
    let view = QName::new("bo", "Drinks");
    let rows: [(&[u8], &str); 4] = [
        (&[0xff, 0xff, 0xfe], "Cola"),
        (&[0xff, 0xff, 0xff], "7up"),
        (&[0xff, 0xfe, 0xff], "Sprite"),
        (&[0xfe, 0xff, 0xff], "Pepsi"),
    ];
    for (c_cols, value) in rows {
        storage
            .put_view_record(&view, WsId(200), &[0xff], Some(c_cols), value.as_bytes())
            .await
            .unwrap();
    }

    let values = prefix_read(storage.as_ref(), WsId(200), &[0xff], &[0xff, 0xff]).await;
    assert_eq!(values, vec!["Cola", "7up"]);
}

#[tokio::test]
async fn test_view_prefix_with_trailing_ff() {
    let storage = storage();
    let view = QName::new("bo", "Drinks");
    let rows: [(&[u8], &str); 4] = [
        (&[0x00, 0xfe, 0xfe], "Cola"),
        (&[0x00, 0xfe, 0xff], "7up"),
        (&[0x00, 0xff, 0xfe], "Sprite"),
        (&[0x00, 0xff, 0xff], "Pepsi"),
    ];
    for (c_cols, value) in rows {
        storage
            .put_view_record(&view, WsId(200), &[0xff], Some(c_cols), value.as_bytes())
            .await
            .unwrap();
    }

    let values = prefix_read(storage.as_ref(), WsId(200), &[0xff], &[0x00, 0xff]).await;
    assert_eq!(values, vec!["Sprite", "Pepsi"]);
}

#[tokio::test]
async fn test_view_record_without_clustering_roundtrip() {
    let storage = storage();
    let view = QName::new("bo", "Totals");
    storage
        .put_view_record(&view, WsId(1), b"pk", None, b"42")
        .await
        .unwrap();

    let mut data = Vec::new();
    assert!(storage
        .get_view_record(&view, WsId(1), b"pk", None, &mut data)
        .await
        .unwrap());
    assert_eq!(data, b"42");
}

// ============================================================================
// QNames
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_qname_allocation() {
    let storage = storage();
    let name = QName::new("test", "GetIdConcurrently");

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let storage = Arc::clone(&storage);
            let name = name.clone();
            tokio::spawn(async move { storage.get_qname_id(&name).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
}

// ============================================================================
// Logs
// ============================================================================

#[tokio::test]
async fn test_read_up_to_n_then_cancel() {
    let storage = storage();
    for offset in 0..10u64 {
        storage
            .put_plog_event(PartitionId(0), Offset(offset), format!("e{offset}").as_bytes())
            .await
            .unwrap();
    }

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let mut seen = 0;
    let result = storage
        .read_plog(&cancel, PartitionId(0), Offset(0), ReadCount::ToTheEnd, &mut |_, _| {
            seen += 1;
            if seen == 4 {
                token.cancel();
            }
            Ok(())
        })
        .await;

    assert!(result.is_ok(), "cancellation must not surface as an error");
    assert_eq!(seen, 4);
}

#[tokio::test]
async fn test_unknown_app() {
    let provider = MemStorageProvider::new([AppName::from("app1")]);
    let result = provider.app_storage(&AppName::from("testApp"));
    assert!(matches!(result, Err(StorageError::AppNotFound(_))));
}
