//! Technology Compatibility Kit
//!
//! Behavioral checks every [`AppStorage`] backend must pass. Backends call
//! [`run`] from their own test suites (enable the `tck` feature in
//! `dev-dependencies`); the in-memory backend runs it in its unit tests.
//!
//! The kit only writes to fixed keys, so it can be re-run against the same
//! storage. Failed expectations panic; storage errors are returned.

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StorageError};
use crate::storage::AppStorage;
use crate::types::{Offset, PartitionId, QName, ReadCount, RecordId, WsId};

const LOG_PARTITION: PartitionId = PartitionId(5);
const LOG_WS: WsId = WsId(5);
const FIRST_EVENT: u64 = 4090;
const LAST_EVENT: u64 = 4101;

/// Run every check against `storage`.
pub async fn run(storage: &dyn AppStorage) -> Result<()> {
    records(storage).await?;
    plog(storage).await?;
    wlog(storage).await?;
    log_callback_errors(storage).await?;
    log_cancellation(storage).await?;
    view_point_ops(storage).await?;
    view_prefix_reads(storage).await?;
    view_range_reads(storage).await?;
    view_callbacks(storage).await?;
    qnames(storage).await?;
    Ok(())
}

// ============================================================
// RECORDS
// ============================================================

async fn records(storage: &dyn AppStorage) -> Result<()> {
    let ws = WsId(1);
    let id = RecordId(3 * 4096 + 7);
    let mut data = b"stale".to_vec();

    storage.put_record(ws, id, b"test data").await?;
    assert!(storage.get_record(ws, id, &mut data).await?);
    assert_eq!(data, b"test data");

    storage.put_record(ws, id, b"x").await?;
    assert!(storage.get_record(ws, id, &mut data).await?);
    assert_eq!(data, b"x", "overwrite must replace, not merge");

    assert!(!storage.get_record(ws, RecordId(1 << 40), &mut data).await?);
    assert!(data.is_empty(), "buffer must be cleared on miss");

    assert!(!storage.get_record(WsId(2), id, &mut data).await?);
    Ok(())
}

// ============================================================
// EVENT LOGS
// ============================================================

fn event(offset: u64) -> Vec<u8> {
    format!("event-{offset}").into_bytes()
}

fn expected(from: u64, to: u64) -> Vec<(u64, Vec<u8>)> {
    (from..=to).map(|o| (o, event(o))).collect()
}

async fn read_plog(
    storage: &dyn AppStorage,
    offset: u64,
    count: ReadCount,
) -> Result<Vec<(u64, Vec<u8>)>> {
    let cancel = CancellationToken::new();
    let mut events = Vec::new();
    storage
        .read_plog(&cancel, LOG_PARTITION, Offset(offset), count, &mut |o, e| {
            events.push((o.0, e));
            Ok(())
        })
        .await?;
    Ok(events)
}

async fn read_wlog(
    storage: &dyn AppStorage,
    offset: u64,
    count: ReadCount,
) -> Result<Vec<(u64, Vec<u8>)>> {
    let cancel = CancellationToken::new();
    let mut events = Vec::new();
    storage
        .read_wlog(&cancel, LOG_WS, Offset(offset), count, &mut |o, e| {
            events.push((o.0, e));
            Ok(())
        })
        .await?;
    Ok(events)
}

async fn plog(storage: &dyn AppStorage) -> Result<()> {
    for offset in FIRST_EVENT..=LAST_EVENT {
        storage
            .put_plog_event(LOG_PARTITION, Offset(offset), &event(offset))
            .await?;
    }

    // Tail of partition 0 only.
    assert_eq!(
        read_plog(storage, FIRST_EVENT, 6.into()).await?,
        expected(4090, 4095)
    );
    // Across the partition boundary.
    assert_eq!(
        read_plog(storage, FIRST_EVENT, 10.into()).await?,
        expected(4090, 4099)
    );
    assert_eq!(
        read_plog(storage, 4095, 2.into()).await?,
        expected(4095, 4096)
    );
    // More than stored.
    assert_eq!(
        read_plog(storage, FIRST_EVENT, 100.into()).await?,
        expected(FIRST_EVENT, LAST_EVENT)
    );
    assert_eq!(
        read_plog(storage, FIRST_EVENT, ReadCount::ToTheEnd).await?,
        expected(FIRST_EVENT, LAST_EVENT)
    );
    assert_eq!(
        read_plog(storage, 4097, ReadCount::ToTheEnd).await?,
        expected(4097, LAST_EVENT)
    );
    assert!(read_plog(storage, FIRST_EVENT, 0.into()).await?.is_empty());
    assert!(read_plog(storage, LAST_EVENT + 1, ReadCount::ToTheEnd)
        .await?
        .is_empty());
    assert!(read_plog(storage, 1 << 30, 10.into()).await?.is_empty());
    Ok(())
}

async fn wlog(storage: &dyn AppStorage) -> Result<()> {
    for offset in FIRST_EVENT..=LAST_EVENT {
        storage
            .put_wlog_event(LOG_WS, Offset(offset), &event(offset))
            .await?;
    }

    assert_eq!(
        read_wlog(storage, FIRST_EVENT, 10.into()).await?,
        expected(4090, 4099)
    );
    assert_eq!(
        read_wlog(storage, 4096, ReadCount::ToTheEnd).await?,
        expected(4096, LAST_EVENT)
    );
    assert!(read_wlog(storage, FIRST_EVENT, 0.into()).await?.is_empty());
    assert!(read_wlog(storage, LAST_EVENT + 1, 5.into()).await?.is_empty());
    Ok(())
}

async fn log_callback_errors(storage: &dyn AppStorage) -> Result<()> {
    let cancel = CancellationToken::new();
    let mut calls = 0;

    let outcome = storage
        .read_plog(
            &cancel,
            LOG_PARTITION,
            Offset(FIRST_EVENT),
            ReadCount::ToTheEnd,
            &mut |_, _| {
                calls += 1;
                if calls == 3 {
                    Err(StorageError::callback("stop reading"))
                } else {
                    Ok(())
                }
            },
        )
        .await;

    match outcome {
        Err(StorageError::Callback(e)) => assert_eq!(e.to_string(), "stop reading"),
        other => panic!("expected callback error, got {other:?}"),
    }
    assert_eq!(calls, 3);
    Ok(())
}

async fn log_cancellation(storage: &dyn AppStorage) -> Result<()> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let mut events = Vec::new();

    storage
        .read_wlog(
            &cancel,
            LOG_WS,
            Offset(FIRST_EVENT),
            ReadCount::ToTheEnd,
            &mut |o, _| {
                events.push(o.0);
                if events.len() == 3 {
                    token.cancel();
                }
                Ok(())
            },
        )
        .await?;
    assert_eq!(events, vec![4090, 4091, 4092]);

    let mut calls = 0;
    storage
        .read_plog(
            &cancel,
            LOG_PARTITION,
            Offset(FIRST_EVENT),
            ReadCount::ToTheEnd,
            &mut |_, _| {
                calls += 1;
                Ok(())
            },
        )
        .await?;
    assert_eq!(calls, 0, "a cancelled token must not deliver events");
    Ok(())
}

// ============================================================
// VIEWS
// ============================================================

fn drinks() -> QName {
    QName::new("tck", "Drinks")
}

async fn read_view(
    storage: &dyn AppStorage,
    ws: WsId,
    p_key: &[u8],
    prefix: &[u8],
) -> Result<Vec<String>> {
    let cancel = CancellationToken::new();
    let mut values = Vec::new();
    storage
        .read_view(&cancel, &drinks(), ws, p_key, prefix, &mut |_, v| {
            values.push(String::from_utf8_lossy(&v).into_owned());
            Ok(())
        })
        .await?;
    Ok(values)
}

async fn read_view_range(
    storage: &dyn AppStorage,
    ws: WsId,
    p_key: &[u8],
    start: &[u8],
    finish: &[u8],
) -> Result<Vec<String>> {
    let cancel = CancellationToken::new();
    let mut values = Vec::new();
    storage
        .read_view_range(&cancel, &drinks(), ws, p_key, start, finish, &mut |_, v| {
            values.push(String::from_utf8_lossy(&v).into_owned());
            Ok(())
        })
        .await?;
    Ok(values)
}

async fn view_point_ops(storage: &dyn AppStorage) -> Result<()> {
    let view = QName::new("tck", "Points");
    let ws = WsId(100);
    let mut data = b"stale".to_vec();

    storage
        .put_view_record(&view, ws, b"pk", None, b"no clustering")
        .await?;
    assert!(storage.get_view_record(&view, ws, b"pk", None, &mut data).await?);
    assert_eq!(data, b"no clustering");
    assert!(
        storage
            .get_view_record(&view, ws, b"pk", Some(&b""[..]), &mut data)
            .await?,
        "absent clustering is stored as the empty byte string"
    );

    storage
        .put_view_record(&view, ws, b"pk", Some(&b"cc"[..]), b"first")
        .await?;
    storage
        .put_view_record(&view, ws, b"pk", Some(&b"cc"[..]), b"second")
        .await?;
    assert!(
        storage
            .get_view_record(&view, ws, b"pk", Some(&b"cc"[..]), &mut data)
            .await?
    );
    assert_eq!(data, b"second");

    assert!(
        !storage
            .get_view_record(&view, ws, b"pk", Some(&b"missing"[..]), &mut data)
            .await?
    );
    assert!(data.is_empty());
    assert!(
        !storage
            .get_view_record(&QName::new("tck", "Other"), ws, b"pk", None, &mut data)
            .await?,
        "views must not share rows"
    );
    Ok(())
}

async fn view_prefix_reads(storage: &dyn AppStorage) -> Result<()> {
    let view = drinks();
    let ws = WsId(200);

    let max_prefixed: [(&[u8], &str); 4] = [
        (&[0xff, 0xff, 0xfe], "Cola"),
        (&[0xff, 0xff, 0xff], "7up"),
        (&[0xff, 0xfe, 0xff], "Sprite"),
        (&[0xfe, 0xff, 0xff], "Pepsi"),
    ];
    for (c_cols, value) in max_prefixed {
        storage
            .put_view_record(&view, ws, &[0xff], Some(c_cols), value.as_bytes())
            .await?;
    }
    assert_eq!(
        read_view(storage, ws, &[0xff], &[0xff, 0xff]).await?,
        vec!["Cola", "7up"]
    );
    assert_eq!(
        read_view(storage, ws, &[0xff], &[]).await?,
        vec!["Pepsi", "Sprite", "Cola", "7up"]
    );

    let trailing_ff: [(&[u8], &str); 4] = [
        (&[0x00, 0xfe, 0xfe], "Cola"),
        (&[0x00, 0xfe, 0xff], "7up"),
        (&[0x00, 0xff, 0xfe], "Sprite"),
        (&[0x00, 0xff, 0xff], "Pepsi"),
    ];
    for (c_cols, value) in trailing_ff {
        storage
            .put_view_record(&view, ws, &[0x00], Some(c_cols), value.as_bytes())
            .await?;
    }
    assert_eq!(
        read_view(storage, ws, &[0x00], &[0x00, 0xff]).await?,
        vec!["Sprite", "Pepsi"]
    );
    assert_eq!(
        read_view(storage, ws, &[0x00], &[0x00, 0xfe, 0xff]).await?,
        vec!["7up"]
    );
    assert!(read_view(storage, ws, &[0x00], &[0x01]).await?.is_empty());
    assert!(read_view(storage, ws, b"no such key", &[]).await?.is_empty());
    Ok(())
}

async fn view_range_reads(storage: &dyn AppStorage) -> Result<()> {
    let view = drinks();
    let ws = WsId(300);
    for (i, value) in ["a", "b", "c", "d"].into_iter().enumerate() {
        storage
            .put_view_record(&view, ws, b"range", Some(&[i as u8][..]), value.as_bytes())
            .await?;
    }

    assert_eq!(
        read_view_range(storage, ws, b"range", &[1], &[3]).await?,
        vec!["b", "c"]
    );
    assert_eq!(
        read_view_range(storage, ws, b"range", &[2], &[]).await?,
        vec!["c", "d"]
    );
    assert_eq!(
        read_view_range(storage, ws, b"range", &[], &[2]).await?,
        vec!["a", "b"]
    );
    assert_eq!(
        read_view_range(storage, ws, b"range", &[], &[]).await?,
        vec!["a", "b", "c", "d"]
    );
    assert!(read_view_range(storage, ws, b"range", &[3], &[1])
        .await?
        .is_empty());
    assert!(read_view_range(storage, ws, b"range", &[2], &[2])
        .await?
        .is_empty());
    Ok(())
}

async fn view_callbacks(storage: &dyn AppStorage) -> Result<()> {
    let view = drinks();
    let ws = WsId(200);

    let cancel = CancellationToken::new();
    let outcome = storage
        .read_view(&cancel, &view, ws, &[0xff], &[], &mut |_, _| {
            Err(StorageError::callback("bad row"))
        })
        .await;
    assert!(matches!(outcome, Err(StorageError::Callback(_))));

    let token = cancel.clone();
    let mut values = Vec::new();
    storage
        .read_view(&cancel, &view, ws, &[0xff], &[], &mut |c_cols, value| {
            values.push((c_cols, value));
            token.cancel();
            Ok(())
        })
        .await?;
    assert_eq!(values, vec![(vec![0xfe, 0xff, 0xff], b"Pepsi".to_vec())]);
    Ok(())
}

// ============================================================
// QNAMES
// ============================================================

async fn qnames(storage: &dyn AppStorage) -> Result<()> {
    let name = QName::new("test", "GetIdConcurrently");
    let ids = join_all((0..5).map(|_| storage.get_qname_id(&name)))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    assert!(ids.windows(2).all(|w| w[0] == w[1]), "ids diverged: {ids:?}");

    let other = storage.get_qname_id(&QName::new("test", "Other")).await?;
    assert_ne!(other, ids[0]);
    assert_eq!(storage.get_qname_id(&name).await?, ids[0]);
    Ok(())
}
