//! Integration tests for syslog ingestion
//!
//! These tests verify that:
//! - Datagrams sent to the listener end up in storage
//! - The priority header is decoded into facility and severity
//! - The sender address becomes the hostname

use std::sync::Arc;
use std::time::Duration;

use netpulse::{
    actors::syslog::SyslogHandle,
    storage::{LogStore, memory::MemoryBackend, schema::SyslogRecord},
};
use pretty_assertions::assert_eq;
use tokio::net::UdpSocket;

async fn wait_for_records(store: &dyn LogStore, count: usize) -> Vec<SyslogRecord> {
    for _ in 0..100 {
        let records = store.query_recent_syslog(100).await.unwrap();
        if records.len() >= count {
            return records;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    store.query_recent_syslog(100).await.unwrap()
}

#[tokio::test]
async fn test_priority_header_scenario() {
    let backend = Arc::new(MemoryBackend::new());
    let handle = SyslogHandle::spawn("127.0.0.1:0".parse().unwrap(), backend.clone())
        .await
        .unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender
        .send_to(
            b"<13>Dec 15 10:00:00 localhost test: hello",
            handle.local_addr(),
        )
        .await
        .unwrap();

    let records = wait_for_records(backend.as_ref(), 1).await;
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.facility, 1);
    assert_eq!(record.severity, 5);
    assert_eq!(record.hostname, "127.0.0.1");
    assert_eq!(record.message, "Dec 15 10:00:00 localhost test: hello");
    assert_eq!(record.raw, "<13>Dec 15 10:00:00 localhost test: hello");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_many_datagrams_are_all_stored() {
    let backend = Arc::new(MemoryBackend::new());
    let handle = SyslogHandle::spawn("127.0.0.1:0".parse().unwrap(), backend.clone())
        .await
        .unwrap();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for i in 0..20u8 {
        // kern.emerg through local7.debug, sampled
        let pri = i * 9;
        let line = format!("<{pri}>message {i}");
        sender
            .send_to(line.as_bytes(), handle.local_addr())
            .await
            .unwrap();
    }

    let records = wait_for_records(backend.as_ref(), 20).await;
    assert_eq!(records.len(), 20);
    assert!(records
        .iter()
        .all(|r| u16::from(r.facility) * 8 + u16::from(r.severity) <= 191));

    assert_eq!(handle.stats().await.unwrap().received, 20);
    handle.shutdown().await.unwrap();
}
