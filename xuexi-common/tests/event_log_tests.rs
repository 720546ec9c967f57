//! Integration tests for EventLog ordering and replay

use std::sync::Arc;
use std::time::Duration;
use xuexi_common::events::{EventKind, EventLog};

#[tokio::test]
async fn test_late_subscriber_gets_history_before_live_events() {
    let log = Arc::new(EventLog::new());
    for i in 0..50 {
        log.append(EventKind::Info, format!("history {}", i), None);
    }

    let mut late = log.subscribe();

    let producer = {
        let log = Arc::clone(&log);
        tokio::spawn(async move {
            for i in 0..50 {
                log.append(EventKind::Info, format!("live {}", i), None);
                tokio::task::yield_now().await;
            }
            log.append(EventKind::Completed, "all stages complete", None);
        })
    };

    let mut received = Vec::new();
    while let Some(event) = late.next().await {
        let terminal = event.is_terminal();
        received.push(event);
        if terminal {
            break;
        }
    }
    producer.await.unwrap();

    assert_eq!(received.len(), 101);
    for (i, event) in received.iter().enumerate() {
        assert_eq!(event.seq, i as u64, "events must arrive in production order");
    }
    assert!(received[..50].iter().all(|e| e.message.starts_with("history")));
    assert!(received[50..100].iter().all(|e| e.message.starts_with("live")));
}

#[tokio::test]
async fn test_concurrent_subscribers_see_identical_sequences() {
    let log = Arc::new(EventLog::new());
    let mut handles = Vec::new();

    for _ in 0..4 {
        let mut sub = log.subscribe();
        handles.push(tokio::spawn(async move {
            let mut seqs = Vec::new();
            while let Some(event) = sub.next().await {
                seqs.push(event.seq);
                if event.is_terminal() {
                    break;
                }
            }
            seqs
        }));
    }

    for i in 0..20 {
        log.append(EventKind::Info, format!("line {}", i), None);
        if i % 5 == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
    log.append(EventKind::Stopped, "session stopped", None);

    let expected: Vec<u64> = (0..21).collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), expected);
    }
}

#[tokio::test]
async fn test_stream_adapter_yields_in_order() {
    use futures::StreamExt;

    let log = Arc::new(EventLog::new());
    log.append(EventKind::Info, "a", None);
    log.append(EventKind::Info, "b", None);
    log.append(EventKind::Failed, "c", None);

    let messages: Vec<String> = log
        .subscribe()
        .into_stream()
        .take(3)
        .map(|e| e.message)
        .collect()
        .await;

    assert_eq!(messages, vec!["a", "b", "c"]);
}
