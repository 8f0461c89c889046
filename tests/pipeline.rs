mod common;

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{Local, NaiveDateTime};
use common::{client, dead_addr, eventually, public_dir, start_front_door, start_worker};
use futures::future::join_all;
use postbox::{
    sink::{MemorySink, SledSink},
    structures::DATE_FORMAT,
};
use reqwest::StatusCode;
use tokio::{io::AsyncWriteExt, net::TcpStream};

#[tokio::test]
async fn submission_is_trimmed_and_stored_once() {
    let sink = Arc::new(MemorySink::new());
    let worker = start_worker(sink.clone());
    let base = start_front_door(public_dir(), worker.local_addr().to_string()).await;

    let before = Local::now().naive_local();
    let res = client()
        .post(format!("{base}/message"))
        .form(&[("username", "  Alice "), ("message", " hi there ")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()["location"], "/");

    assert_eq!(eventually(1, || sink.len()).await, 1);
    let record = &sink.records()[0];
    assert_eq!(record.username, "Alice");
    assert_eq!(record.message, "hi there");
    let stamped = NaiveDateTime::parse_from_str(&record.date, DATE_FORMAT).unwrap();
    assert!(stamped >= before - chrono::Duration::milliseconds(1));

    // nothing else trickles in
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.len(), 1);
    worker.stop().await;
}

#[tokio::test]
async fn missing_message_is_stored_empty() {
    let sink = Arc::new(MemorySink::new());
    let worker = start_worker(sink.clone());
    let base = start_front_door(public_dir(), worker.local_addr().to_string()).await;

    let res = client()
        .post(format!("{base}/message"))
        .form(&[("username", "bob")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);

    assert_eq!(eventually(1, || sink.len()).await, 1);
    let record = &sink.records()[0];
    assert_eq!(record.username, "bob");
    assert_eq!(record.message, "");
    worker.stop().await;
}

#[tokio::test]
async fn large_message_is_relayed() {
    let sink = Arc::new(MemorySink::new());
    let worker = start_worker(sink.clone());
    let base = start_front_door(public_dir(), worker.local_addr().to_string()).await;
    let message = "x".repeat(3 * 1024 * 1024);

    let res = client()
        .post(format!("{base}/message"))
        .form(&[("username", "erin"), ("message", message.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);

    assert_eq!(eventually(1, || sink.len()).await, 1);
    let record = &sink.records()[0];
    assert_eq!(record.username, "erin");
    assert_eq!(record.message.len(), message.len());
    worker.stop().await;
}

#[tokio::test]
async fn unreachable_worker_writes_nothing() {
    let sink = Arc::new(MemorySink::new());
    let worker = start_worker(sink.clone());
    let base = start_front_door(public_dir(), dead_addr().await).await;

    let res = client()
        .post(format!("{base}/message"))
        .form(&[("username", "carol"), ("message", "lost")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.is_empty());
    worker.stop().await;
}

#[tokio::test]
async fn raw_garbage_on_the_wire_stores_empty_record() {
    let sink = Arc::new(MemorySink::new());
    let worker = start_worker(sink.clone());

    let mut stream = TcpStream::connect(worker.local_addr()).await.unwrap();
    stream.write_all(b"{definitely not json").await.unwrap();
    stream.shutdown().await.unwrap();

    assert_eq!(eventually(1, || sink.len()).await, 1);
    let record = &sink.records()[0];
    assert_eq!(record.username, "");
    assert_eq!(record.message, "");
    worker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_each_stored_once() {
    const SUBMISSIONS: usize = 64;

    let sink = Arc::new(MemorySink::new());
    let worker = start_worker(sink.clone());
    let base = start_front_door(public_dir(), worker.local_addr().to_string()).await;
    let client = client();

    let posts = (0..SUBMISSIONS).map(|i| {
        let client = client.clone();
        let url = format!("{base}/message");
        async move {
            client
                .post(url)
                .form(&[("username", format!("user-{i}")), ("message", format!("note {i}"))])
                .send()
                .await
                .unwrap()
                .status()
        }
    });
    let statuses = join_all(posts).await;
    assert!(statuses.iter().all(|s| *s == StatusCode::FOUND));

    assert_eq!(eventually(SUBMISSIONS, || sink.len()).await, SUBMISSIONS);
    let records = sink.records();
    let names: HashSet<_> = records.iter().map(|r| r.username.clone()).collect();
    assert_eq!(names.len(), SUBMISSIONS);
    for record in &records {
        let i = record.username.trim_start_matches("user-");
        assert_eq!(record.message, format!("note {i}"));
    }
    worker.stop().await;
}

#[tokio::test]
async fn sled_store_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(
        SledSink::open(dir.path(), "messages", false, Duration::from_secs(5)).unwrap(),
    );
    let worker = start_worker(sink.clone());
    let base = start_front_door(public_dir(), worker.local_addr().to_string()).await;

    let res = client()
        .post(format!("{base}/message"))
        .body("username=dave&message=stored+for+real")
        .header("content-type", "application/x-www-form-urlencoded")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);

    let stored = eventually(1, || sink.records().map(|r| r.len()).unwrap_or(0)).await;
    assert_eq!(stored, 1);
    let record = &sink.records().unwrap()[0];
    assert_eq!(record.username, "dave");
    assert_eq!(record.message, "stored for real");
    worker.stop().await;
}
