#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc, time::Duration};

use postbox::{
    front_door::{self, FrontDoor},
    ingest::{IngestHandle, IngestWorker},
    sink::Sink,
};
use tokio::net::TcpListener;

pub fn public_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public")
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

pub fn start_worker(sink: Arc<dyn Sink>) -> IngestHandle {
    // dozens of relays connect at once in the concurrency test
    IngestWorker::bind("127.0.0.1:0".parse().unwrap(), 128, sink)
        .unwrap()
        .start()
        .unwrap()
}

/// Starts a front door and returns its base url.
pub async fn start_front_door(static_root: PathBuf, relay_addr: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let door = FrontDoor {
        static_root,
        relay_addr,
        relay_timeout: Duration::from_secs(5),
    };
    tokio::spawn(front_door::serve(listener, door, std::future::pending()));
    base
}

/// An address nothing is listening on.
pub async fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

/// Polls `count` until it reaches `expected` or a few seconds pass.
pub async fn eventually(expected: usize, count: impl Fn() -> usize) -> usize {
    for _ in 0..300 {
        if count() >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    count()
}
