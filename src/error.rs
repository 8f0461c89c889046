use std::{io, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failure to hand a submission to the ingest worker.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("could not encode submission: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("could not reach ingest worker at {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("could not send submission: {0}")]
    Send(io::Error),

    #[error("relay timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure to persist a record.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("could not serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    #[error("insert timed out after {0:?}")]
    Timeout(Duration),

    #[error("insert task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("sink rejected record: {0}")]
    Rejected(String),
}

/// Errors that surface to the HTTP client.
#[derive(Error, Debug)]
pub enum FrontDoorError {
    #[error("Ingest relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Could not read resource: {0}")]
    Resource(#[from] io::Error),
}

impl IntoResponse for FrontDoorError {
    fn into_response(self) -> Response {
        log::error!("{}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
