//! A small message-submission pipeline.
//!
//! The [`front_door`] accepts a username/message form over HTTP and relays it
//! over a private TCP link to the [`ingest`] worker, which stamps it and hands
//! it to a [`sink::Sink`]. Delivery is best-effort: the relay has no
//! acknowledgement, so a submission can be lost after it leaves the front door.

pub mod error;
pub mod front_door;
pub mod ingest;
pub mod lifecycle;
pub mod relay;
pub mod settings;
pub mod sink;
pub mod structures;

pub use settings::Settings;
pub use structures::{Record, Submission};
