//! TCP ingest worker.
//!
//! Each connection carries exactly one submission terminated by EOF. The worker
//! never writes back: once the payload is read the outcome of decoding and
//! persisting is invisible to the sender.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpSocket, TcpStream},
    select,
    task::{JoinHandle, JoinSet},
    time::timeout,
};

use crate::{
    error::SinkError,
    sink::Sink,
    structures::{Record, Submission},
};

/// Bound on a single insert unless overridden with `IngestWorker::insert_timeout`.
pub const DEFAULT_INSERT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct IngestWorker {
    listener: TcpListener,
    sink: Arc<dyn Sink>,
    insert_timeout: Duration,
}

impl IngestWorker {
    /// Binds the listening socket with address reuse and the given accept backlog.
    pub fn bind(addr: SocketAddr, backlog: u32, sink: Arc<dyn Sink>) -> io::Result<Self> {
        let socket = if addr.is_ipv6() {
            TcpSocket::new_v6()?
        } else {
            TcpSocket::new_v4()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(backlog)?;
        Ok(IngestWorker {
            listener,
            sink,
            insert_timeout: DEFAULT_INSERT_TIMEOUT,
        })
    }

    /// Caps how long a connection waits on the sink before dropping its record.
    pub fn insert_timeout(mut self, limit: Duration) -> Self {
        self.insert_timeout = limit;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the task is dropped. Connection tasks live in a
    /// `JoinSet` owned by this future, so dropping it aborts them too.
    pub async fn run(self) {
        let mut connections = JoinSet::new();
        loop {
            select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        log::debug!("Accepted connection from {}", peer);
                        let sink = self.sink.clone();
                        connections.spawn(handle(socket, peer, sink, self.insert_timeout));
                    }
                    Err(e) => {
                        log::warn!("Failed to accept connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        log::error!("Connection task failed: {}", e);
                    }
                }
            }
        }
    }

    /// Spawns the accept loop as a supervised background task.
    pub fn start(self) -> io::Result<IngestHandle> {
        let addr = self.local_addr()?;
        log::info!("Ingest worker listening on {}", addr);
        Ok(IngestHandle {
            addr,
            task: tokio::spawn(self.run()),
        })
    }
}

/// Owner of a running ingest worker.
pub struct IngestHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl IngestHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Terminates the worker along with any in-flight connections. Nothing is
    /// drained.
    pub async fn stop(self) {
        self.task.abort();
        match self.task.await {
            Err(e) if e.is_panic() => log::error!("Ingest worker panicked: {}", e),
            _ => log::info!("Ingest worker on {} stopped", self.addr),
        }
    }
}

async fn handle(mut socket: TcpStream, peer: SocketAddr, sink: Arc<dyn Sink>, limit: Duration) {
    let mut payload = Vec::new();
    if let Err(e) = socket.read_to_end(&mut payload).await {
        log::warn!("Dropping connection from {}, read failed: {}", peer, e);
        return;
    }
    persist(&payload, peer, sink.as_ref(), limit).await;
}

async fn persist(payload: &[u8], peer: SocketAddr, sink: &dyn Sink, limit: Duration) {
    let submission = Submission::decode(payload).unwrap_or_else(|e| {
        log::warn!("Undecodable payload from {}, storing empty record: {}", peer, e);
        Submission::default()
    });
    let record = Record::stamp(submission);

    let outcome = match timeout(limit, sink.insert(record)).await {
        Ok(inserted) => inserted,
        Err(_) => Err(SinkError::Timeout(limit)),
    };

    // Best-effort delivery ends here: a failed or stuck insert is logged and dropped.
    if let Err(e) = outcome {
        log::warn!("Discarding submission from {}: {}", peer, e);
    }
}
