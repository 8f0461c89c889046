use std::time::Duration;

use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};

use crate::{error::RelayError, structures::Submission};

/// Sends one submission to the ingest worker on a fresh connection.
///
/// Connecting and writing share a single `limit`. Nothing is read back, so a
/// successful return only means the payload left this process.
pub async fn relay(addr: &str, submission: &Submission, limit: Duration) -> Result<(), RelayError> {
    let payload = submission.encode()?;
    timeout(limit, send(addr, &payload))
        .await
        .map_err(|_| RelayError::Timeout(limit))?
}

async fn send(addr: &str, payload: &[u8]) -> Result<(), RelayError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|source| RelayError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    stream.write_all(payload).await.map_err(RelayError::Send)?;
    stream.shutdown().await.map_err(RelayError::Send)?;
    Ok(())
}
