use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

use crate::route;
use crate::snapshot::Snapshot;

/// Sent unconditionally before the body is rendered; even the error
/// sentinel rides on a success status line.
const RESPONSE_HEADER: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: application/json; charset=utf-8\r\n\r\n";

/// A request is whatever fits in the first read; only its first line counts.
const REQUEST_BUF_SIZE: usize = 1024;

/// Accept loop. One task per connection, capped by a semaphore so a
/// connection flood queues at accept instead of spawning without bound.
/// Runs until the shutdown token fires, then drains in-flight connections.
pub async fn serve(
    listener: TcpListener,
    snapshot: Arc<Snapshot>,
    max_connections: usize,
    read_timeout: Duration,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let limiter = Arc::new(Semaphore::new(max_connections));
    let tracker = TaskTracker::new();

    loop {
        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = limiter.clone().acquire_owned() => {
                permit.expect("connection semaphore is never closed")
            }
        };

        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            },
        };

        trace!(%peer, "incoming connection");
        let snapshot = snapshot.clone();
        tracker.spawn(async move {
            handle_connection(stream, peer, &snapshot, read_timeout).await;
            drop(permit);
        });
    }

    tracker.close();
    debug!("waiting for {} open connections", tracker.len());
    tracker.wait().await;
    Ok(())
}

/// One request, one response, close. A peer that sends nothing (or takes
/// longer than the read timeout) is closed without a response; any write
/// failure aborts just this connection.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    snapshot: &Snapshot,
    read_timeout: Duration,
) {
    let mut buf = [0u8; REQUEST_BUF_SIZE];
    let read = match timeout(read_timeout, stream.read(&mut buf)).await {
        Ok(Ok(read)) if read > 0 => read,
        Ok(Ok(_)) => {
            trace!(%peer, "closed before sending a request");
            return;
        }
        Ok(Err(e)) => {
            trace!(%peer, "read failed: {e}");
            return;
        }
        Err(_) => {
            debug!(%peer, "request timed out");
            return;
        }
    };

    let request = String::from_utf8_lossy(&buf[..read]);
    let line = request.lines().next().unwrap_or("").trim_end();
    debug!(%peer, line, "request");

    if let Err(e) = respond(&mut stream, line, snapshot).await {
        trace!(%peer, "write failed: {e}");
        return;
    }
    stream.shutdown().await.ok();
}

async fn respond(
    stream: &mut TcpStream,
    line: &str,
    snapshot: &Snapshot,
) -> std::io::Result<()> {
    // status block goes out before the body exists
    stream.write_all(RESPONSE_HEADER).await?;

    let body = route::dispatch(line, snapshot).await;
    stream.write_all(body.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;
    Ok(())
}
