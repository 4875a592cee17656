//! A bare text endpoint serving the metrics exposition format — no HTTP
//! framework, since the process has no other HTTP surface to share one
//! with. Every accepted connection gets one fixed response and is closed.

use super::metrics::Metrics;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Serves `metrics.render()` to any connection on `addr` until `shutdown`
/// fires.
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "metrics endpoint listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (mut stream, _peer) = accepted?;
                let body = metrics.render();
                tokio::spawn(async move {
                    let resp = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: text/plain; version=0.0.4\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    if let Err(err) = stream.write_all(resp.as_bytes()).await {
                        warn!(%err, "failed to write metrics response");
                    }
                    let _ = stream.shutdown().await;
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}
