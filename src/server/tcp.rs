use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use crate::pipeline::Pipeline;

/// Each accepted connection is one task; messages within a connection
/// are handled serially (length-prefix framing is inherently
/// sequential), but connections themselves run in parallel.
pub async fn run_tcp(
    bind: SocketAddr,
    pipeline: Arc<Pipeline>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(%bind, "TCP listener started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(v) => v,
                    Err(err) => {
                        error!(error = %err, "TCP accept failed");
                        continue;
                    }
                };
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, peer, pipeline).await {
                        debug!(error = %err, %peer, "TCP connection ended");
                    }
                });
            }
            _ = shutdown.recv() => {
                info!("TCP listener shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    pipeline: Arc<Pipeline>,
) -> std::io::Result<()> {
    loop {
        let mut len_buf = [0u8; 2];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return Ok(());
        }
        let len = u16::from_be_bytes(len_buf) as usize;
        let mut message = vec![0u8; len];
        stream.read_exact(&mut message).await?;

        let response = pipeline.handle_query(&message, true, Some(peer.ip())).await;
        if response.is_empty() {
            continue;
        }
        let response_len = response.len() as u16;
        stream.write_all(&response_len.to_be_bytes()).await?;
        stream.write_all(&response).await?;
        stream.flush().await?;
    }
}
