use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{error, info};

use crate::pipeline::Pipeline;

/// Each datagram is handled on its own task; the socket itself is shared
/// via a single `Arc` since `UdpSocket::recv_from`/`send_to` both take
/// `&self`.
pub async fn run_udp(
    bind: SocketAddr,
    pipeline: Arc<Pipeline>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let socket = Arc::new(UdpSocket::bind(bind).await?);
    info!(%bind, "UDP listener started");

    let mut buf = vec![0u8; 65535];
    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (len, peer) = match result {
                    Ok(v) => v,
                    Err(err) => {
                        error!(error = %err, "UDP recv failed");
                        continue;
                    }
                };
                let request = buf[..len].to_vec();
                let socket = Arc::clone(&socket);
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    let response = pipeline.handle_query(&request, false, Some(peer.ip())).await;
                    if !response.is_empty() {
                        if let Err(err) = socket.send_to(&response, peer).await {
                            error!(error = %err, %peer, "UDP send failed");
                        }
                    }
                });
            }
            _ = shutdown.recv() => {
                info!("UDP listener shutting down");
                return Ok(());
            }
        }
    }
}
