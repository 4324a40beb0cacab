//! Query Pipeline transports (component F). Two listeners — UDP and
//! TCP — both shutdown-aware via `tokio::select!`, grounded on the
//! teacher's `DnsServer::run` spawn-per-datagram/per-connection shape.

mod tcp;
mod udp;

pub use tcp::run_tcp;
pub use udp::run_udp;
