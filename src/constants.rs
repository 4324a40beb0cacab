pub const MAX_UDP_PACKET_SIZE: usize = 512;
pub const EDNS_VERSION: u8 = 0;
pub const EDNS_UDP_SIZE: u16 = 4096;
pub const MAX_TCP_MESSAGE_SIZE: usize = 65535;
pub const DEFAULT_BIND: &str = "0.0.0.0:53";
