pub mod endpoint;
pub mod icmp;
pub mod ipv4;
pub mod packet;
pub mod protocol;
pub mod tcp;
pub mod udp;

pub use endpoint::Endpoint;
pub use icmp::{Icmp, IcmpType};
pub use ipv4::Subnet;
pub use packet::{FiveTuple, Packet, TargetKey, TransportRecord};
pub use protocol::Protocol;
pub use tcp::{Tcp, TcpOpt, TcpOptionSet};
pub use udp::{Udp, UdpHdr};
