pub mod checksum;
pub mod frame;
pub mod transmitter;

pub use frame::{craft_frame, PayloadTable, UdpRequest};
pub use transmitter::Transmitter;
