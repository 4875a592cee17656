pub mod broker;
pub mod decoder;
pub mod protocol;
pub mod reply;
pub mod uuencode;

pub use broker::{Broker, BrokerCore, BrokerStats, DaddrSweep, DaemonAddr, ProbeRequestTemplate};
pub use decoder::DecoderThread;
pub use protocol::{ConnectionFramer, FrameEvent};
pub use reply::{ProbeReply, ReplyStatistics};
