pub mod classifier;
pub mod router;
pub mod source;

pub use classifier::{classify, Filters, RawFrame, Rejection};
pub use router::{Router, RouterStats, ShardId, ShardSink};
pub use source::{CaptureStats, FrameSource, NextFrame, OwnedFrame, ReplaySource};
