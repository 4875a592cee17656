//! The measurement engine's core: classification, routing, belief
//! tracking, probing, and persistence. Raw sockets require `unsafe`
//! (`rawprobe`), so this crate does not `forbid(unsafe_code)` — the binary
//! crate wrapping it does.

pub mod cache;
pub mod capture;
pub mod collector;
pub mod config;
pub mod error;
pub mod hashing;
pub mod net;
pub mod probe;
pub mod rawprobe;
pub mod scamper;
pub mod telemetry;
pub mod time;

pub use config::{load_from_path, Config};
pub use error::{EngineError, Result};
