pub mod metrics;
pub mod server;
pub mod tracing;

pub use metrics::Metrics;
pub use server::serve;
pub use tracing::init_logging;
