pub mod clock;
pub mod telemetry;

pub use clock::Timestamp;
pub use telemetry::{init_tracing, init_tracing_with};
