pub mod config;
pub mod ja3_loader;
pub mod pipeline;
pub mod receiver;
pub mod telemetry;

pub use config::ServiceConfig;
pub use ja3_loader::*;
pub use pipeline::{Pipeline, PipelineConfig};
pub use receiver::{MessageReceiver, ReceiveOutcome};
