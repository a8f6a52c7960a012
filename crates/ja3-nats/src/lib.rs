mod client;
mod consumer;
mod envelope;

pub use client::NatsClient;
pub use consumer::{ConsumerConfig, Disposition, MessageHandler, NatsConsumer};
pub use envelope::{decode_envelope, EnvelopeError};
