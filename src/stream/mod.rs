//! Streaming message consumer.

pub mod consumer;
pub mod models;

pub use consumer::{ActionOutcome, RenderItem, StreamConsumer};
pub use models::{LifecycleState, MessagePart, PartKind};
