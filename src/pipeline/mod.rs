//! Node-based streaming pipeline.
//!
//! Each node runs in its own thread, connected to its neighbors by unbounded
//! crossbeam channels carrying items in FIFO order.

pub mod builder;
pub mod error;
pub mod node;

pub use builder::{Pipeline, PipelineBuilder, PipelineHandle};
pub use error::{ErrorReporter, LogReporter, NodeError};
pub use node::{Emitter, Flow, Node, NodeRunner, Signal};
