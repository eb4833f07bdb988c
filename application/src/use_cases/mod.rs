//! Use cases: planning, pipeline scheduling, asynchronous queue.

pub mod pipeline;
pub mod planning;
pub mod queue;
