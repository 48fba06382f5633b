// In-process implementation of meridian-core's MessageBus trait (spec.md §4.12).

pub mod in_process;
pub mod task_board;
pub mod topics;

pub use in_process::{task_topic, InProcessMessageBus};
