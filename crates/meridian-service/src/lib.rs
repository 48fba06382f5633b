pub mod config;
pub mod event_sink;
pub mod executor;
pub mod profile;
pub mod sessions;

pub use config::RuntimeProfile;
pub use event_sink::{session_topic, BusEventSink};
pub use executor::{ExecutorService, StreamingExecution};
pub use profile::{ExecutionMode, ExecutionProfile};
pub use sessions::SessionsService;
