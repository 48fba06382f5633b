pub mod classifier;
pub mod orchestrator;
pub mod spawner;
pub mod tasks;

pub use classifier::{classify_result_is_complex, AutoEpicClassifier, ClassifierVerdict, Complexity};
pub use orchestrator::{EpicConfig, EpicOrchestrator};
pub use spawner::AgentLoopSpawner;
pub use tasks::parse_tasks;
