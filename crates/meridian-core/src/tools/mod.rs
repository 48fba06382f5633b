// Built-in tools, grounded in the teacher's capability tools (`current_time`,
// `noop`): small, self-contained, no external dependencies beyond chrono.

mod ask_user;
mod call_agent;
mod echo;
mod get_current_time;

pub use ask_user::AskUserTool;
pub use call_agent::CallAgentTool;
pub use echo::EchoTool;
pub use get_current_time::GetCurrentTimeTool;
