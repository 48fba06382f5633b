mod provider;
mod types;

pub use provider::AnthropicProvider;
