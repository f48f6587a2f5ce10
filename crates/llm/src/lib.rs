pub mod provider;
pub mod providers;

pub use provider::{LlmError, LlmProvider, Message, Role};
#[cfg(any(test, feature = "test-utils"))]
pub use provider::mock::MockLlmProvider;
pub use providers::create_provider;
