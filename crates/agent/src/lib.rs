pub mod extraction;
pub mod llm;
pub mod prompt;

pub use extraction::{parse_agent_output, AgentTurn, FALLBACK_REPLY};
pub use llm::{ChatMessage, LlmClient, LlmError, OpenAiChatClient, ScriptedLlmClient};
pub use prompt::{build_messages, format_history, system_prompt};
