//! Scenario-scoped conversational memory

mod memory;

pub use memory::{ConversationMemory, ConversationTurn, RetentionPolicy, Role};
