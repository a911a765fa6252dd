use chrono::{DateTime, Utc};
use tracing::info;

use crate::conversation::{ConversationMemory, RetentionPolicy};
use crate::error::ScenarioError;
use crate::scenario::{bind, parse_scenario_text, Scenario, SystemContext};

/// State owned by one conversation: scenario, bound context and memory
#[derive(Debug)]
pub struct Session {
    id: String,
    scenario: Scenario,
    context: SystemContext,
    pub(crate) memory: ConversationMemory,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Bind `scenario` once; the context is never recomputed
    pub fn new(id: impl Into<String>, scenario: Scenario, retention: RetentionPolicy) -> Self {
        let id = id.into();
        let context = bind(&scenario);

        info!(
            "Session {} bound to scenario: {} ({}) at {} with {}",
            id,
            scenario.language(),
            scenario.level(),
            scenario.place(),
            scenario.person_to_talk_to()
        );

        Self {
            id,
            scenario,
            context,
            memory: ConversationMemory::new(retention),
            started_at: Utc::now(),
        }
    }

    /// Create a session straight from generation-service scenario text
    pub fn from_scenario_text(
        id: impl Into<String>,
        raw_text: &str,
        retention: RetentionPolicy,
    ) -> Result<Self, ScenarioError> {
        let scenario = parse_scenario_text(raw_text)?;
        Ok(Self::new(id, scenario, retention))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn context(&self) -> &SystemContext {
        &self.context
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
