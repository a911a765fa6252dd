use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ScenarioError;

/// The seven required scenario fields, in canonical order
pub const SCENARIO_FIELDS: [&str; 7] = [
    "language",
    "level",
    "name",
    "place",
    "background",
    "person_to_talk_to",
    "goal",
];

/// Unvalidated scenario fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFields {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub person_to_talk_to: String,
    #[serde(default)]
    pub goal: String,
}

/// Immutable roleplay context of one session
///
/// Only constructible through validation: every field is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScenarioFields", into = "ScenarioFields")]
pub struct Scenario {
    fields: ScenarioFields,
}

impl Scenario {
    /// Validate and trim the fields
    pub fn new(fields: ScenarioFields) -> Result<Self, ScenarioError> {
        let fields = ScenarioFields {
            language: required("language", fields.language)?,
            level: required("level", fields.level)?,
            name: required("name", fields.name)?,
            place: required("place", fields.place)?,
            background: required("background", fields.background)?,
            person_to_talk_to: required("person_to_talk_to", fields.person_to_talk_to)?,
            goal: required("goal", fields.goal)?,
        };
        Ok(Self { fields })
    }

    pub fn language(&self) -> &str {
        &self.fields.language
    }

    pub fn level(&self) -> &str {
        &self.fields.level
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn place(&self) -> &str {
        &self.fields.place
    }

    pub fn background(&self) -> &str {
        &self.fields.background
    }

    pub fn person_to_talk_to(&self) -> &str {
        &self.fields.person_to_talk_to
    }

    pub fn goal(&self) -> &str {
        &self.fields.goal
    }

    pub fn fields(&self) -> &ScenarioFields {
        &self.fields
    }
}

impl TryFrom<ScenarioFields> for Scenario {
    type Error = ScenarioError;

    fn try_from(fields: ScenarioFields) -> Result<Self, Self::Error> {
        Scenario::new(fields)
    }
}

impl From<Scenario> for ScenarioFields {
    fn from(scenario: Scenario) -> Self {
        scenario.fields
    }
}

fn required(field: &'static str, value: String) -> Result<String, ScenarioError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ScenarioError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

/// Persisted scenario, used to resume a scenario across restarts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    #[serde(flatten)]
    pub scenario: Scenario,

    /// Generated background image, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<PathBuf>,

    /// Generated avatar image, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_image: Option<PathBuf>,
}

impl ScenarioRecord {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            background_image: None,
            avatar_image: None,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write scenario to {}", path.display()))?;

        info!("Scenario saved to {}", path.display());
        Ok(())
    }

    /// Load and re-validate a saved scenario
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario from {}", path.display()))?;
        let record: ScenarioRecord = serde_json::from_str(&json)
            .with_context(|| format!("Invalid scenario file {}", path.display()))?;

        info!(
            "Scenario loaded from {}: {} at {}",
            path.display(),
            record.scenario.language(),
            record.scenario.place()
        );
        Ok(record)
    }
}
