//! Scenario creation, validation and binding
//!
//! A scenario is produced once per session (generated or loaded from disk),
//! validated strictly, and bound into the system context every reply uses.

mod binder;
mod generator;
mod model;
mod parser;

pub use binder::{bind, SystemContext};
pub use generator::{
    avatar_prompt, background_prompt, LearnerProfile, ScenarioGenerationError,
    ScenarioGenerator, ScenarioImagery,
};
pub use model::{Scenario, ScenarioFields, ScenarioRecord, SCENARIO_FIELDS};
pub use parser::parse_scenario_text;
