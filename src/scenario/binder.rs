use std::fmt;
use std::sync::Arc;

use super::model::Scenario;

/// System prompt bound to one scenario. Cheap to clone, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemContext(Arc<str>);

impl SystemContext {
    /// Wrap an arbitrary system prompt
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(Arc::from(text.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SystemContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bind a scenario into the tutor system context
pub fn bind(scenario: &Scenario) -> SystemContext {
    let language = scenario.language();
    let level = scenario.level();
    let name = scenario.name();

    let text = format!(
        "You are a friendly, supportive language tutor helping a user named {name} practice {language}.\n\
         The user's proficiency level is {level}.\n\
         \n\
         Always strictly rely on the provided scenario:\n\
         - Place: {place}\n\
         - Background: {background}\n\
         - Person to talk to: {person}\n\
         - User's goal: {goal}\n\
         \n\
         Instructions:\n\
         - Initiate the conversation naturally in {language}.\n\
         - Greet the user personally by using their name {name} when appropriate.\n\
         - Speak according to the user's language level: {level}.\n\
         - The user must always speak second. You must start every dialogue.\n\
         - Keep the dialogue natural, immersive, and aligned with the scenario.\n\
         - If the user makes a mistake, correct it kindly and briefly in {language}, and continue the conversation.\n\
         - Stay in character based on the scenario at all times.\n\
         - Encourage the user to use new words, expressions, and help them reach their goal.\n\
         \n\
         Your primary aim is to make the practice fun, realistic, and confidence-building.",
        place = scenario.place(),
        background = scenario.background(),
        person = scenario.person_to_talk_to(),
        goal = scenario.goal(),
    );

    SystemContext::from_text(text)
}
