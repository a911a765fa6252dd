use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::binder::SystemContext;
use super::model::{Scenario, ScenarioRecord};
use super::parser::parse_scenario_text;
use crate::error::{ScenarioError, ServiceError};
use crate::services::{GenerationClient, GenerationRequest, ImageClient};

/// Who is practicing what, at which level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerProfile {
    pub language: String,
    pub level: String,
    pub name: String,
}

impl LearnerProfile {
    pub fn new(
        language: impl Into<String>,
        level: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, ScenarioError> {
        let profile = Self {
            language: language.into().trim().to_string(),
            level: level.into().trim().to_string(),
            name: name.into().trim().to_string(),
        };

        if profile.language.is_empty() {
            return Err(ScenarioError::MissingField("language"));
        }
        if profile.level.is_empty() {
            return Err(ScenarioError::MissingField("level"));
        }
        if profile.name.is_empty() {
            return Err(ScenarioError::MissingField("name"));
        }
        Ok(profile)
    }
}

/// Scenario generation failure
#[derive(Debug, thiserror::Error)]
pub enum ScenarioGenerationError {
    #[error("scenario generation failed: {0}")]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

/// Asks the generation service for a scenario matching a learner profile
pub struct ScenarioGenerator {
    generation: Arc<dyn GenerationClient>,
}

impl ScenarioGenerator {
    pub fn new(generation: Arc<dyn GenerationClient>) -> Self {
        Self { generation }
    }

    pub async fn generate(
        &self,
        profile: &LearnerProfile,
    ) -> Result<Scenario, ScenarioGenerationError> {
        info!(
            "Generating {} scenario for {} (level {})",
            profile.language, profile.name, profile.level
        );

        let context = SystemContext::from_text(scenario_prompt(profile));
        let response = self
            .generation
            .generate(GenerationRequest {
                system_context: &context,
                history: &[],
                user_text: "Create the scenario now.",
            })
            .await?;

        let scenario = parse_scenario_text(&response)?;

        info!(
            "Scenario ready: {} at {}, talking to {}",
            scenario.language(),
            scenario.place(),
            scenario.person_to_talk_to()
        );
        Ok(scenario)
    }
}

fn scenario_prompt(profile: &LearnerProfile) -> String {
    format!(
        "You are a creative language tutor helping a user named {name} practice {language}.\n\
         The user's current proficiency level is {level}.\n\
         Create a realistic language practice scenario, culturally linked to regions where the language is spoken.\n\
         Scenario and language difficulty must match the user's level:\n\
         - For beginners: simple, everyday situations with easy vocabulary.\n\
         - For intermediate learners: moderately complex tasks using practical vocabulary.\n\
         - For advanced learners: complex, nuanced scenarios requiring detailed discussion.\n\
         Rules:\n\
         - Pick a culturally appropriate place (1-3 words)\n\
         - Write a vivid background description (sights, sounds, smells, feelings)\n\
         - Choose a realistic person the user will talk to (cashier, waiter, officer, etc.)\n\
         - Adjust the complexity of the background description and conversation based on the level.\n\
         - Include a simple goal for the user (1 sentence)\n\
         - Output EXACTLY this format:\n\
         {{\n\
         \x20 \"language\": \"{language}\",\n\
         \x20 \"level\": \"{level}\",\n\
         \x20 \"name\": \"{name}\",\n\
         \x20 \"place\": \"[place]\",\n\
         \x20 \"background\": \"[background description]\",\n\
         \x20 \"person_to_talk_to\": \"[role]\",\n\
         \x20 \"goal\": \"[goal]\"\n\
         }}\n",
        name = profile.name,
        language = profile.language,
        level = profile.level,
    )
}

/// Prompt for a scenery image with no people in it
pub fn background_prompt(description: &str) -> String {
    format!(
        "{}. Imagine standing inside the scene, 360° natural surroundings. \
         Photorealistic style, natural lighting, realistic colors. \
         Wide-angle, open foreground. \
         Do not show any humans, people, shadows of people, or human-like figures in the scene.",
        description.trim_end_matches('.')
    )
}

/// Prompt for a portrait of the character the user talks to
pub fn avatar_prompt(person: &str, background: &str) -> String {
    format!(
        "A realistic professional portrait of a {}, appropriate to this setting: {}. \
         Close-up, shoulders and head only. Neutral expression. Soft natural lighting. \
         No background, transparent background preferred (or plain white if needed).",
        person, background
    )
}

/// Renders scenario images through the image service
pub struct ScenarioImagery {
    images: Arc<dyn ImageClient>,
    output_dir: PathBuf,
}

impl ScenarioImagery {
    pub fn new(images: Arc<dyn ImageClient>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            images,
            output_dir: output_dir.into(),
        }
    }

    /// Generate the background image and return its path
    pub async fn render_background(&self, scenario: &Scenario, file_name: &str) -> Result<PathBuf> {
        let bytes = self
            .images
            .generate_image(&background_prompt(scenario.background()), "1536x1024")
            .await
            .context("Background image generation failed")?;
        self.write(file_name, &bytes)
    }

    /// Generate the avatar image and return its path
    pub async fn render_avatar(&self, scenario: &Scenario, file_name: &str) -> Result<PathBuf> {
        let bytes = self
            .images
            .generate_image(
                &avatar_prompt(scenario.person_to_talk_to(), scenario.background()),
                "1024x1024",
            )
            .await
            .context("Avatar image generation failed")?;
        self.write(file_name, &bytes)
    }

    /// Render both images and attach them to a record
    pub async fn render_record(&self, scenario: Scenario) -> Result<ScenarioRecord> {
        let background = self.render_background(&scenario, "background.png").await?;
        let avatar = self.render_avatar(&scenario, "avatar.png").await?;

        Ok(ScenarioRecord {
            scenario,
            background_image: Some(background),
            avatar_image: Some(avatar),
        })
    }

    fn write(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).context("Failed to create image directory")?;
        let path = self.output_dir.join(Path::new(file_name));
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write image {}", path.display()))?;

        info!("Image saved to {}", path.display());
        Ok(path)
    }
}
