use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::transcript::Persona;

const DEFAULT_USER_ALIAS: &str = "群主";
const DEFAULT_MAX_PERSONAS: usize = 3;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/v1/chat/completions".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.6,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PersonaSlot {
    #[serde(default)]
    name: String,
    #[serde(default)]
    system: String,
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default = "default_user_alias")]
    user_alias: String,
    #[serde(default = "default_max_personas")]
    max_personas: usize,
    #[serde(default)]
    personas: Vec<PersonaSlot>,
    #[serde(default)]
    api: ApiConfig,
}

fn default_user_alias() -> String {
    DEFAULT_USER_ALIAS.to_string()
}

fn default_max_personas() -> usize {
    DEFAULT_MAX_PERSONAS
}

/// Validated session settings: who the user is, who is at the table and how
/// to reach the model.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_alias: String,
    pub personas: Vec<Persona>,
    pub api: ApiConfig,
}

impl SessionConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read session config {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Invalid session config {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).context("Failed to parse session config TOML")?;

        let user_alias = file.user_alias.trim().to_owned();
        if user_alias.is_empty() {
            bail!("user_alias must not be blank");
        }

        let mut personas: Vec<Persona> = file
            .personas
            .into_iter()
            .map(|slot| Persona {
                name: slot.name.trim().to_owned(),
                system: slot.system.trim().to_owned(),
            })
            .filter(|persona| !persona.name.is_empty() && !persona.system.is_empty())
            .collect();

        if personas.len() > file.max_personas {
            tracing::warn!(
                defined = personas.len(),
                max = file.max_personas,
                "too many personas, ignoring the extra ones"
            );
            personas.truncate(file.max_personas);
        }

        let config = Self {
            user_alias,
            personas,
            api: file.api,
        };
        config.check_unique_names()?;
        Ok(config)
    }

    pub fn override_user_alias(&mut self, alias: &str) -> Result<()> {
        let alias = alias.trim();
        if alias.is_empty() {
            bail!("user alias must not be blank");
        }
        self.user_alias = alias.to_owned();
        self.check_unique_names()
    }

    fn check_unique_names(&self) -> Result<()> {
        let mut seen = HashSet::from([self.user_alias.as_str()]);
        for persona in &self.personas {
            if !seen.insert(persona.name.as_str()) {
                bail!("Name `{}` is used more than once", persona.name);
            }
        }
        Ok(())
    }
}
