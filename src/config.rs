use crate::types::Color;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub maps: Vec<MapConfig>,
}

/// One tab: a vector source plus its colors.
#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    pub id: String,
    pub title: String,
    pub source: PathBuf,
    /// Feature property holding the region's display name (e.g. `NAME_1`).
    pub name_field: String,
    pub map_color: Color,
    pub background_color: Color,
    pub flag: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StyleConfig {
    pub highlight_color: Color,
    pub border_color: Color,
    pub border_width: u32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            highlight_color: Color::AZURE,
            border_color: Color::BLACK,
            border_width: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReferenceConfig {
    pub base_url: String,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://en.wikipedia.org/wiki/".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config = Self::from_toml(&content)?;

        // Sources and flags are relative to the config file, not the cwd.
        if let Some(base) = path.parent() {
            for map in &mut config.maps {
                if map.source.is_relative() {
                    map.source = base.join(&map.source);
                }
                if let Some(flag) = map.flag.as_mut().filter(|f| f.is_relative()) {
                    *flag = base.join(&*flag);
                }
            }
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.maps.is_empty() {
            bail!("Configuration declares no maps");
        }
        if self.render.width == 0 || self.render.height == 0 {
            bail!(
                "Render size must be non-zero, got {}x{}",
                self.render.width,
                self.render.height
            );
        }

        let mut seen = HashSet::new();
        for map in &self.maps {
            if !seen.insert(map.id.as_str()) {
                bail!("Duplicate map id '{}'", map.id);
            }
            if map.name_field.trim().is_empty() {
                bail!("Map '{}' has an empty name_field", map.id);
            }
        }
        Ok(())
    }

    pub fn map(&self, id: &str) -> Option<&MapConfig> {
        self.maps.iter().find(|m| m.id == id)
    }
}
