use crate::config::AppConfig;
use crate::map_view::MapView;
use anyhow::{bail, Result};

/// The presented maps, in configuration order.
pub struct Atlas {
    views: Vec<MapView>,
}

impl Atlas {
    /// Loads every configured map. A map whose source fails to load is
    /// reported and left out; the rest are still presented.
    pub fn load(config: &AppConfig) -> Result<Self> {
        let mut views = Vec::with_capacity(config.maps.len());

        for map in &config.maps {
            match MapView::load(map, config) {
                Ok(view) => {
                    tracing::info!("Loaded map '{}' ({} regions)", map.id, view.store().len());
                    views.push(view);
                }
                Err(e) => tracing::error!("Skipping map '{}': {}", map.id, e),
            }
        }

        if views.is_empty() {
            bail!("None of the {} configured maps could be loaded", config.maps.len());
        }
        Ok(Self { views })
    }

    pub fn from_views(views: Vec<MapView>) -> Self {
        Self { views }
    }

    pub fn views(&self) -> &[MapView] {
        &self.views
    }

    pub fn get(&self, id: &str) -> Option<&MapView> {
        self.views.iter().find(|v| v.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut MapView> {
        self.views.iter_mut().find(|v| v.id() == id)
    }
}
