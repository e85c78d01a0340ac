use crate::config::{AppConfig, MapConfig};
use crate::data::{RegionStore, SourceSpec};
use crate::error::DataLoadError;
use crate::hit_test::HitTester;
use crate::lookup::DetailLookup;
use crate::render::{self, FrameStyle, Viewport};
use crate::selection::{Selection, Transition};
use crate::types::{Color, RegionId};
use geo::{Coord, Point, Rect};
use image::RgbaImage;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Everything about a map except its regions.
#[derive(Debug, Clone)]
pub struct MapSettings {
    pub id: String,
    pub title: String,
    pub highlight: Color,
    pub style: FrameStyle,
    pub size: (u32, u32),
    pub lookup: DetailLookup,
    pub flag: Option<PathBuf>,
}

impl MapSettings {
    pub fn from_config(map: &MapConfig, config: &AppConfig) -> Self {
        Self {
            id: map.id.clone(),
            title: map.title.clone(),
            highlight: config.style.highlight_color,
            style: FrameStyle {
                background: map.background_color,
                border: config.style.border_color,
                border_width: config.style.border_width,
            },
            size: (config.render.width, config.render.height),
            lookup: DetailLookup::new(config.reference.base_url.clone()),
            flag: map.flag.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickOutcome {
    pub region: Option<RegionId>,
    pub name: Option<String>,
    /// Reference page for the clicked region, present on every hit.
    pub reference: Option<String>,
    pub redrawn: bool,
    #[serde(skip)]
    pub transition: Transition,
}

/// One interactive map: regions, selection, and the current frame.
///
/// Clicks go in through [`click`](Self::click); the frame is redrawn exactly
/// once for every click that changes a region's color.
pub struct MapView {
    settings: MapSettings,
    store: RegionStore,
    hits: HitTester,
    selection: Selection,
    viewport: Viewport,
    frame: RgbaImage,
    redraws: u64,
}

impl MapView {
    pub fn load(map: &MapConfig, config: &AppConfig) -> Result<Self, DataLoadError> {
        let source = SourceSpec {
            path: map.source.clone(),
            name_field: map.name_field.clone(),
        };
        let store = RegionStore::load(&source, map.map_color)?;
        Ok(Self::new(MapSettings::from_config(map, config), store))
    }

    pub fn new(settings: MapSettings, store: RegionStore) -> Self {
        let bounds = store.bounds().unwrap_or_else(|| {
            tracing::warn!("Map '{}' has degenerate bounds", settings.id);
            Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 })
        });
        let (width, height) = settings.size;
        let viewport = Viewport::fit(bounds, width, height);
        let hits = HitTester::build(&store);
        let frame = render::draw_map(&store, &viewport, &settings.style);

        Self {
            settings,
            store,
            hits,
            selection: Selection::Empty,
            viewport,
            frame,
            redraws: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn title(&self) -> &str {
        &self.settings.title
    }

    pub fn flag(&self) -> Option<&Path> {
        self.settings.flag.as_deref()
    }

    pub fn store(&self) -> &RegionStore {
        &self.store
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    /// Number of redraws since construction.
    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    /// Read-only hit test.
    pub fn locate(&self, point: Point<f64>) -> Option<RegionId> {
        self.hits.locate(&self.store, point)
    }

    /// Handles a click at map coordinates; `None` is a click outside the plot.
    pub fn click(&mut self, point: Option<Point<f64>>) -> ClickOutcome {
        let hit = point.and_then(|p| self.locate(p));
        let transition = self.selection.apply(hit);

        if let Transition::Changed { previous, current } = transition {
            if let Some(previous) = previous {
                self.store.set_color(previous, self.store.default_color());
            }
            self.store.set_color(current, self.settings.highlight);
            self.redraw();
        }

        let name = hit.and_then(|id| self.store.get(id)).map(|r| r.name.clone());
        match &name {
            Some(name) => tracing::info!("Clicked on: {} ({})", name, self.settings.title),
            None => tracing::debug!("Click on '{}' hit no region", self.settings.id),
        }

        ClickOutcome {
            region: hit,
            reference: name.as_deref().map(|n| self.settings.lookup.resolve(n)),
            name,
            redrawn: transition.changes_colors(),
            transition,
        }
    }

    /// Handles a click at frame pixel coordinates.
    pub fn click_pixel(&mut self, px: f64, py: f64) -> ClickOutcome {
        let point = self.viewport.to_map(px, py);
        self.click(point)
    }

    /// Repaints the frame from the current region colors.
    pub fn redraw(&mut self) {
        self.frame = render::draw_map(&self.store, &self.viewport, &self.settings.style);
        self.redraws += 1;
    }

    /// Reference page for the map as a whole, bound to its title.
    pub fn map_reference(&self) -> String {
        self.settings.lookup.resolve(&self.settings.title)
    }
}
