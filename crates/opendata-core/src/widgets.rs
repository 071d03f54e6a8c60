//! Bookmarks and print widgets, bound to the view's lifecycle.
//!
//! Each widget is a small state machine: `Inactive -> AwaitingView -> Active`.
//! Activation before the view is ready parks the widget until the ready signal;
//! deactivation destroys whatever is mounted and is safe to repeat.

use crate::engine::{EngineError, FeatureEffect, FeatureFilter, MapEngine};
use crate::view::View;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PRINT_MENU: &str = "Print";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetKind {
    Bookmarks,
    Print,
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetKind::Bookmarks => f.write_str("bookmarks"),
            WidgetKind::Print => f.write_str("print"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarksConfig {
    pub drag_enabled: bool,
    pub add_bookmark_button: bool,
    pub edit_bookmark_button: bool,
    pub show_time: bool,
}

impl Default for BookmarksConfig {
    fn default() -> Self {
        Self {
            drag_enabled: true,
            add_bookmark_button: true,
            edit_bookmark_button: true,
            show_time: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintTemplate {
    pub title: String,
    pub author: String,
    pub copyright: String,
    pub legend_enabled: bool,
    pub scale_enabled: bool,
}

impl Default for PrintTemplate {
    fn default() -> Self {
        Self {
            title: "Mecklenburg County, NC".to_string(),
            author: String::new(),
            copyright: "© 2024".to_string(),
            legend_enabled: true,
            scale_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    pub service_url: String,
    pub formats: Vec<String>,
    pub template: PrintTemplate,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            service_url: "https://utility.arcgisonline.com/arcgis/rest/services/Utilities/PrintingTools/GPServer/Export%20Web%20Map%20Task".to_string(),
            formats: ["jpg", "png8", "png32", "pdf"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            template: PrintTemplate::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetConfig {
    Bookmarks(BookmarksConfig),
    Print(PrintConfig),
}

impl WidgetConfig {
    pub fn kind(&self) -> WidgetKind {
        match self {
            WidgetConfig::Bookmarks(_) => WidgetKind::Bookmarks,
            WidgetConfig::Print(_) => WidgetKind::Print,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum WidgetState<W> {
    Inactive,
    AwaitingView,
    Active(W),
}

#[derive(Debug)]
pub struct WidgetSlot<W> {
    config: WidgetConfig,
    state: WidgetState<W>,
    mounts: usize,
}

impl<W: fmt::Debug> WidgetSlot<W> {
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            config,
            state: WidgetState::Inactive,
            mounts: 0,
        }
    }

    pub fn kind(&self) -> WidgetKind {
        self.config.kind()
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn state(&self) -> &WidgetState<W> {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, WidgetState::Active(_))
    }

    /// Number of times a widget has been mounted over this slot's life.
    pub fn mounts(&self) -> usize {
        self.mounts
    }

    /// Mounts now if the view is ready, otherwise waits for [`WidgetSlot::on_view_ready`].
    /// A no-op while already active or waiting.
    pub fn activate<E>(&mut self, view: Option<&mut View<E>>)
    where
        E: MapEngine<Widget = W>,
    {
        if !matches!(self.state, WidgetState::Inactive) {
            debug!("[Widgets] {} already activated", self.kind());
            return;
        }

        match view {
            Some(view) if view.is_ready() => self.mount(view),
            _ => {
                debug!("[Widgets] {} waiting for the view", self.kind());
                self.state = WidgetState::AwaitingView;
            }
        }
    }

    pub fn on_view_ready<E>(&mut self, view: &mut View<E>)
    where
        E: MapEngine<Widget = W>,
    {
        if matches!(self.state, WidgetState::AwaitingView) {
            self.mount(view);
        }
    }

    /// Destroys the mounted widget, if any. Safe to call in any state.
    pub fn deactivate<E>(&mut self, view: Option<&mut View<E>>)
    where
        E: MapEngine<Widget = W>,
    {
        match std::mem::replace(&mut self.state, WidgetState::Inactive) {
            WidgetState::Active(widget) => {
                match view {
                    Some(view) => view.engine_mut().destroy_widget(widget),
                    None => warn!(
                        "[Widgets] View gone before {} was destroyed; dropping handle",
                        self.kind()
                    ),
                }
                info!("[Widgets] {} destroyed", self.kind());
            }
            WidgetState::AwaitingView => debug!("[Widgets] {} activation cancelled", self.kind()),
            WidgetState::Inactive => {}
        }
    }

    fn mount<E>(&mut self, view: &mut View<E>)
    where
        E: MapEngine<Widget = W>,
    {
        match view.engine_mut().mount_widget(&self.config) {
            Ok(widget) => {
                self.mounts += 1;
                info!("[Widgets] {} mounted", self.kind());
                self.state = WidgetState::Active(widget);
            }
            Err(e) => {
                error!("[Widgets] Failed to mount {}: {}", self.kind(), e);
                self.state = WidgetState::Inactive;
            }
        }
    }
}

/// Feature effect applied to the first overlay when a bookmark is selected:
/// features whose `Name` matches the bookmark stay in colour, the rest are greyed out.
pub fn bookmark_effect<E: MapEngine>(engine: &E, bookmark_name: &str) -> FeatureEffect {
    let name = bookmark_name.to_uppercase().replace('\'', "''");
    FeatureEffect {
        filter: FeatureFilter {
            where_clause: format!("Name = '{}'", name),
            geometry: engine.extent(),
            spatial_relationship: "intersects".to_string(),
            distance: 0.0,
            units: "meters".to_string(),
        },
        included_effect: "none".to_string(),
        excluded_effect: "grayscale(100%) opacity(30%)".to_string(),
        excluded_labels_visible: true,
    }
}

/// Applies [`bookmark_effect`] to the bottom-most overlay. Returns `Ok(false)` when
/// there is no overlay to apply it to.
pub fn select_bookmark<E: MapEngine>(engine: &mut E, bookmark_name: &str) -> Result<bool, EngineError> {
    let Some(layer) = engine.overlays().into_iter().next() else {
        debug!("[Widgets] Bookmark '{}' selected with no overlays", bookmark_name);
        return Ok(false);
    };
    let effect = bookmark_effect(engine, bookmark_name);
    engine.set_feature_effect(&layer, Some(effect))?;
    Ok(true)
}

/// Whether the print widget should be mounted for the active sidebar menu.
pub fn print_wanted(active_menu: &str) -> bool {
    active_menu == PRINT_MENU
}
