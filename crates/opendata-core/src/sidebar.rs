//! Sidebar presentation: the layer list, the data list and their resource links.
//!
//! Everything here is derived from the registry or from fetched records; nothing
//! in this module touches the map. Toggle commands leave as [`ViewerEvent`]s.

use crate::catalog::CatalogError;
use crate::feature::{non_blank, Feature};
use crate::registry::LayerRegistry;
use crate::sanitize::sanitize_html;
use crate::viewer::ViewerEvent;
use log::{debug, error};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerFilter {
    #[default]
    All,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Shapefile,
    Metadata,
    Byod,
    Pdf,
    Textfile,
    Gpkg,
    Website,
    RestService,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::Shapefile => "Shapefile",
            ResourceKind::Metadata => "Metadata",
            ResourceKind::Byod => "BYOD",
            ResourceKind::Pdf => "PDF",
            ResourceKind::Textfile => "Text file",
            ResourceKind::Gpkg => "GeoPackage",
            ResourceKind::Website => "Website",
            ResourceKind::RestService => "REST service",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLink {
    pub kind: ResourceKind,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRow {
    pub title: String,
    pub display_name: String,
    pub visible: bool,
    pub description: Option<String>,
    pub links: Vec<ResourceLink>,
    pub badges: Vec<(&'static str, String)>,
}

/// `parkLandUse` -> `Park Land Use`: first letter upper-cased, a space before every
/// later upper-case letter.
pub fn display_name(title: &str) -> String {
    let mut chars = title.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut out: String = first.to_uppercase().collect();
    for c in chars {
        if c.is_ascii_uppercase() {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

fn matches_search(title: &str, term: &str) -> bool {
    title.to_lowercase().contains(&term.to_lowercase())
}

/// Download and service links for one record. File names are resolved against
/// `open_data_base`; `theURL` and the service endpoint are used as given.
pub fn resource_links(feature: &Feature, open_data_base: &str) -> Vec<ResourceLink> {
    let base = open_data_base.trim_end_matches('/');
    let file = |name: &str| format!("{}/{}", base, name.trim_start_matches('/'));

    let mut links = Vec::new();
    let mut push = |kind, href: Option<String>| {
        if let Some(href) = href {
            links.push(ResourceLink { kind, href });
        }
    };

    push(ResourceKind::Shapefile, non_blank(feature.shapefile.as_deref()).map(file));
    push(
        ResourceKind::Metadata,
        non_blank(feature.metadata.as_deref()).map(|m| file(&format!("metadata/{}", m))),
    );
    push(ResourceKind::Byod, non_blank(feature.byod.as_deref()).map(file));
    push(ResourceKind::Pdf, non_blank(feature.pdf.as_deref()).map(file));
    push(ResourceKind::Textfile, non_blank(feature.textfile.as_deref()).map(file));
    push(ResourceKind::Gpkg, non_blank(feature.gpkg.as_deref()).map(file));
    push(
        ResourceKind::Website,
        non_blank(feature.the_url.as_deref()).map(str::to_string),
    );
    push(
        ResourceKind::RestService,
        feature.service_url().map(str::to_string),
    );
    links
}

fn badges(feature: &Feature) -> Vec<(&'static str, String)> {
    [
        ("updated", feature.updated.as_deref()),
        ("size", feature.size.as_deref()),
        ("source", feature.source.as_deref()),
    ]
    .into_iter()
    .filter_map(|(label, value)| non_blank(value).map(|v| (label, v.to_string())))
    .collect()
}

/// Rows for the layer list, in registry order.
pub fn layer_rows(
    registry: &LayerRegistry,
    filter: LayerFilter,
    search: &str,
    open_data_base: &str,
) -> Vec<LayerRow> {
    registry
        .iter()
        .filter(|(_, visible)| filter == LayerFilter::All || *visible)
        .filter(|(title, _)| matches_search(title, search))
        .filter_map(|(title, visible)| {
            let feature = registry.lookup(title)?;
            Some(LayerRow {
                title: title.to_string(),
                display_name: display_name(title),
                visible,
                description: feature.description().map(sanitize_html),
                links: resource_links(feature, open_data_base),
                badges: badges(feature),
            })
        })
        .collect()
}

/// Case-insensitive title search over the data list, in upstream order.
pub fn search_data<'a>(items: &'a [Feature], term: &str) -> Vec<&'a Feature> {
    items
        .iter()
        .filter(|item| matches_search(&item.title, term))
        .collect()
}

pub fn toggle_command(title: &str, visible: bool) -> ViewerEvent {
    ViewerEvent::ToggleLayer {
        title: title.to_string(),
        visible,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Loading,
    Failed(String),
    Ready(Vec<Feature>),
}

/// Identifies one fetch issued by a [`DataPanel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelTicket(u64);

/// The data list. Only the result of the newest fetch is applied, and nothing is
/// applied once the panel is closed.
#[derive(Debug, Default)]
pub struct DataPanel {
    state: PanelState,
    latest: u64,
    closed: bool,
}

impl DataPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn begin_fetch(&mut self) -> PanelTicket {
        self.latest += 1;
        self.state = PanelState::Loading;
        PanelTicket(self.latest)
    }

    /// Returns whether the result was applied.
    pub fn complete(&mut self, ticket: PanelTicket, result: Result<Vec<Feature>, CatalogError>) -> bool {
        if self.closed || ticket.0 != self.latest {
            debug!("[Sidebar] Ignoring stale data result {:?}", ticket);
            return false;
        }

        self.state = match result {
            Ok(items) => PanelState::Ready(items),
            Err(e) => {
                error!("[Sidebar] {}", e);
                PanelState::Failed(e.to_string())
            }
        };
        true
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// The inline text replacing the list while loading or after a failure.
    pub fn status_text(&self) -> Option<String> {
        match &self.state {
            PanelState::Loading => Some("Loading...".to_string()),
            PanelState::Failed(message) => Some(format!("Error: {}", message)),
            PanelState::Ready(_) => None,
        }
    }

    pub fn search(&self, term: &str) -> Vec<&Feature> {
        match &self.state {
            PanelState::Ready(items) => search_data(items, term),
            _ => Vec::new(),
        }
    }
}
