// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Open Data Viewer contributors

use crate::classify::{Classifier, ServiceKind};
use crate::engine::{EngineError, MapEngine};
use log::{error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASEMAP: &str = "topo-vector";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BasemapError {
    #[error("A basemap switch is already in progress")]
    Busy,
    #[error("Map view not initialized")]
    NoView,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseLayerKind {
    /// Vector-tile style basemap published as an image service.
    VectorImage,
    Tiled,
}

impl BaseLayerKind {
    /// County vector basemaps are MapServer endpoints named `VectorBasemap...`; as
    /// overlays they are ordinary map images, only basemap selection treats them apart.
    pub fn for_url(url: &str) -> Self {
        if url.to_lowercase().contains("vectorbasemap") {
            return BaseLayerKind::VectorImage;
        }
        match Classifier::classify(url) {
            ServiceKind::VectorTile => BaseLayerKind::VectorImage,
            _ => BaseLayerKind::Tiled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseLayer {
    pub url: String,
    pub kind: BaseLayerKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasemapSpec {
    /// A named basemap supplied by the rendering library.
    Standard(String),
    Custom { title: String, base_layers: Vec<BaseLayer> },
}

impl BasemapSpec {
    pub fn resolve(id: &str, url: Option<&str>) -> Self {
        match url {
            Some(url) => BasemapSpec::Custom {
                title: id.to_string(),
                base_layers: vec![BaseLayer {
                    url: url.to_string(),
                    kind: BaseLayerKind::for_url(url),
                }],
            },
            None => BasemapSpec::Standard(id.to_string()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            BasemapSpec::Standard(id) => id,
            BasemapSpec::Custom { title, .. } => title,
        }
    }
}

impl Default for BasemapSpec {
    fn default() -> Self {
        BasemapSpec::Standard(DEFAULT_BASEMAP.to_string())
    }
}

/// One selectable entry in the basemap gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasemapOption {
    pub id: &'static str,
    pub name: &'static str,
    pub preview: &'static str,
    pub url: Option<&'static str>,
}

impl BasemapOption {
    pub fn spec(&self) -> BasemapSpec {
        BasemapSpec::resolve(self.id, self.url)
    }
}

pub const BASEMAPS: &[BasemapOption] = &[
    BasemapOption {
        id: "meck-basemap",
        name: "Meck Basemap",
        preview: "Mecklenburg County standard basemap",
        url: Some("https://meckgis.mecklenburgcountync.gov/server/rest/services/Basemap/Basemap/MapServer"),
    },
    BasemapOption {
        id: "meck-vector-aerial",
        name: "Meck Aerial",
        preview: "Mecklenburg County aerial imagery",
        url: Some("https://meckgis.mecklenburgcountync.gov/server/rest/services/Basemap/BasemapAerial/MapServer"),
    },
    BasemapOption {
        id: "meck-topo-hillshade",
        name: "Meck Topo",
        preview: "Mecklenburg County topographic map with hillshade",
        url: Some("https://meckgis.mecklenburgcountync.gov/server/rest/services/Basemap/TopoHillShade/MapServer"),
    },
    BasemapOption {
        id: "meck-vector-grayscale",
        name: "Meck Grayscale",
        preview: "Mecklenburg County vector basemap in grayscale",
        url: Some("https://meckgis.mecklenburgcountync.gov/server/rest/services/Basemap/VectorBasemapGrayscale/MapServer"),
    },
    BasemapOption {
        id: "meck-vector",
        name: "Meck Vector",
        preview: "Mecklenburg County vector basemap",
        url: Some("https://meckgis.mecklenburgcountync.gov/server/rest/services/Basemap/VectorBasemap/MapServer"),
    },
    BasemapOption {
        id: "topo-vector",
        name: "Topographic",
        preview: "Detailed terrain and natural features",
        url: None,
    },
    BasemapOption {
        id: "streets-vector",
        name: "Streets",
        preview: "Detailed street map",
        url: None,
    },
    BasemapOption {
        id: "satellite",
        name: "Satellite",
        preview: "Aerial imagery without labels",
        url: None,
    },
    BasemapOption {
        id: "hybrid",
        name: "Hybrid",
        preview: "Aerial imagery with labels",
        url: None,
    },
    BasemapOption {
        id: "dark-gray-vector",
        name: "Dark Gray",
        preview: "Dark themed map for data visualization",
        url: None,
    },
    BasemapOption {
        id: "gray-vector",
        name: "Light Gray",
        preview: "Light themed map for data visualization",
        url: None,
    },
    BasemapOption {
        id: "streets-navigation-vector",
        name: "Navigation",
        preview: "Navigation focused map",
        url: None,
    },
];

pub fn find_basemap(id: &str) -> Option<&'static BasemapOption> {
    BASEMAPS.iter().find(|b| b.id == id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchReport {
    pub basemap: BasemapSpec,
    pub overlays_carried: usize,
}

pub struct BasemapSwitcher;

impl BasemapSwitcher {
    /// Replaces the map with one using the chosen basemap and carries every
    /// attached overlay across in its original order.
    ///
    /// The overlays are snapshotted before the new map is built, and the new map
    /// is only installed once it is complete; on error the engine keeps its
    /// current map. Callers must not start a second switch before this one settles.
    pub fn switch<E: MapEngine>(
        engine: &mut E,
        id: &str,
        url: Option<&str>,
    ) -> Result<SwitchReport, BasemapError> {
        let spec = BasemapSpec::resolve(id, url);
        let overlays = engine.overlays();

        let result = engine.create_map(&spec).and_then(|mut map| {
            if !overlays.is_empty() {
                engine.add_overlays(&mut map, &overlays)?;
            }
            Ok(map)
        });

        match result {
            Ok(map) => {
                engine.install_map(map);
                info!(
                    "[Basemap] Basemap changed to: {} ({} overlays carried)",
                    id,
                    overlays.len()
                );
                Ok(SwitchReport {
                    basemap: spec,
                    overlays_carried: overlays.len(),
                })
            }
            Err(e) => {
                error!("[Basemap] Error switching basemap to {}: {}", id, e);
                Err(e.into())
            }
        }
    }
}
