//! The imperative map surface the adapter drives.
//!
//! A real renderer implements [`MapEngine`]; [`MemoryEngine`] is the headless
//! implementation used by the CLI preview and by the tests.

pub mod memory;

use crate::basemap::BasemapSpec;
use crate::classify::{Classifier, ServiceKind};
use crate::feature::Feature;
use crate::popup::PopupTemplate;
use crate::widgets::WidgetConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use memory::{LayerHandle, MemoryEngine, WidgetHandle};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Failed to construct layer '{title}': {reason}")]
    LayerConstruction { title: String, reason: String },
    #[error("Layer is not attached to the map: {0}")]
    NotAttached(String),
    #[error("Failed to construct map: {0}")]
    MapConstruction(String),
    #[error("Widget error: {0}")]
    Widget(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlayKind {
    Feature,
    MapImage,
}

impl From<OverlayKind> for ServiceKind {
    fn from(kind: OverlayKind) -> Self {
        match kind {
            OverlayKind::Feature => ServiceKind::FeatureService,
            OverlayKind::MapImage => ServiceKind::MapImageService,
        }
    }
}

/// Everything needed to construct one overlay layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub title: String,
    pub url: String,
    pub kind: OverlayKind,
    pub visible: bool,
    pub out_fields: Vec<String>,
    pub popup: Option<PopupTemplate>,
}

impl LayerSpec {
    /// `None` when the feature has no endpoint or the endpoint is not an overlay service.
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let url = feature.service_url()?;

        match Classifier::classify(url) {
            ServiceKind::FeatureService => Some(Self {
                id: feature.title.clone(),
                title: feature.title.clone(),
                url: url.to_string(),
                kind: OverlayKind::Feature,
                visible: true,
                out_fields: vec!["*".to_string()],
                popup: Some(PopupTemplate::for_feature(feature)),
            }),
            ServiceKind::MapImageService => Some(Self {
                id: feature.title.clone(),
                title: feature.title.clone(),
                url: Classifier::parent_service_url(url).to_string(),
                kind: OverlayKind::MapImage,
                visible: true,
                out_fields: Vec::new(),
                popup: None,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFilter {
    pub where_clause: String,
    pub geometry: Option<Extent>,
    pub spatial_relationship: String,
    pub distance: f64,
    pub units: String,
}

/// Styling split between features matching a filter and the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEffect {
    pub filter: FeatureFilter,
    pub included_effect: String,
    pub excluded_effect: String,
    pub excluded_labels_visible: bool,
}

pub trait MapEngine {
    type Layer: Clone + PartialEq + fmt::Debug;
    type Map;
    type Widget: fmt::Debug;

    fn create_layer(&mut self, spec: &LayerSpec) -> Result<Self::Layer, EngineError>;
    fn add_layer(&mut self, layer: &Self::Layer) -> Result<(), EngineError>;
    fn remove_layer(&mut self, layer: &Self::Layer) -> Result<(), EngineError>;
    /// Releases a layer that was created but never attached.
    fn discard_layer(&mut self, layer: Self::Layer);
    fn set_layer_visible(&mut self, layer: &Self::Layer, visible: bool)
        -> Result<(), EngineError>;

    /// Overlays attached to the current map, bottom to top.
    fn overlays(&self) -> Vec<Self::Layer>;

    /// Builds a detached map; nothing changes until [`MapEngine::install_map`].
    fn create_map(&mut self, basemap: &BasemapSpec) -> Result<Self::Map, EngineError>;
    fn add_overlays(&mut self, map: &mut Self::Map, layers: &[Self::Layer])
        -> Result<(), EngineError>;
    fn install_map(&mut self, map: Self::Map);
    fn basemap(&self) -> BasemapSpec;

    fn set_feature_effect(
        &mut self,
        layer: &Self::Layer,
        effect: Option<FeatureEffect>,
    ) -> Result<(), EngineError>;
    fn extent(&self) -> Option<Extent>;

    fn mount_widget(&mut self, config: &WidgetConfig) -> Result<Self::Widget, EngineError>;
    fn destroy_widget(&mut self, widget: Self::Widget);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_service_spec() {
        let feature = Feature::with_service(
            "Parks",
            "https://gis.example.gov/rest/services/Parks/FeatureServer/0",
        );
        let spec = LayerSpec::from_feature(&feature).unwrap();

        assert_eq!(spec.kind, OverlayKind::Feature);
        assert_eq!(spec.url, "https://gis.example.gov/rest/services/Parks/FeatureServer/0");
        assert_eq!(spec.out_fields, vec!["*"]);
        assert!(spec.popup.is_some());
        assert!(spec.visible);
    }

    #[test]
    fn test_map_image_spec_uses_parent_service() {
        let feature = Feature::with_service(
            "Zoning",
            "https://gis.example.gov/rest/services/Zoning/MapServer/3",
        );
        let spec = LayerSpec::from_feature(&feature).unwrap();

        assert_eq!(spec.kind, OverlayKind::MapImage);
        assert_eq!(spec.url, "https://gis.example.gov/rest/services/Zoning/MapServer");
        assert!(spec.popup.is_none());
    }

    #[test]
    fn test_vector_basemap_service_is_drawn_as_map_image() {
        let feature = Feature::with_service(
            "County Vector",
            "https://meckgis.mecklenburgcountync.gov/server/rest/services/Basemap/VectorBasemap/MapServer",
        );
        let spec = LayerSpec::from_feature(&feature).unwrap();

        assert_eq!(spec.kind, OverlayKind::MapImage);
        assert!(spec.url.ends_with("/VectorBasemap/MapServer"));
    }

    #[test]
    fn test_unclassifiable_endpoint_has_no_spec() {
        let feature = Feature::with_service("Trees", "https://example.gov/trees.geojson");
        assert!(LayerSpec::from_feature(&feature).is_none());
        assert!(LayerSpec::from_feature(&Feature::new("Docs")).is_none());
    }
}
