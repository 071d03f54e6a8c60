use super::{EngineError, Extent, FeatureEffect, LayerSpec, MapEngine};
use crate::basemap::BasemapSpec;
use crate::widgets::{WidgetConfig, WidgetKind};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetHandle(pub u64);

#[derive(Debug, Clone)]
pub struct MemoryLayer {
    pub spec: LayerSpec,
    pub visible: bool,
    pub effect: Option<FeatureEffect>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMap {
    pub basemap: BasemapSpec,
    pub overlays: Vec<LayerHandle>,
}

/// Headless map engine: records what a renderer would show.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    map: MemoryMap,
    layers: HashMap<LayerHandle, MemoryLayer>,
    widgets: HashMap<WidgetHandle, WidgetKind>,
    next_id: u64,
    extent: Option<Extent>,
    pub layers_created: usize,
    pub layers_removed: usize,
    pub maps_installed: usize,
    pub widgets_destroyed: usize,
    /// Titles whose layer construction fails, for exercising error paths.
    pub fail_titles: HashSet<String>,
    /// Titles whose layers build but cannot be attached.
    pub fail_attach: HashSet<String>,
    pub fail_maps: bool,
}

impl MemoryEngine {
    pub fn new(basemap: BasemapSpec) -> Self {
        Self {
            map: MemoryMap {
                basemap,
                overlays: Vec::new(),
            },
            ..Self::default()
        }
    }

    pub fn set_extent(&mut self, extent: Extent) {
        self.extent = Some(extent);
    }

    pub fn layer(&self, handle: &LayerHandle) -> Option<&MemoryLayer> {
        self.layers.get(handle)
    }

    /// Titles of attached overlays, bottom to top.
    pub fn overlay_titles(&self) -> Vec<String> {
        self.map
            .overlays
            .iter()
            .filter_map(|h| self.layers.get(h))
            .map(|l| l.spec.title.clone())
            .collect()
    }

    /// Every layer the engine still holds, attached or not.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn mounted_widgets(&self) -> Vec<WidgetKind> {
        self.widgets.values().copied().collect()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl MapEngine for MemoryEngine {
    type Layer = LayerHandle;
    type Map = MemoryMap;
    type Widget = WidgetHandle;

    fn create_layer(&mut self, spec: &LayerSpec) -> Result<LayerHandle, EngineError> {
        if self.fail_titles.contains(&spec.title) {
            return Err(EngineError::LayerConstruction {
                title: spec.title.clone(),
                reason: "construction rejected".to_string(),
            });
        }

        let handle = LayerHandle(self.next_id());
        self.layers.insert(
            handle,
            MemoryLayer {
                spec: spec.clone(),
                visible: spec.visible,
                effect: None,
            },
        );
        self.layers_created += 1;
        Ok(handle)
    }

    fn add_layer(&mut self, layer: &LayerHandle) -> Result<(), EngineError> {
        let Some(built) = self.layers.get(layer) else {
            return Err(EngineError::NotAttached(format!("{layer:?}")));
        };
        if self.fail_attach.contains(&built.spec.title) {
            return Err(EngineError::LayerConstruction {
                title: built.spec.title.clone(),
                reason: "attach rejected".to_string(),
            });
        }
        if !self.map.overlays.contains(layer) {
            self.map.overlays.push(*layer);
        }
        Ok(())
    }

    fn remove_layer(&mut self, layer: &LayerHandle) -> Result<(), EngineError> {
        let before = self.map.overlays.len();
        self.map.overlays.retain(|h| h != layer);
        if self.map.overlays.len() == before {
            return Err(EngineError::NotAttached(format!("{layer:?}")));
        }
        self.layers.remove(layer);
        self.layers_removed += 1;
        Ok(())
    }

    fn discard_layer(&mut self, layer: LayerHandle) {
        if !self.map.overlays.contains(&layer) {
            self.layers.remove(&layer);
        }
    }

    fn set_layer_visible(&mut self, layer: &LayerHandle, visible: bool) -> Result<(), EngineError> {
        match self.layers.get_mut(layer) {
            Some(l) => {
                l.visible = visible;
                Ok(())
            }
            None => Err(EngineError::NotAttached(format!("{layer:?}"))),
        }
    }

    fn overlays(&self) -> Vec<LayerHandle> {
        self.map.overlays.clone()
    }

    fn create_map(&mut self, basemap: &BasemapSpec) -> Result<MemoryMap, EngineError> {
        if self.fail_maps {
            return Err(EngineError::MapConstruction(format!(
                "basemap '{}' unavailable",
                basemap.id()
            )));
        }
        Ok(MemoryMap {
            basemap: basemap.clone(),
            overlays: Vec::new(),
        })
    }

    fn add_overlays(&mut self, map: &mut MemoryMap, layers: &[LayerHandle]) -> Result<(), EngineError> {
        for layer in layers {
            if !self.layers.contains_key(layer) {
                return Err(EngineError::NotAttached(format!("{layer:?}")));
            }
            map.overlays.push(*layer);
        }
        Ok(())
    }

    fn install_map(&mut self, map: MemoryMap) {
        self.map = map;
        self.maps_installed += 1;
    }

    fn basemap(&self) -> BasemapSpec {
        self.map.basemap.clone()
    }

    fn set_feature_effect(
        &mut self,
        layer: &LayerHandle,
        effect: Option<FeatureEffect>,
    ) -> Result<(), EngineError> {
        match self.layers.get_mut(layer) {
            Some(l) => {
                l.effect = effect;
                Ok(())
            }
            None => Err(EngineError::NotAttached(format!("{layer:?}"))),
        }
    }

    fn extent(&self) -> Option<Extent> {
        self.extent
    }

    fn mount_widget(&mut self, config: &WidgetConfig) -> Result<WidgetHandle, EngineError> {
        let handle = WidgetHandle(self.next_id());
        self.widgets.insert(handle, config.kind());
        Ok(handle)
    }

    fn destroy_widget(&mut self, widget: WidgetHandle) {
        if self.widgets.remove(&widget).is_some() {
            self.widgets_destroyed += 1;
        }
    }
}
