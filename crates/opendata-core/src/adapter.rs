// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Open Data Viewer contributors

use crate::engine::{LayerSpec, MapEngine, OverlayKind};
use crate::registry::LayerRegistry;
use log::{debug, error, info};
use std::collections::HashMap;

/// What happens to an instance whose layer is switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Detach and discard every hidden layer.
    #[default]
    Remove,
    /// Keep feature-service layers attached but hidden, so showing them again
    /// does not refetch from the upstream service. Map-image layers are still removed.
    HideFeatureLayers,
}

#[derive(Debug, Clone)]
struct LiveLayer<L> {
    layer: L,
    kind: OverlayKind,
    visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub shown: Vec<String>,
    pub hidden: Vec<String>,
    /// Visible titles that cannot be rendered (no endpoint or unknown service kind).
    pub phantoms: Vec<String>,
    pub failed: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.shown.is_empty()
            && self.hidden.is_empty()
            && self.failed.is_empty()
    }

    pub fn merge(&mut self, other: ReconcileReport) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        self.shown.extend(other.shown);
        self.hidden.extend(other.hidden);
        self.phantoms.extend(other.phantoms);
        self.failed.extend(other.failed);
    }
}

/// Keeps the live overlay instances in step with the registry.
#[derive(Debug)]
pub struct MapAdapter<L> {
    live: HashMap<String, LiveLayer<L>>,
    policy: RetentionPolicy,
}

impl<L> Default for MapAdapter<L> {
    fn default() -> Self {
        Self {
            live: HashMap::new(),
            policy: RetentionPolicy::default(),
        }
    }
}

impl<L: Clone + PartialEq + std::fmt::Debug> MapAdapter<L> {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            live: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// One reconciliation pass. Engine failures are logged and reported, never returned.
    pub fn reconcile<E>(&mut self, registry: &LayerRegistry, engine: &mut E) -> ReconcileReport
    where
        E: MapEngine<Layer = L>,
    {
        let mut report = ReconcileReport::default();

        if registry.is_empty() && self.live.is_empty() {
            debug!("[Adapter] Registry empty; nothing to reconcile");
            return report;
        }

        for (title, visible) in registry.iter() {
            match (visible, self.live.get(title).map(|l| (l.visible, l.kind))) {
                (true, None) => self.attach(title, registry, engine, &mut report),
                (true, Some((false, _))) => self.set_visible(title, true, engine, &mut report),
                (false, Some((true, OverlayKind::Feature)))
                    if self.policy == RetentionPolicy::HideFeatureLayers =>
                {
                    self.set_visible(title, false, engine, &mut report)
                }
                (false, Some((true, _))) => self.detach(title, engine, &mut report),
                // Visible and attached, or hidden and already hidden.
                _ => {}
            }
        }

        let orphans: Vec<String> = self
            .live
            .keys()
            .filter(|title| !registry.contains(title))
            .cloned()
            .collect();
        for title in orphans {
            debug!("[Adapter] '{}' is no longer registered; detaching", title);
            self.detach(&title, engine, &mut report);
        }

        if !report.is_noop() {
            info!(
                "[Adapter] Reconciled: +{} -{} shown={} hidden={} failed={}",
                report.added.len(),
                report.removed.len(),
                report.shown.len(),
                report.hidden.len(),
                report.failed.len()
            );
        }
        report
    }

    fn attach<E>(
        &mut self,
        title: &str,
        registry: &LayerRegistry,
        engine: &mut E,
        report: &mut ReconcileReport,
    ) where
        E: MapEngine<Layer = L>,
    {
        let Some(spec) = registry.lookup(title).and_then(LayerSpec::from_feature) else {
            debug!("[Adapter] '{}' has no renderable service endpoint; skipping", title);
            report.phantoms.push(title.to_string());
            return;
        };

        // Recorded only once both calls succeed, so a failure leaves nothing behind.
        let attached = match engine.create_layer(&spec) {
            Ok(layer) => match engine.add_layer(&layer) {
                Ok(()) => Ok(layer),
                Err(e) => {
                    engine.discard_layer(layer);
                    Err(e)
                }
            },
            Err(e) => Err(e),
        };

        match attached {
            Ok(layer) => {
                debug!("[Adapter] Added {:?} layer '{}' from {}", spec.kind, title, spec.url);
                self.live.insert(
                    title.to_string(),
                    LiveLayer {
                        layer,
                        kind: spec.kind,
                        visible: true,
                    },
                );
                report.added.push(title.to_string());
            }
            Err(e) => {
                error!("[Adapter] Failed to add layer '{}': {}", title, e);
                report.failed.push(title.to_string());
            }
        }
    }

    fn detach<E>(&mut self, title: &str, engine: &mut E, report: &mut ReconcileReport)
    where
        E: MapEngine<Layer = L>,
    {
        let Some(live) = self.live.get(title) else {
            return;
        };

        match engine.remove_layer(&live.layer) {
            Ok(()) => {
                self.live.remove(title);
                debug!("[Adapter] Removed layer '{}'", title);
                report.removed.push(title.to_string());
            }
            Err(e) => {
                // Kept so the next pass retries the removal.
                error!("[Adapter] Failed to remove layer '{}': {}", title, e);
                report.failed.push(title.to_string());
            }
        }
    }

    fn set_visible<E>(
        &mut self,
        title: &str,
        visible: bool,
        engine: &mut E,
        report: &mut ReconcileReport,
    ) where
        E: MapEngine<Layer = L>,
    {
        let Some(live) = self.live.get_mut(title) else {
            return;
        };

        match engine.set_layer_visible(&live.layer, visible) {
            Ok(()) => {
                live.visible = visible;
                if visible {
                    report.shown.push(title.to_string());
                } else {
                    report.hidden.push(title.to_string());
                }
            }
            Err(e) => {
                error!("[Adapter] Failed to set visibility of '{}': {}", title, e);
                report.failed.push(title.to_string());
            }
        }
    }

    /// Titles with an attached, visible instance.
    pub fn live_titles(&self) -> Vec<&str> {
        let mut titles: Vec<&str> = self
            .live
            .iter()
            .filter(|(_, l)| l.visible)
            .map(|(t, _)| t.as_str())
            .collect();
        titles.sort_unstable();
        titles
    }

    pub fn instance(&self, title: &str) -> Option<&L> {
        self.live.get(title).map(|l| &l.layer)
    }

    pub fn instance_count(&self) -> usize {
        self.live.len()
    }

    /// Detaches everything. Used on viewer teardown.
    pub fn clear<E>(&mut self, engine: &mut E)
    where
        E: MapEngine<Layer = L>,
    {
        for (title, live) in self.live.drain() {
            if let Err(e) = engine.remove_layer(&live.layer) {
                debug!("[Adapter] Layer '{}' already gone during teardown: {}", title, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basemap::BasemapSpec;
    use crate::engine::{LayerHandle, MemoryEngine};
    use crate::feature::Feature;

    const SERVICES: &str = "https://gis.example.gov/rest/services";

    fn catalog() -> Vec<Feature> {
        vec![
            Feature::with_service("Parks", format!("{SERVICES}/Parks/FeatureServer/0")),
            Feature::with_service("Zoning", format!("{SERVICES}/Zoning/MapServer/3")),
            Feature::with_service("Trees", "https://example.gov/trees.geojson"),
            Feature::with_service("Greenways", format!("{SERVICES}/Greenways/FeatureServer/1")),
        ]
    }

    fn setup(policy: RetentionPolicy) -> (LayerRegistry, MapAdapter<LayerHandle>, MemoryEngine) {
        let mut registry = LayerRegistry::new();
        registry.initialize(&catalog()).unwrap();
        (registry, MapAdapter::new(policy), MemoryEngine::new(BasemapSpec::default()))
    }

    #[test]
    fn test_initial_pass_creates_map_image_at_parent_url() {
        let (registry, mut adapter, mut engine) = setup(RetentionPolicy::Remove);

        let report = adapter.reconcile(&registry, &mut engine);
        assert_eq!(report.added, vec!["Zoning"]);
        assert_eq!(adapter.live_titles(), vec!["Zoning"]);

        let handle = adapter.instance("Zoning").unwrap();
        let layer = engine.layer(handle).unwrap();
        assert_eq!(layer.spec.kind, OverlayKind::MapImage);
        assert_eq!(layer.spec.url, format!("{SERVICES}/Zoning/MapServer"));
    }

    #[test]
    fn test_toggle_on_then_off_touches_only_that_layer() {
        let (mut registry, mut adapter, mut engine) = setup(RetentionPolicy::Remove);
        adapter.reconcile(&registry, &mut engine);
        let zoning = *adapter.instance("Zoning").unwrap();

        registry.toggle("Parks", true).unwrap();
        let report = adapter.reconcile(&registry, &mut engine);
        assert_eq!(report.added, vec!["Parks"]);
        assert!(report.removed.is_empty());
        assert_eq!(engine.layers_created, 2);

        registry.toggle("Parks", false).unwrap();
        let report = adapter.reconcile(&registry, &mut engine);
        assert_eq!(report.removed, vec!["Parks"]);
        assert!(report.added.is_empty());
        assert_eq!(engine.overlay_titles(), vec!["Zoning"]);
        assert_eq!(adapter.instance("Zoning"), Some(&zoning));
    }

    #[test]
    fn test_repeated_pass_is_idempotent() {
        let (mut registry, mut adapter, mut engine) = setup(RetentionPolicy::Remove);
        registry.toggle("Greenways", true).unwrap();
        adapter.reconcile(&registry, &mut engine);
        let created = engine.layers_created;

        registry.toggle("Greenways", true).unwrap();
        let report = adapter.reconcile(&registry, &mut engine);
        assert!(report.is_noop());
        assert_eq!(engine.layers_created, created);
    }

    #[test]
    fn test_phantom_layer_is_not_created() {
        let (mut registry, mut adapter, mut engine) = setup(RetentionPolicy::Remove);
        registry.toggle("Trees", true).unwrap();

        let report = adapter.reconcile(&registry, &mut engine);
        assert_eq!(report.phantoms, vec!["Trees"]);
        assert!(adapter.instance("Trees").is_none());
        assert!(!engine.overlay_titles().contains(&"Trees".to_string()));
    }

    #[test]
    fn test_construction_failure_leaves_no_record() {
        let (mut registry, mut adapter, mut engine) = setup(RetentionPolicy::Remove);
        engine.fail_titles.insert("Parks".to_string());
        registry.toggle("Parks", true).unwrap();

        let report = adapter.reconcile(&registry, &mut engine);
        assert_eq!(report.failed, vec!["Parks"]);
        assert!(adapter.instance("Parks").is_none());

        // Retried once the engine recovers.
        engine.fail_titles.clear();
        let report = adapter.reconcile(&registry, &mut engine);
        assert_eq!(report.added, vec!["Parks"]);
    }

    #[test]
    fn test_attach_failure_releases_created_layer() {
        let (mut registry, mut adapter, mut engine) = setup(RetentionPolicy::Remove);
        engine.fail_attach.insert("Parks".to_string());
        registry.toggle("Parks", true).unwrap();
        let held = engine.layer_count();

        for _ in 0..3 {
            let report = adapter.reconcile(&registry, &mut engine);
            assert_eq!(report.failed, vec!["Parks"]);
        }
        assert_eq!(engine.layer_count(), held);
        assert!(adapter.instance("Parks").is_none());

        engine.fail_attach.clear();
        let report = adapter.reconcile(&registry, &mut engine);
        assert_eq!(report.added, vec!["Parks"]);
        assert_eq!(engine.layer_count(), held + 1);
    }

    #[test]
    fn test_hide_policy_keeps_feature_layers_attached() {
        let (mut registry, mut adapter, mut engine) = setup(RetentionPolicy::HideFeatureLayers);
        registry.toggle("Parks", true).unwrap();
        adapter.reconcile(&registry, &mut engine);
        let created = engine.layers_created;

        registry.toggle("Parks", false).unwrap();
        registry.toggle("Zoning", false).unwrap();
        let report = adapter.reconcile(&registry, &mut engine);
        assert_eq!(report.hidden, vec!["Parks"]);
        assert_eq!(report.removed, vec!["Zoning"]);
        assert!(adapter.live_titles().is_empty());

        registry.toggle("Parks", true).unwrap();
        let report = adapter.reconcile(&registry, &mut engine);
        assert_eq!(report.shown, vec!["Parks"]);
        assert_eq!(engine.layers_created, created);
        assert_eq!(adapter.live_titles(), vec!["Parks"]);
    }

    #[test]
    fn test_reinitialize_detaches_orphans() {
        let (mut registry, mut adapter, mut engine) = setup(RetentionPolicy::Remove);
        adapter.reconcile(&registry, &mut engine);

        registry
            .initialize(&[
                Feature::with_service("Parks", format!("{SERVICES}/Parks/FeatureServer/0")),
                Feature::with_service("Schools", format!("{SERVICES}/Schools/FeatureServer/0")),
            ])
            .unwrap();
        let report = adapter.reconcile(&registry, &mut engine);

        assert_eq!(report.removed, vec!["Zoning"]);
        assert_eq!(report.added, vec!["Schools"]);
        assert_eq!(engine.overlay_titles(), vec!["Schools"]);
    }

    #[test]
    fn test_empty_registry_is_noop() {
        let registry = LayerRegistry::new();
        let mut adapter: MapAdapter<LayerHandle> = MapAdapter::default();
        let mut engine = MemoryEngine::new(BasemapSpec::default());

        assert!(adapter.reconcile(&registry, &mut engine).is_noop());
    }
}
