use opendata_core::adapter::{MapAdapter, RetentionPolicy};
use opendata_core::basemap::{find_basemap, BasemapSpec, BasemapSwitcher};
use opendata_core::engine::{LayerHandle, MapEngine, MemoryEngine, OverlayKind};
use opendata_core::view::{View, DEFAULT_CENTER, DEFAULT_ZOOM};
use opendata_core::viewer::ViewerOptions;
use opendata_core::widgets::WidgetKind;
use opendata_core::{Feature, LayerRegistry, RegistryError, Viewer, ViewerEvent};
use std::collections::BTreeSet;

const SERVICES: &str = "https://gis.example.gov/rest/services";

fn catalog() -> Vec<Feature> {
    vec![
        Feature::with_service("Parks", format!("{SERVICES}/Parks/FeatureServer/0")),
        Feature::with_service("Zoning", format!("{SERVICES}/Zoning/MapServer/3")),
        Feature::with_service("Greenways", format!("{SERVICES}/Greenways/FeatureServer/1")),
        Feature::with_service("Floodplain", format!("{SERVICES}/Flood/MapServer")),
        Feature::with_service("Elevation", format!("{SERVICES}/Elevation/ImageServer")),
        Feature::new("Permits"),
    ]
}

/// Titles the map should hold: visible and backed by an overlay service.
fn expected_live(registry: &LayerRegistry) -> BTreeSet<String> {
    registry
        .features()
        .filter(|f| registry.is_visible(&f.title) == Some(true))
        .filter(|f| opendata_core::engine::LayerSpec::from_feature(f).is_some())
        .map(|f| f.title.clone())
        .collect()
}

fn attached(engine: &MemoryEngine) -> BTreeSet<String> {
    engine.overlay_titles().into_iter().collect()
}

#[test]
fn test_scenario_a_initial_visible_map_image() {
    let mut registry = LayerRegistry::new();
    registry.initialize(&catalog()[..2]).unwrap();
    let mut engine = MemoryEngine::new(BasemapSpec::default());
    let mut adapter = MapAdapter::new(RetentionPolicy::Remove);

    adapter.reconcile(&registry, &mut engine);

    assert_eq!(registry.is_visible("Parks"), Some(false));
    assert_eq!(registry.is_visible("Zoning"), Some(true));
    let overlays = engine.overlays();
    assert_eq!(overlays.len(), 1);
    let layer = engine.layer(&overlays[0]).unwrap();
    assert_eq!(layer.spec.kind, OverlayKind::MapImage);
    assert_eq!(layer.spec.url, format!("{SERVICES}/Zoning/MapServer"));
}

#[test]
fn test_scenario_b_feature_layer_on_then_off() {
    let mut registry = LayerRegistry::new();
    registry.initialize(&catalog()[..2]).unwrap();
    let mut engine = MemoryEngine::new(BasemapSpec::default());
    let mut adapter = MapAdapter::new(RetentionPolicy::Remove);
    adapter.reconcile(&registry, &mut engine);
    let zoning: LayerHandle = adapter.instance("Zoning").copied().unwrap();

    registry.toggle("Parks", true).unwrap();
    let report = adapter.reconcile(&registry, &mut engine);
    assert_eq!(report.added, vec!["Parks"]);
    assert_eq!(engine.layers_created, 2);

    let parks = *adapter.instance("Parks").unwrap();
    let layer = engine.layer(&parks).unwrap();
    assert_eq!(layer.spec.kind, OverlayKind::Feature);
    assert_eq!(layer.spec.out_fields, vec!["*"]);
    assert!(layer.spec.popup.is_some());

    registry.toggle("Parks", false).unwrap();
    let report = adapter.reconcile(&registry, &mut engine);
    assert_eq!(report.removed, vec!["Parks"]);
    assert_eq!(engine.overlays(), vec![zoning]);
}

#[test]
fn test_live_set_tracks_any_toggle_sequence() {
    let features = catalog();
    let mut registry = LayerRegistry::new();
    registry.initialize(&features).unwrap();
    let mut engine = MemoryEngine::new(BasemapSpec::default());
    let mut adapter = MapAdapter::new(RetentionPolicy::Remove);
    adapter.reconcile(&registry, &mut engine);

    // Deterministic walk over (title, value) pairs.
    let mut seed: u64 = 0x5eed;
    for step in 0..200 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let title = &features[(seed >> 33) as usize % features.len()].title;
        let value = (seed >> 17) & 1 == 1;

        registry.toggle(title, value).unwrap();
        adapter.reconcile(&registry, &mut engine);

        assert_eq!(
            attached(&engine),
            expected_live(&registry),
            "diverged at step {step} after {title} -> {value}"
        );
    }
}

#[test]
fn test_same_value_toggle_causes_no_churn() {
    let mut registry = LayerRegistry::new();
    registry.initialize(&catalog()).unwrap();
    let mut engine = MemoryEngine::new(BasemapSpec::default());
    let mut adapter = MapAdapter::new(RetentionPolicy::Remove);
    adapter.reconcile(&registry, &mut engine);
    let created = engine.layers_created;

    assert_eq!(registry.toggle("Zoning", true), Ok(false));
    let report = adapter.reconcile(&registry, &mut engine);

    assert!(report.is_noop());
    assert_eq!(engine.layers_created, created);
    assert_eq!(engine.layers_removed, 0);
}

#[test]
fn test_initialize_reflects_defaults() {
    let features = catalog();
    let mut registry = LayerRegistry::new();
    assert_eq!(registry.initialize(&features), Ok(features.len()));

    for (index, feature) in features.iter().enumerate() {
        assert_eq!(registry.is_visible(&feature.title), Some(index == 1));
        assert_eq!(registry.lookup(&feature.title), Some(feature));
    }
}

#[test]
fn test_empty_initialize_keeps_state() {
    let mut registry = LayerRegistry::new();
    registry.initialize(&catalog()).unwrap();
    registry.toggle("Parks", true).unwrap();
    let revision = registry.revision();

    assert_eq!(registry.initialize(&[]), Err(RegistryError::EmptyCatalog));
    assert_eq!(registry.revision(), revision);
    assert_eq!(registry.is_visible("Parks"), Some(true));
}

#[test]
fn test_scenario_e_custom_basemap_keeps_overlays_in_order() {
    let mut registry = LayerRegistry::new();
    registry.initialize(&catalog()).unwrap();
    registry.toggle("Parks", true).unwrap();
    let mut engine = MemoryEngine::new(BasemapSpec::default());
    let mut adapter = MapAdapter::new(RetentionPolicy::Remove);
    adapter.reconcile(&registry, &mut engine);
    let before = engine.overlays();
    assert_eq!(before.len(), 2);

    let meck = find_basemap("meck-vector").unwrap();
    let report = BasemapSwitcher::switch(&mut engine, meck.id, meck.url).unwrap();

    assert_eq!(report.overlays_carried, 2);
    assert_eq!(engine.overlays(), before);
    assert_eq!(engine.basemap(), meck.spec());
    assert_eq!(engine.maps_installed, 1);

    // The adapter still owns the carried instances.
    registry.toggle("Parks", false).unwrap();
    let report = adapter.reconcile(&registry, &mut engine);
    assert_eq!(report.removed, vec!["Parks"]);
    assert_eq!(engine.overlay_titles(), vec!["Zoning"]);
}

#[test]
fn test_viewer_pipeline_with_widgets_and_bookmark() {
    let mut viewer = Viewer::new(ViewerOptions::default());
    viewer
        .install_view(View::new(
            MemoryEngine::new(BasemapSpec::default()),
            DEFAULT_CENTER,
            DEFAULT_ZOOM,
        ))
        .unwrap();

    viewer.dispatch(ViewerEvent::ActivateWidget(WidgetKind::Bookmarks));
    let token = viewer.begin_catalog_load();
    viewer.dispatch(ViewerEvent::CatalogLoaded {
        token,
        features: catalog(),
    });
    viewer.dispatch(ViewerEvent::ToggleLayer {
        title: "Greenways".to_string(),
        visible: true,
    });
    viewer.dispatch(ViewerEvent::ToggleLayer {
        title: "Nope".to_string(),
        visible: true,
    });
    let report = viewer.drain();

    assert_eq!(report.reconcile_passes, 1);
    assert_eq!(report.rejected.len(), 1);
    assert!(!viewer.widget_active(WidgetKind::Bookmarks));

    viewer.dispatch(ViewerEvent::ViewReady);
    viewer.dispatch(ViewerEvent::SelectBookmark("Freedom Park".to_string()));
    let report = viewer.drain();
    assert!(report.rejected.is_empty());
    assert!(viewer.widget_active(WidgetKind::Bookmarks));

    let engine = viewer.view().unwrap().engine();
    let first = engine.overlays()[0];
    let effect = engine.layer(&first).unwrap().effect.clone().unwrap();
    assert_eq!(effect.filter.where_clause, "Name = 'FREEDOM PARK'");

    let view = viewer.teardown().unwrap();
    assert!(view.engine().overlay_titles().is_empty());
    assert!(view.engine().mounted_widgets().is_empty());
}
