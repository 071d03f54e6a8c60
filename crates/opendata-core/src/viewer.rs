// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Open Data Viewer contributors

//! The viewer context: owns the registry, the view and the widgets, and applies
//! queued events to them in order.
//!
//! Everything that changes map state goes through [`Viewer::dispatch`] and is
//! applied by [`Viewer::drain`]. Any number of toggles in one drain cost a single
//! reconciliation pass.

use crate::adapter::{MapAdapter, ReconcileReport, RetentionPolicy};
use crate::basemap::{BasemapError, BasemapSwitcher, SwitchReport};
use crate::engine::MapEngine;
use crate::feature::Feature;
use crate::registry::LayerRegistry;
use crate::view::{View, ViewError, ViewSlot};
use crate::widgets::{
    print_wanted, select_bookmark, BookmarksConfig, PrintConfig, WidgetConfig, WidgetKind,
    WidgetSlot,
};
use log::{debug, error, info, warn};
use std::collections::VecDeque;

/// Identifies one catalog request so late responses can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadToken(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    CatalogLoaded { token: LoadToken, features: Vec<Feature> },
    CatalogFailed { token: LoadToken, message: String },
    ToggleLayer { title: String, visible: bool },
    SwitchBasemap { id: String, url: Option<String> },
    /// The view finished loading the last basemap; switching is allowed again.
    BasemapSettled,
    ViewReady,
    ActivateWidget(WidgetKind),
    DeactivateWidget(WidgetKind),
    /// The sidebar menu changed; the print widget lives only under the print menu.
    MenuChanged(String),
    SelectBookmark(String),
}

#[derive(Debug, Clone, Default)]
pub struct ViewerOptions {
    pub retention: RetentionPolicy,
    pub bookmarks: BookmarksConfig,
    pub print: PrintConfig,
}

#[derive(Debug, Default)]
pub struct DrainReport {
    pub events: usize,
    pub reconcile_passes: usize,
    pub reconcile: ReconcileReport,
    pub basemap: Option<SwitchReport>,
    pub dropped_switches: usize,
    /// Events that were refused, with the reason.
    pub rejected: Vec<String>,
}

pub struct Viewer<E: MapEngine> {
    registry: LayerRegistry,
    adapter: MapAdapter<E::Layer>,
    view: ViewSlot<E>,
    bookmarks: WidgetSlot<E::Widget>,
    print: WidgetSlot<E::Widget>,
    queue: VecDeque<ViewerEvent>,
    reconcile_pending: bool,
    basemap_in_flight: Option<String>,
    latest_load: u64,
    catalog_error: Option<String>,
    alive: bool,
}

impl<E: MapEngine> Viewer<E> {
    pub fn new(options: ViewerOptions) -> Self {
        Self {
            registry: LayerRegistry::new(),
            adapter: MapAdapter::new(options.retention),
            view: ViewSlot::default(),
            bookmarks: WidgetSlot::new(WidgetConfig::Bookmarks(options.bookmarks)),
            print: WidgetSlot::new(WidgetConfig::Print(options.print)),
            queue: VecDeque::new(),
            reconcile_pending: false,
            basemap_in_flight: None,
            latest_load: 0,
            catalog_error: None,
            alive: true,
        }
    }

    /// The viewer is the only writer of its view; this succeeds once.
    pub fn install_view(&mut self, view: View<E>) -> Result<(), ViewError> {
        self.view.install(view)?;
        self.reconcile_pending = true;
        Ok(())
    }

    pub fn view(&self) -> Option<&View<E>> {
        self.view.get()
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn adapter(&self) -> &MapAdapter<E::Layer> {
        &self.adapter
    }

    pub fn widget_active(&self, kind: WidgetKind) -> bool {
        match kind {
            WidgetKind::Bookmarks => self.bookmarks.is_active(),
            WidgetKind::Print => self.print.is_active(),
        }
    }

    pub fn widget(&self, kind: WidgetKind) -> &WidgetSlot<E::Widget> {
        match kind {
            WidgetKind::Bookmarks => &self.bookmarks,
            WidgetKind::Print => &self.print,
        }
    }

    pub fn catalog_error(&self) -> Option<&str> {
        self.catalog_error.as_deref()
    }

    pub fn is_switching_basemap(&self) -> bool {
        self.basemap_in_flight.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Starts a catalog request. Only the newest token's result is applied.
    pub fn begin_catalog_load(&mut self) -> LoadToken {
        self.latest_load += 1;
        LoadToken(self.latest_load)
    }

    pub fn dispatch(&mut self, event: ViewerEvent) {
        if !self.alive {
            debug!("[Viewer] Dropping {:?} after teardown", event);
            return;
        }
        self.queue.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Applies every queued event, then reconciles at most once.
    pub fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();

        while let Some(event) = self.queue.pop_front() {
            report.events += 1;
            self.apply(event, &mut report);
        }
        self.flush(&mut report);

        report
    }

    fn apply(&mut self, event: ViewerEvent, report: &mut DrainReport) {
        match event {
            ViewerEvent::CatalogLoaded { token, features } => {
                if !self.is_current(token) {
                    debug!("[Viewer] Discarding stale catalog response {:?}", token);
                    return;
                }
                match self.registry.initialize(&features) {
                    Ok(_) => {
                        self.catalog_error = None;
                        self.reconcile_pending = true;
                    }
                    Err(e) => report.rejected.push(e.to_string()),
                }
            }
            ViewerEvent::CatalogFailed { token, message } => {
                if !self.is_current(token) {
                    debug!("[Viewer] Discarding stale catalog failure {:?}", token);
                    return;
                }
                error!("[Viewer] Error fetching features: {}", message);
                self.catalog_error = Some(message);
            }
            ViewerEvent::ToggleLayer { title, visible } => {
                match self.registry.toggle(&title, visible) {
                    Ok(true) => self.reconcile_pending = true,
                    Ok(false) => {}
                    Err(e) => report.rejected.push(e.to_string()),
                }
            }
            ViewerEvent::SwitchBasemap { id, url } => self.switch_basemap(&id, url.as_deref(), report),
            ViewerEvent::BasemapSettled => {
                if let Some(id) = self.basemap_in_flight.take() {
                    debug!("[Viewer] Basemap '{}' settled", id);
                }
            }
            ViewerEvent::ViewReady => {
                let Some(view) = self.view.get_mut() else {
                    warn!("[Viewer] Ready signal without a view");
                    return;
                };
                if view.mark_ready() {
                    self.bookmarks.on_view_ready(view);
                    self.print.on_view_ready(view);
                }
            }
            ViewerEvent::ActivateWidget(kind) => {
                let view = self.view.get_mut();
                match kind {
                    WidgetKind::Bookmarks => self.bookmarks.activate(view),
                    WidgetKind::Print => self.print.activate(view),
                }
            }
            ViewerEvent::DeactivateWidget(kind) => {
                let view = self.view.get_mut();
                match kind {
                    WidgetKind::Bookmarks => self.bookmarks.deactivate(view),
                    WidgetKind::Print => self.print.deactivate(view),
                }
            }
            ViewerEvent::MenuChanged(menu) => {
                let view = self.view.get_mut();
                if print_wanted(&menu) {
                    self.print.activate(view);
                } else {
                    self.print.deactivate(view);
                }
            }
            ViewerEvent::SelectBookmark(name) => {
                if !self.bookmarks.is_active() {
                    report.rejected.push(format!("Bookmarks inactive; ignoring '{}'", name));
                    return;
                }
                // Effects target the overlay stack as it stands after pending toggles.
                self.flush(report);
                if let Some(view) = self.view.get_mut() {
                    if let Err(e) = select_bookmark(view.engine_mut(), &name) {
                        error!("[Viewer] Failed to apply bookmark '{}': {}", name, e);
                        report.rejected.push(e.to_string());
                    }
                }
            }
        }
    }

    fn switch_basemap(&mut self, id: &str, url: Option<&str>, report: &mut DrainReport) {
        if let Some(current) = &self.basemap_in_flight {
            warn!(
                "[Viewer] Basemap switch to '{}' dropped; '{}' still in progress",
                id, current
            );
            report.dropped_switches += 1;
            report.rejected.push(BasemapError::Busy.to_string());
            return;
        }

        // The overlay snapshot must include toggles queued ahead of the switch.
        self.flush(report);

        let Some(view) = self.view.get_mut() else {
            warn!("[Viewer] Map view not initialized");
            report.rejected.push(BasemapError::NoView.to_string());
            return;
        };

        match BasemapSwitcher::switch(view.engine_mut(), id, url) {
            Ok(switch) => {
                self.basemap_in_flight = Some(id.to_string());
                report.basemap = Some(switch);
            }
            Err(e) => report.rejected.push(e.to_string()),
        }
    }

    fn flush(&mut self, report: &mut DrainReport) {
        if !self.reconcile_pending {
            return;
        }
        let Some(view) = self.view.get_mut() else {
            debug!("[Viewer] Reconciliation deferred until a view is installed");
            return;
        };

        let pass = self.adapter.reconcile(&self.registry, view.engine_mut());
        report.reconcile.merge(pass);
        report.reconcile_passes += 1;
        self.reconcile_pending = false;
    }

    fn is_current(&self, token: LoadToken) -> bool {
        self.alive && token.0 == self.latest_load
    }

    /// Destroys widgets, detaches overlays and releases the view. Later events are ignored.
    pub fn teardown(&mut self) -> Option<View<E>> {
        if !self.alive {
            return None;
        }
        self.alive = false;
        self.queue.clear();

        let mut view = self.view.teardown();
        self.bookmarks.deactivate(view.as_mut());
        self.print.deactivate(view.as_mut());
        if let Some(view) = view.as_mut() {
            self.adapter.clear(view.engine_mut());
        }

        info!("[Viewer] Torn down");
        view
    }
}
