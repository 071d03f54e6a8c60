use crate::engine::MapEngine;
use log::{debug, info};
use thiserror::Error;

pub const DEFAULT_CENTER: (f64, f64) = (-80.843127, 35.227085);
pub const DEFAULT_ZOOM: f64 = 12.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("A map view is already installed")]
    AlreadyInstalled,
    #[error("Map view not initialized")]
    NotInstalled,
}

/// The live map view: the engine plus camera state and the one-time ready signal.
#[derive(Debug)]
pub struct View<E> {
    engine: E,
    /// (lon, lat)
    pub center: (f64, f64),
    pub zoom: f64,
    ready: bool,
}

impl<E: MapEngine> View<E> {
    pub fn new(engine: E, center: (f64, f64), zoom: f64) -> Self {
        Self {
            engine,
            center,
            zoom,
            ready: false,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns `true` only the first time; later signals are ignored.
    pub fn mark_ready(&mut self) -> bool {
        if self.ready {
            debug!("[View] Duplicate ready signal ignored");
            return false;
        }
        self.ready = true;
        info!(
            "[View] Ready at center={:?} zoom={} basemap={}",
            self.center,
            self.zoom,
            self.engine.basemap().id()
        );
        true
    }
}

/// Holds the one view of a viewer. Installed once; readers borrow it.
#[derive(Debug)]
pub struct ViewSlot<E> {
    view: Option<View<E>>,
    torn_down: bool,
}

impl<E> Default for ViewSlot<E> {
    fn default() -> Self {
        Self {
            view: None,
            torn_down: false,
        }
    }
}

impl<E: MapEngine> ViewSlot<E> {
    pub fn install(&mut self, view: View<E>) -> Result<(), ViewError> {
        if self.view.is_some() || self.torn_down {
            return Err(ViewError::AlreadyInstalled);
        }
        self.view = Some(view);
        Ok(())
    }

    pub fn get(&self) -> Option<&View<E>> {
        self.view.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut View<E>> {
        self.view.as_mut()
    }

    pub fn require_mut(&mut self) -> Result<&mut View<E>, ViewError> {
        self.view.as_mut().ok_or(ViewError::NotInstalled)
    }

    pub fn is_installed(&self) -> bool {
        self.view.is_some()
    }

    /// Releases the view. The slot cannot be reused afterwards.
    pub fn teardown(&mut self) -> Option<View<E>> {
        self.torn_down = true;
        self.view.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basemap::BasemapSpec;
    use crate::engine::MemoryEngine;

    fn view() -> View<MemoryEngine> {
        View::new(MemoryEngine::new(BasemapSpec::default()), DEFAULT_CENTER, DEFAULT_ZOOM)
    }

    #[test]
    fn test_install_once() {
        let mut slot = ViewSlot::default();
        assert!(slot.install(view()).is_ok());
        assert_eq!(slot.install(view()), Err(ViewError::AlreadyInstalled));
    }

    #[test]
    fn test_no_reinstall_after_teardown() {
        let mut slot = ViewSlot::default();
        slot.install(view()).unwrap();
        assert!(slot.teardown().is_some());
        assert!(!slot.is_installed());
        assert_eq!(slot.install(view()), Err(ViewError::AlreadyInstalled));
    }

    #[test]
    fn test_ready_fires_once() {
        let mut v = view();
        assert!(!v.is_ready());
        assert!(v.mark_ready());
        assert!(!v.mark_ready());
        assert!(v.is_ready());
    }
}
