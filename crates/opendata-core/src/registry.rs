use crate::feature::Feature;
use log::{debug, info, warn};
use std::collections::HashMap;
use thiserror::Error;

/// Position in fetch order of the one layer that starts visible.
// TODO: confirm with the product owner whether the second record is the intended default.
pub const INITIAL_VISIBLE_INDEX: usize = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Catalog is empty; keeping the previous layer set")]
    EmptyCatalog,
    #[error("Unknown layer: {0}")]
    UnknownTitle(String),
}

/// Title -> visibility and title -> feature, populated from one catalog fetch.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    order: Vec<String>,
    visibility: HashMap<String, bool>,
    features: HashMap<String, Feature>,
    revision: u64,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole registry. The new maps are built aside and swapped in
    /// together, so a reader never sees a half-populated registry.
    pub fn initialize(&mut self, features: &[Feature]) -> Result<usize, RegistryError> {
        if features.is_empty() {
            warn!("[Registry] initialize received an empty catalog; ignoring");
            return Err(RegistryError::EmptyCatalog);
        }

        let mut order = Vec::with_capacity(features.len());
        let mut visibility = HashMap::with_capacity(features.len());
        let mut lookup = HashMap::with_capacity(features.len());

        for (index, feature) in features.iter().enumerate() {
            let visible = index == INITIAL_VISIBLE_INDEX;
            if visibility.insert(feature.title.clone(), visible).is_some() {
                warn!(
                    "[Registry] Duplicate title '{}' at index {}; later record wins",
                    feature.title, index
                );
            } else {
                order.push(feature.title.clone());
            }
            lookup.insert(feature.title.clone(), feature.clone());
        }

        let count = order.len();
        *self = Self {
            order,
            visibility,
            features: lookup,
            revision: self.revision + 1,
        };

        info!(
            "[Registry] Registered {} layers ({} visible)",
            count,
            self.visible_titles().len()
        );
        Ok(count)
    }

    /// Sets one layer's visibility. Returns whether the stored value changed.
    pub fn toggle(&mut self, title: &str, value: bool) -> Result<bool, RegistryError> {
        let Some(current) = self.visibility.get_mut(title) else {
            warn!("[Registry] Ignoring toggle for unknown layer '{}'", title);
            return Err(RegistryError::UnknownTitle(title.to_string()));
        };

        if *current == value {
            debug!("[Registry] '{}' already {}", title, on_off(value));
            return Ok(false);
        }

        *current = value;
        self.revision += 1;
        debug!("[Registry] '{}' -> {}", title, on_off(value));
        Ok(true)
    }

    pub fn lookup(&self, title: &str) -> Option<&Feature> {
        self.features.get(title)
    }

    pub fn is_visible(&self, title: &str) -> Option<bool> {
        self.visibility.get(title).copied()
    }

    pub fn contains(&self, title: &str) -> bool {
        self.visibility.contains_key(title)
    }

    /// `(title, visible)` in first-fetched order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.order.iter().map(move |title| {
            let visible = self.visibility.get(title).copied().unwrap_or(false);
            (title.as_str(), visible)
        })
    }

    pub fn visible_titles(&self) -> Vec<&str> {
        self.iter()
            .filter_map(|(title, visible)| visible.then_some(title))
            .collect()
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> + '_ {
        self.order.iter().filter_map(move |title| self.features.get(title))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Bumped by every effective change; unchanged by no-op toggles.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
