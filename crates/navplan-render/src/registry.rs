//! Bookkeeping of the canvas resources a synchronizer has created.

use crate::canvas::ResourceKind;
use std::collections::BTreeSet;

/// Identifiers created on the canvas, per kind. Owned by one synchronizer.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    sources: BTreeSet<String>,
    /// Creation order, so teardown can remove top layers first.
    layers: Vec<String>,
    markers: BTreeSet<String>,
}

/// Point-in-time copy of a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub sources: Vec<String>,
    pub layers: Vec<String>,
    pub markers: Vec<String>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.sources.len() + self.layers.len() + self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, kind: ResourceKind, id: &str) {
        match kind {
            ResourceKind::Source => {
                self.sources.insert(id.to_string());
            }
            ResourceKind::Layer => {
                if !self.layers.iter().any(|l| l == id) {
                    self.layers.push(id.to_string());
                }
            }
            ResourceKind::Marker => {
                self.markers.insert(id.to_string());
            }
        }
    }

    pub fn contains(&self, kind: ResourceKind, id: &str) -> bool {
        match kind {
            ResourceKind::Source => self.sources.contains(id),
            ResourceKind::Layer => self.layers.iter().any(|l| l == id),
            ResourceKind::Marker => self.markers.contains(id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.layers.is_empty() && self.markers.is_empty()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            sources: self.sources.iter().cloned().collect(),
            layers: self.layers.clone(),
            markers: self.markers.iter().cloned().collect(),
        }
    }

    /// Empty the registry, returning what it held.
    pub(crate) fn drain(&mut self) -> RegistrySnapshot {
        let snapshot = self.snapshot();
        *self = Self::default();
        snapshot
    }
}
