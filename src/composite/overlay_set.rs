//! Active overlay membership
//!
//! The ordered set of overlay images currently composited onto the target
//! surface. Insertion order assigns texture-unit indices, so it is stable
//! for the lifetime of an entry.

use serde::{Deserialize, Serialize};

/// One active overlay: image source plus its blend weight.
///
/// The path (or data URI) is the identity key within the set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayEntry {
    pub path: String,
    /// Scalar multiplier applied to this overlay's samples
    pub weight: f32,
}

impl OverlayEntry {
    pub fn new(path: impl Into<String>, weight: f32) -> Self {
        Self {
            path: path.into(),
            weight,
        }
    }
}

/// Outcome of a toggle, for callers that log or react to direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

/// Ordered collection of active overlays with idempotent toggle semantics.
///
/// Membership is the only state: toggling a present path removes it,
/// toggling an absent path appends it. Toggling the same path twice is a
/// no-op pair.
#[derive(Debug, Clone, Default)]
pub struct OverlaySet {
    entries: Vec<OverlayEntry>,
}

impl OverlaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle membership of `path`. Total; never fails.
    pub fn toggle(&mut self, path: &str, weight: f32) -> Toggle {
        if let Some(pos) = self.entries.iter().position(|e| e.path == path) {
            self.entries.remove(pos);
            Toggle::Removed
        } else {
            self.entries.push(OverlayEntry::new(path, weight));
            Toggle::Added
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The live ordered sequence driving shader generation.
    pub fn entries(&self) -> &[OverlayEntry] {
        &self.entries
    }

    /// Drop every entry (context switch).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut set = OverlaySet::new();
        assert_eq!(set.toggle("a.jpg", 1.0), Toggle::Added);
        assert!(set.contains("a.jpg"));
        assert_eq!(set.toggle("a.jpg", 1.0), Toggle::Removed);
        assert!(set.is_empty());
    }

    #[test]
    fn test_toggle_scenario_keeps_only_b() {
        // toggle(a) -> toggle(b) -> toggle(a) leaves exactly {b: 0.5}
        let mut set = OverlaySet::new();
        set.toggle("a.jpg", 1.0);
        set.toggle("b.jpg", 0.5);
        set.toggle("a.jpg", 1.0);

        assert_eq!(set.len(), 1);
        assert_eq!(set.entries()[0], OverlayEntry::new("b.jpg", 0.5));
    }

    #[test]
    fn test_insertion_order_is_stable() {
        let mut set = OverlaySet::new();
        set.toggle("a.jpg", 1.0);
        set.toggle("b.jpg", 1.0);
        set.toggle("c.jpg", 1.0);
        set.toggle("b.jpg", 1.0);
        set.toggle("d.jpg", 1.0);

        let order: Vec<&str> = set.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(order, vec!["a.jpg", "c.jpg", "d.jpg"]);
    }

    #[test]
    fn test_clear() {
        let mut set = OverlaySet::new();
        set.toggle("a.jpg", 1.0);
        set.toggle("b.jpg", 1.0);
        set.clear();
        assert!(set.is_empty());
    }
}
