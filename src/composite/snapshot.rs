//! Composite snapshots
//!
//! An immutable copy of the overlay set taken at mutation time, plus the
//! resolution bookkeeping that decides when a compositing attempt may
//! proceed. The compositor holds at most one pending snapshot; a newer one
//! replaces it wholesale, which is what makes stale resolutions harmless.

use std::collections::HashSet;

use super::overlay_set::OverlayEntry;

/// Immutable input of one compositing attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSnapshot {
    /// Monotonically increasing per compositor; last writer wins
    pub version: u64,
    /// Render-context generation the snapshot was taken in
    pub context: u64,
    /// Base image source for this context
    pub base_path: String,
    /// Overlay entries in set order
    pub entries: Vec<OverlayEntry>,
}

/// Tracks which snapshot sources have resolved or failed.
///
/// The attempt settles once every involved source (base + overlays) has an
/// outcome. Failed overlays are dropped from the surviving list; a failed
/// base sinks the whole attempt.
#[derive(Debug)]
pub struct PendingComposite {
    snapshot: CompositeSnapshot,
    resolved: HashSet<String>,
    failed: HashSet<String>,
}

impl PendingComposite {
    pub fn new(snapshot: CompositeSnapshot) -> Self {
        Self {
            snapshot,
            resolved: HashSet::new(),
            failed: HashSet::new(),
        }
    }

    pub fn snapshot(&self) -> &CompositeSnapshot {
        &self.snapshot
    }

    /// True if `path` is one of this snapshot's sources.
    pub fn involves(&self, path: &str) -> bool {
        self.snapshot.base_path == path || self.snapshot.entries.iter().any(|e| e.path == path)
    }

    /// Record a successful resolution. Unknown paths are ignored.
    pub fn note_resolved(&mut self, path: &str) {
        if self.involves(path) {
            self.failed.remove(path);
            self.resolved.insert(path.to_string());
        }
    }

    /// Record a failed resolution. Unknown paths are ignored.
    pub fn note_failed(&mut self, path: &str) {
        if self.involves(path) && !self.resolved.contains(path) {
            self.failed.insert(path.to_string());
        }
    }

    /// Every involved source has an outcome.
    pub fn is_settled(&self) -> bool {
        let outcome = |path: &str| self.resolved.contains(path) || self.failed.contains(path);
        outcome(&self.snapshot.base_path) && self.snapshot.entries.iter().all(|e| outcome(&e.path))
    }

    /// The base image resolved (only meaningful once settled).
    pub fn base_resolved(&self) -> bool {
        self.resolved.contains(&self.snapshot.base_path)
    }

    /// Entries whose textures resolved, in snapshot order.
    pub fn surviving_entries(&self) -> Vec<OverlayEntry> {
        self.snapshot
            .entries
            .iter()
            .filter(|e| self.resolved.contains(&e.path))
            .cloned()
            .collect()
    }

    /// Paths of entries dropped by load failure.
    pub fn failed_paths(&self) -> Vec<&str> {
        self.snapshot
            .entries
            .iter()
            .filter(|e| self.failed.contains(&e.path))
            .map(|e| e.path.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, f32)]) -> CompositeSnapshot {
        CompositeSnapshot {
            version: 1,
            context: 0,
            base_path: "base.jpg".to_string(),
            entries: entries
                .iter()
                .map(|(p, w)| OverlayEntry::new(*p, *w))
                .collect(),
        }
    }

    #[test]
    fn test_settles_when_all_sources_have_outcomes() {
        let mut pending = PendingComposite::new(snapshot(&[("a.jpg", 1.0), ("b.jpg", 0.5)]));
        assert!(!pending.is_settled());

        pending.note_resolved("base.jpg");
        pending.note_resolved("a.jpg");
        assert!(!pending.is_settled());

        pending.note_resolved("b.jpg");
        assert!(pending.is_settled());
        assert!(pending.base_resolved());
    }

    #[test]
    fn test_failed_entry_is_dropped_not_fatal() {
        // One failure out of three leaves a composite of exactly the other two.
        let mut pending = PendingComposite::new(snapshot(&[
            ("a.jpg", 1.0),
            ("b.jpg", 0.5),
            ("c.jpg", 0.25),
        ]));
        pending.note_resolved("base.jpg");
        pending.note_resolved("a.jpg");
        pending.note_failed("b.jpg");
        pending.note_resolved("c.jpg");

        assert!(pending.is_settled());
        let surviving: Vec<String> = pending
            .surviving_entries()
            .iter()
            .map(|e| e.path.clone())
            .collect();
        assert_eq!(surviving, vec!["a.jpg", "c.jpg"]);
        assert_eq!(pending.failed_paths(), vec!["b.jpg"]);
    }

    #[test]
    fn test_unknown_paths_are_ignored() {
        let mut pending = PendingComposite::new(snapshot(&[("a.jpg", 1.0)]));
        pending.note_resolved("stale-from-old-context.jpg");
        pending.note_failed("other.jpg");
        assert!(!pending.is_settled());
    }

    #[test]
    fn test_failed_base_settles_but_is_not_resolved() {
        let mut pending = PendingComposite::new(snapshot(&[]));
        pending.note_failed("base.jpg");
        assert!(pending.is_settled());
        assert!(!pending.base_resolved());
    }

    #[test]
    fn test_resolution_wins_over_earlier_failure_report() {
        let mut pending = PendingComposite::new(snapshot(&[("a.jpg", 1.0)]));
        pending.note_resolved("a.jpg");
        pending.note_failed("a.jpg");
        pending.note_resolved("base.jpg");
        assert_eq!(pending.surviving_entries().len(), 1);
    }
}
