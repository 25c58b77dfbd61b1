use std::collections::HashMap;

use crate::models::endpoint::Endpoint;

/// Per-peer bookkeeping: discovered, pending and established endpoints.
///
/// An id is in at most one of `pending` and `established`. `discovered` is
/// an independent cache cleared at the start of every discovery pass.
/// Not synchronized; owned by a single dispatch thread.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    discovered: HashMap<String, Endpoint>,
    pending: HashMap<String, Endpoint>,
    established: HashMap<String, Endpoint>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discovered(&self) -> &HashMap<String, Endpoint> {
        &self.discovered
    }

    pub fn pending(&self) -> &HashMap<String, Endpoint> {
        &self.pending
    }

    pub fn established(&self) -> &HashMap<String, Endpoint> {
        &self.established
    }

    pub fn mark_discovered(&mut self, endpoint: Endpoint) {
        self.discovered.insert(endpoint.id().to_string(), endpoint);
    }

    pub fn clear_discovered(&mut self) {
        self.discovered.clear();
    }

    pub fn find_discovered(&self, id: &str) -> Option<&Endpoint> {
        self.discovered.get(id)
    }

    /// Record a proposed connection. A stale established entry for the same
    /// id is dropped so the id lives in one set only.
    pub fn add_pending(&mut self, endpoint: Endpoint) {
        if self.established.remove(endpoint.id()).is_some() {
            log::warn!("Connection initiated by already established {}", endpoint);
        }
        self.pending.insert(endpoint.id().to_string(), endpoint);
    }

    pub fn take_pending(&mut self, id: &str) -> Option<Endpoint> {
        self.pending.remove(id)
    }

    /// Move `endpoint` into the established set, removing any pending entry.
    pub fn establish(&mut self, endpoint: Endpoint) {
        self.pending.remove(endpoint.id());
        self.established.insert(endpoint.id().to_string(), endpoint);
    }

    pub fn remove_established(&mut self, id: &str) -> Option<Endpoint> {
        self.established.remove(id)
    }

    pub fn is_established(&self, id: &str) -> bool {
        self.established.contains_key(id)
    }

    pub fn established_endpoint(&self, id: &str) -> Option<&Endpoint> {
        self.established.get(id)
    }

    /// Snapshot of established ids, safe to iterate while mutating.
    pub fn established_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.established.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn clear_established(&mut self) {
        self.established.clear();
    }

    pub fn clear(&mut self) {
        self.discovered.clear();
        self.pending.clear();
        self.established.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.discovered.is_empty() && self.pending.is_empty() && self.established.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(id: &str) -> Endpoint {
        Endpoint::new(id, format!("peer-{}", id))
    }

    fn assert_disjoint(registry: &EndpointRegistry) {
        for id in registry.pending().keys() {
            assert!(!registry.is_established(id), "{} in both sets", id);
        }
    }

    #[test]
    fn pending_then_established() {
        let mut registry = EndpointRegistry::new();
        registry.add_pending(ep("a"));
        assert!(registry.pending().contains_key("a"));

        let endpoint = registry.take_pending("a").unwrap();
        registry.establish(endpoint);

        assert!(registry.pending().is_empty());
        assert!(registry.is_established("a"));
    }

    #[test]
    fn initiated_again_while_established_moves_back_to_pending() {
        let mut registry = EndpointRegistry::new();
        registry.establish(ep("a"));
        registry.add_pending(ep("a"));

        assert!(!registry.is_established("a"));
        assert!(registry.pending().contains_key("a"));
    }

    #[test]
    fn sets_stay_disjoint_over_mixed_sequence() {
        let mut registry = EndpointRegistry::new();
        let steps: &[(&str, &str)] = &[
            ("discover", "a"),
            ("pending", "a"),
            ("pending", "b"),
            ("establish", "a"),
            ("pending", "a"),
            ("establish", "b"),
            ("remove", "b"),
            ("establish", "a"),
            ("pending", "c"),
            ("remove", "zz"),
            ("establish", "c"),
        ];
        for (op, id) in steps {
            match *op {
                "discover" => registry.mark_discovered(ep(id)),
                "pending" => registry.add_pending(ep(id)),
                "establish" => {
                    let endpoint = registry.take_pending(id).unwrap_or_else(|| ep(id));
                    registry.establish(endpoint);
                }
                "remove" => {
                    registry.remove_established(id);
                }
                _ => unreachable!(),
            }
            assert_disjoint(&registry);
        }
        assert_eq!(registry.established_ids(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut registry = EndpointRegistry::new();
        registry.mark_discovered(ep("a"));
        registry.add_pending(ep("b"));
        registry.establish(ep("c"));

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn discovered_is_independent() {
        let mut registry = EndpointRegistry::new();
        registry.mark_discovered(ep("a"));
        registry.establish(ep("a"));

        assert!(registry.find_discovered("a").is_some());
        registry.clear_discovered();
        assert!(registry.is_established("a"));
        assert!(registry.find_discovered("a").is_none());
    }
}
