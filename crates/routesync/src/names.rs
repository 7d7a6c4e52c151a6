//! Display names for opaque foreign keys.
//!
//! The cache is additive for the lifetime of its owner: names are assumed not
//! to change during a session, so nothing is ever evicted or expired.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::trace;

use crate::record::id_suffix;
use crate::remote::RemoteRecord;

/// Name returned for ids the cache has never seen.
pub const UNKNOWN_NAME: &str = "Unknown";

/// In-memory mapping from model and route ids to display names.
#[derive(Debug, Default)]
pub struct NameResolutionCache {
    models: RwLock<HashMap<String, String>>,
    routes: RwLock<HashMap<String, String>>,
}

impl NameResolutionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of a model, or [`UNKNOWN_NAME`].
    #[must_use]
    pub fn resolve_model_name(&self, id: &str) -> String {
        lookup(&self.models, id)
    }

    /// Name of a route, or [`UNKNOWN_NAME`].
    #[must_use]
    pub fn resolve_route_name(&self, id: &str) -> String {
        lookup(&self.routes, id)
    }

    /// Whether the route id has a known name.
    #[must_use]
    pub fn is_known_route(&self, id: &str) -> bool {
        self.resolve_route_name(id) != UNKNOWN_NAME
    }

    /// Merge names observed in a remote listing.
    ///
    /// Models without a name get `Model #<suffix>`; routes without a name are
    /// skipped so they keep resolving to [`UNKNOWN_NAME`].
    pub fn ingest(&self, records: &[RemoteRecord]) {
        let mut models = Vec::new();
        let mut routes = Vec::new();
        for record in records {
            if let Some(model) = &record.model {
                let name = model
                    .name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| format!("Model #{}", id_suffix(&model.id)));
                models.push((model.id.clone(), name));
            }
            if let Some(route) = &record.route {
                if let Some(name) = route.name.clone().filter(|n| !n.trim().is_empty()) {
                    routes.push((route.id.clone(), name));
                }
            }
        }
        trace!(
            "Ingesting {} model names and {} route names",
            models.len(),
            routes.len()
        );
        merge(&self.models, models);
        merge(&self.routes, routes);
    }

    /// Record a route name learned outside a remote listing.
    pub fn insert_route_name(&self, id: impl Into<String>, name: impl Into<String>) {
        merge(&self.routes, [(id.into(), name.into())]);
    }

    /// Number of known model and route names.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        (count(&self.models), count(&self.routes))
    }

    /// Whether no names are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts() == (0, 0)
    }
}

fn lookup(map: &RwLock<HashMap<String, String>>, id: &str) -> String {
    let map = map.read().unwrap_or_else(std::sync::PoisonError::into_inner);
    map.get(id)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

fn merge(
    map: &RwLock<HashMap<String, String>>,
    entries: impl IntoIterator<Item = (String, String)>,
) {
    let mut map = map.write().unwrap_or_else(std::sync::PoisonError::into_inner);
    map.extend(entries);
}

fn count(map: &RwLock<HashMap<String, String>>) -> usize {
    map.read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{RemoteModel, RemoteRoute};
    use serde_json::Value;

    fn remote(model: Option<(&str, Option<&str>)>, route: Option<(&str, Option<&str>)>) -> RemoteRecord {
        RemoteRecord {
            remote_record_id: "srv".to_string(),
            model: model.map(|(id, name)| RemoteModel {
                id: id.to_string(),
                name: name.map(str::to_string),
                crag_id: None,
            }),
            route: route.map(|(id, name)| RemoteRoute {
                id: id.to_string(),
                name: name.map(str::to_string),
            }),
            payload: Value::Null,
            created_at: None,
        }
    }

    #[test]
    fn test_unknown_sentinel() {
        let cache = NameResolutionCache::new();
        assert_eq!(cache.resolve_model_name("m1"), UNKNOWN_NAME);
        assert_eq!(cache.resolve_route_name("r1"), UNKNOWN_NAME);
        assert!(!cache.is_known_route("r1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ingest_names() {
        let cache = NameResolutionCache::new();
        cache.ingest(&[remote(
            Some(("m1", Some("North Face"))),
            Some(("r9", Some("Slab Direct"))),
        )]);

        assert_eq!(cache.resolve_model_name("m1"), "North Face");
        assert_eq!(cache.resolve_route_name("r9"), "Slab Direct");
        assert!(cache.is_known_route("r9"));
        assert_eq!(cache.counts(), (1, 1));
    }

    #[test]
    fn test_ingest_fallbacks() {
        let cache = NameResolutionCache::new();
        cache.ingest(&[remote(Some(("model-abcdef123456", None)), Some(("r2", None)))]);

        assert_eq!(cache.resolve_model_name("model-abcdef123456"), "Model #123456");
        assert_eq!(cache.resolve_route_name("r2"), UNKNOWN_NAME);
    }

    #[test]
    fn test_ingest_is_additive() {
        let cache = NameResolutionCache::new();
        cache.ingest(&[remote(None, Some(("r1", Some("Arete"))))]);
        cache.ingest(&[remote(None, Some(("r2", Some("Crack"))))]);
        cache.ingest(&[]);

        assert_eq!(cache.resolve_route_name("r1"), "Arete");
        assert_eq!(cache.resolve_route_name("r2"), "Crack");
    }

    #[test]
    fn test_insert_route_name() {
        let cache = NameResolutionCache::new();
        cache.insert_route_name("r9", "Slab Direct");
        assert!(cache.is_known_route("r9"));
    }
}
