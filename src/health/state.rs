//! Backend health snapshots.
//!
//! # Design Decisions
//! - One snapshot per backend, last write wins, no history
//! - The cache is the only source selection reads availability from
//! - A backend with no snapshot yet is unavailable

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Most recent liveness + open-state result for one backend.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub server_id: String,
    pub server_url: String,
    pub healthy: bool,
    pub server_open: bool,
    pub current_connections: usize,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub response_time_ms: u64,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl HealthSnapshot {
    /// A fresh, pessimistic snapshot stamped now.
    pub fn new(server_id: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            server_url: server_url.into(),
            healthy: false,
            server_open: false,
            current_connections: 0,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            response_time_ms: 0,
            last_checked: Utc::now(),
            error_message: None,
        }
    }

    /// Reply for a lookup of an id the registry does not know.
    pub fn not_found(server_id: impl Into<String>) -> Self {
        Self {
            error_message: Some("Server not found".to_string()),
            ..Self::new(server_id, "")
        }
    }

    pub fn is_available(&self) -> bool {
        self.healthy && self.server_open
    }
}

/// Concurrent map of backend id → latest snapshot.
#[derive(Debug, Default)]
pub struct HealthCache {
    entries: DashMap<String, HealthSnapshot>,
}

impl HealthCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the snapshot for `snapshot.server_id`.
    pub fn update(&self, snapshot: HealthSnapshot) {
        self.entries.insert(snapshot.server_id.clone(), snapshot);
    }

    pub fn get(&self, id: &str) -> Option<HealthSnapshot> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// All snapshots, ordered by server id.
    pub fn all(&self) -> Vec<HealthSnapshot> {
        let mut all: Vec<HealthSnapshot> =
            self.entries.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        all
    }

    /// Healthy and open according to the last snapshot. Unknown ids are unavailable.
    pub fn is_available(&self, id: &str) -> bool {
        self.entries
            .get(id)
            .map(|entry| entry.is_available())
            .unwrap_or(false)
    }

    pub fn remove(&self, id: &str) -> Option<HealthSnapshot> {
        self.entries.remove(id).map(|(_, snapshot)| snapshot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: &str, healthy: bool, open: bool) -> HealthSnapshot {
        HealthSnapshot {
            healthy,
            server_open: open,
            ..HealthSnapshot::new(id, format!("http://{id}"))
        }
    }

    #[test]
    fn availability_needs_both_flags() {
        let cache = HealthCache::new();
        cache.update(snapshot("a", true, true));
        cache.update(snapshot("b", true, false));
        cache.update(snapshot("c", false, true));

        assert!(cache.is_available("a"));
        assert!(!cache.is_available("b"));
        assert!(!cache.is_available("c"));
        assert!(!cache.is_available("missing"));
    }

    #[test]
    fn update_overwrites_previous_entry() {
        let cache = HealthCache::new();
        cache.update(snapshot("a", true, true));
        cache.update(snapshot("a", false, true));
        assert_eq!(cache.len(), 1);
        assert!(!cache.get("a").unwrap().healthy);
    }

    #[test]
    fn all_is_sorted_and_remove_drops_entry() {
        let cache = HealthCache::new();
        for id in ["c", "a", "b"] {
            cache.update(snapshot(id, true, true));
        }
        let ids: Vec<String> = cache.all().into_iter().map(|s| s.server_id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        assert!(cache.remove("b").is_some());
        assert!(cache.get("b").is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn serializes_camel_case_and_skips_missing_error() {
        let json = serde_json::to_value(snapshot("a", true, true)).unwrap();
        assert_eq!(json["serverId"], "a");
        assert_eq!(json["serverOpen"], true);
        assert!(json.get("errorMessage").is_none());

        let json = serde_json::to_value(HealthSnapshot::not_found("x")).unwrap();
        assert_eq!(json["errorMessage"], "Server not found");
        assert_eq!(json["healthy"], false);
    }
}
