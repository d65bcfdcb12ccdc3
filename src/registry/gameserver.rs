//! Dedicated gameserver directory, one concurrent map partitioned by
//! application plus an index for the app-agnostic lookups.
//!
//! Removal policy is offline-flag-based, not age-based: a server is
//! purged only after an explicit `mark_offline`, never merely for going
//! quiet. Long-lived silent servers are not auto-purged at this layer.

use dashmap::DashMap;

use crate::error::CoreError;
use crate::protocol::{ApplicationId, GameserverRecord, ServerId};

struct Entry {
    record: GameserverRecord,
    offline: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GameserverFilter {
    pub map_substring: Option<String>,
    pub password_protected: Option<bool>,
    pub min_current_players: Option<u32>,
    pub max_max_players: Option<u32>,
    pub dedicated_only: bool,
    pub secure_only: bool,
}

const FIND_RESULT_CAP: usize = 100;

pub struct GameserverRegistry {
    by_app: DashMap<ApplicationId, DashMap<ServerId, Entry>>,
    app_of: DashMap<ServerId, ApplicationId>,
}

impl GameserverRegistry {
    pub fn new() -> Self {
        Self {
            by_app: DashMap::new(),
            app_of: DashMap::new(),
        }
    }

    /// Register-or-update. Replaces the existing descriptor in place and
    /// clears its offline flag — a fresh registration is evidence the
    /// server is back.
    pub fn register(&self, record: GameserverRecord) -> Result<(), CoreError> {
        if record.server_id.0 == 0 {
            return Err(CoreError::InvalidEntity("server_id must be non-zero"));
        }
        if record.application_id.0 == 0 {
            return Err(CoreError::InvalidEntity("application_id must be non-zero"));
        }

        let server_id = record.server_id;
        let application_id = record.application_id;

        if let Some(prev_app) = self.app_of.get(&server_id).map(|e| *e.value()) {
            if prev_app != application_id {
                if let Some(bucket) = self.by_app.get(&prev_app) {
                    bucket.remove(&server_id);
                }
            }
        }

        let bucket = self.by_app.entry(application_id).or_default();
        bucket.insert(
            server_id,
            Entry {
                record,
                offline: false,
            },
        );
        self.app_of.insert(server_id, application_id);
        Ok(())
    }

    /// Set the offline flag. The descriptor stays discoverable to direct
    /// lookups until the next reaper pass removes it.
    pub fn mark_offline(&self, server_id: ServerId) -> bool {
        let Some(app) = self.app_of.get(&server_id).map(|e| *e.value()) else {
            return false;
        };
        let Some(bucket) = self.by_app.get(&app) else {
            return false;
        };
        let Some(mut entry) = bucket.get_mut(&server_id) else {
            return false;
        };
        entry.offline = true;
        true
    }

    pub fn get(&self, server_id: ServerId) -> Option<GameserverRecord> {
        let app = *self.app_of.get(&server_id)?.value();
        let bucket = self.by_app.get(&app)?;
        bucket.get(&server_id).map(|entry| entry.record.clone())
    }

    /// Online servers (offline flag clear) registered for `application_id`.
    pub fn list(&self, application_id: ApplicationId) -> Vec<GameserverRecord> {
        let Some(bucket) = self.by_app.get(&application_id) else {
            return Vec::new();
        };
        bucket
            .iter()
            .filter(|entry| !entry.value().offline)
            .map(|entry| entry.value().record.clone())
            .collect()
    }

    /// Filtered server browser, truncated to [`FIND_RESULT_CAP`] results.
    pub fn find(&self, application_id: ApplicationId, filter: &GameserverFilter) -> Vec<GameserverRecord> {
        let mut results: Vec<GameserverRecord> = self
            .list(application_id)
            .into_iter()
            .filter(|record| {
                if let Some(needle) = &filter.map_substring {
                    if !record.map.to_lowercase().contains(&needle.to_lowercase()) {
                        return false;
                    }
                }
                if let Some(wanted) = filter.password_protected {
                    if record.password_protected != wanted {
                        return false;
                    }
                }
                if let Some(min) = filter.min_current_players {
                    if record.current_players < min {
                        return false;
                    }
                }
                if let Some(max) = filter.max_max_players {
                    if record.max_players > max {
                        return false;
                    }
                }
                if filter.dedicated_only && !record.dedicated {
                    return false;
                }
                if filter.secure_only && !record.secure {
                    return false;
                }
                true
            })
            .collect();
        results.truncate(FIND_RESULT_CAP);
        results
    }

    pub fn count(&self, application_id: ApplicationId) -> usize {
        self.by_app
            .get(&application_id)
            .map(|bucket| bucket.len())
            .unwrap_or(0)
    }

    /// Remove every descriptor whose offline flag is set. Age plays no
    /// part in this decision.
    pub fn reap(&self) -> Vec<ServerId> {
        let mut removed = Vec::new();

        for bucket in self.by_app.iter() {
            let offline: Vec<ServerId> = bucket
                .value()
                .iter()
                .filter(|entry| entry.value().offline)
                .map(|entry| *entry.key())
                .collect();

            for server_id in offline {
                bucket.value().remove(&server_id);
                self.app_of.remove(&server_id);
                removed.push(server_id);
            }
        }

        removed
    }
}

impl Default for GameserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
