//! The configuration/health singleton returned by `get_config`.

use schooldb_engine::{Fields, Timestamp};
use serde::{Deserialize, Serialize};

/// Overall store health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Health of the storage layer at the time of the check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: HealthStatus,
    /// The backend accepted a probe write
    pub storage_ok: bool,
    /// The offline queue could be read
    pub queue_ok: bool,
    /// Mutations waiting in the offline queue
    pub pending_mutations: usize,
    /// When the check ran (milliseconds since epoch)
    pub checked_at: Timestamp,
}

impl Health {
    pub(crate) fn new(
        storage_ok: bool,
        queue_ok: bool,
        pending_mutations: usize,
        checked_at: Timestamp,
    ) -> Self {
        let status = if storage_ok && queue_ok {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        Self {
            status,
            storage_ok,
            queue_ok,
            pending_mutations,
            checked_at,
        }
    }
}

/// School settings plus a health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub settings: Fields,
    pub health: Health,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_checks() {
        assert_eq!(Health::new(true, true, 3, 0).status, HealthStatus::Healthy);
        assert_eq!(Health::new(false, true, 0, 0).status, HealthStatus::Degraded);
        assert_eq!(Health::new(true, false, 0, 0).status, HealthStatus::Degraded);
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_string(&Health::new(true, true, 2, 7)).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("pendingMutations"));
    }
}
