use std::{fs::read_to_string, sync::Arc};

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use tally::{BadgeThresholds, default_thresholds};
use tracing::info;

use super::{config::Config, database::init_redis};

pub struct AppState {
    pub config: Config,
    pub redis_connection: ConnectionManager,
    pub thresholds: BadgeThresholds,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>> {
        let config = Config::load()?;

        let thresholds = load_thresholds(config.badge_criteria_path.as_deref())?;
        info!("Badge policy: {:?}", config.badge_policy);

        let redis_connection = init_redis(&config.redis_url, config.redis_password.as_deref())
            .await
            .context("Failed to connect to Redis")?;

        Ok(Arc::new(Self {
            config,
            redis_connection,
            thresholds,
        }))
    }

    /// Handlers get their own handle, the manager multiplexes underneath.
    pub fn connection(&self) -> ConnectionManager {
        self.redis_connection.clone()
    }
}

pub fn load_thresholds(path: Option<&str>) -> Result<BadgeThresholds> {
    let Some(path) = path else {
        info!("Using default badge criteria");
        return Ok(default_thresholds());
    };

    let json = read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let thresholds = BadgeThresholds::from_json(&json)?;

    info!("Loaded badge criteria from {path}");

    Ok(thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        assert_eq!(load_thresholds(None).unwrap(), default_thresholds());
    }

    #[test]
    fn test_thresholds_from_file() {
        let path = std::env::temp_dir().join("overflow-badge-criteria.json");
        std::fs::write(&path, r#"{ "TOTAL_VIEWS": { "BRONZE": 5 } }"#).unwrap();

        let thresholds = load_thresholds(path.to_str()).unwrap();
        assert!(thresholds.tiers(tally::CriterionKind::TotalViews).is_some());
        assert!(thresholds.tiers(tally::CriterionKind::AnswerCount).is_none());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        assert!(load_thresholds(Some("/nonexistent/criteria.json")).is_err());
    }
}
