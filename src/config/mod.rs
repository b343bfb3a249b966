// Configuration module for fanout-mesh
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MeshConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
///
/// `FANOUT_<BACKEND>_URL` replaces the address of an already configured backend
/// (`FANOUT_MONGODB_URL` sets the connection URI).
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<MeshConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    ConfigLoader::validate(&config).context("Invalid configuration after environment overrides")?;
    Ok(config)
}

pub(crate) fn apply_env_overrides<F>(config: &mut MeshConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let b = &mut config.backends;

    if let (Some(c), Some(url)) = (b.redis.as_mut(), lookup("FANOUT_REDIS_URL")) {
        c.url = url;
    }
    if let (Some(c), Some(url)) = (b.timescale.as_mut(), lookup("FANOUT_TIMESCALE_URL")) {
        c.url = url;
    }
    if let (Some(c), Some(url)) = (b.influx.as_mut(), lookup("FANOUT_INFLUX_URL")) {
        c.url = url;
    }
    if let (Some(c), Some(token)) = (b.influx.as_mut(), lookup("FANOUT_INFLUX_TOKEN")) {
        c.token = Some(token);
    }
    if let (Some(c), Some(url)) = (b.neo4j.as_mut(), lookup("FANOUT_NEO4J_URL")) {
        c.url = url;
    }
    if let (Some(c), Some(url)) = (b.clickhouse.as_mut(), lookup("FANOUT_CLICKHOUSE_URL")) {
        c.url = url;
    }
    if let (Some(c), Some(url)) = (b.qdrant.as_mut(), lookup("FANOUT_QDRANT_URL")) {
        c.url = url;
    }
    if let (Some(c), Some(url)) = (b.postgres.as_mut(), lookup("FANOUT_POSTGRES_URL")) {
        c.url = url;
    }
    if let (Some(c), Some(uri)) = (b.mongodb.as_mut(), lookup("FANOUT_MONGODB_URL")) {
        c.uri = uri;
    }
    if let (Some(c), Some(url)) = (b.elasticsearch.as_mut(), lookup("FANOUT_ELASTICSEARCH_URL")) {
        c.url = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides_only_touch_configured_backends() {
        let mut config = MeshConfig::default();
        config.backends.redis = Some(RedisConfig::default());

        let env: HashMap<&str, &str> = [
            ("FANOUT_REDIS_URL", "redis://cache:6380"),
            ("FANOUT_CLICKHOUSE_URL", "http://olap:8123"),
        ]
        .into_iter()
        .collect();

        apply_env_overrides(&mut config, |name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.backends.redis.unwrap().url, "redis://cache:6380");
        assert!(config.backends.clickhouse.is_none());
    }
}
