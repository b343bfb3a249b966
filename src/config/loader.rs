// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MeshConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        Self::parse(&content)
    }

    /// Parse configuration text (after substitution) and validate it
    pub fn parse(content: &str) -> Result<MeshConfig> {
        let content = Self::substitute_env_vars(content);

        let config: MeshConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${REDIS_PASSWORD:-redispw} -> redispw (if REDIS_PASSWORD not set)
    pub(crate) fn substitute_env_vars(content: &str) -> String {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env substitution pattern is valid")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        })
        .to_string()
    }

    /// Validate configuration
    pub fn validate(config: &MeshConfig) -> Result<()> {
        if config.mesh.backend_timeout_ms == 0 {
            bail!("mesh.backend_timeout_ms must be > 0");
        }

        if config.mesh.default_query_limit == 0 {
            bail!("mesh.default_query_limit must be > 0");
        }

        let backends = &config.backends;
        if backends.enabled().is_empty() {
            bail!("at least one backend must be configured under 'backends'");
        }

        if let Some(redis) = &backends.redis {
            Self::require_scheme("redis.url", &redis.url, &["redis://", "rediss://"])?;
        }
        if let Some(ts) = &backends.timescale {
            Self::require_scheme("timescale.url", &ts.url, &["postgres://", "postgresql://"])?;
            Self::require_identifier("timescale.table", &ts.table)?;
            if ts.max_connections == 0 {
                bail!("timescale.max_connections must be > 0");
            }
        }
        if let Some(influx) = &backends.influx {
            Self::require_http("influx.url", &influx.url)?;
            if influx.org.is_empty() || influx.bucket.is_empty() {
                bail!("influx.org and influx.bucket cannot be empty");
            }
        }
        if let Some(neo4j) = &backends.neo4j {
            Self::require_http("neo4j.url", &neo4j.url)?;
        }
        if let Some(ch) = &backends.clickhouse {
            Self::require_http("clickhouse.url", &ch.url)?;
            Self::require_identifier("clickhouse.database", &ch.database)?;
            Self::require_identifier("clickhouse.table", &ch.table)?;
        }
        if let Some(qdrant) = &backends.qdrant {
            Self::require_http("qdrant.url", &qdrant.url)?;
            if qdrant.collection.is_empty() {
                bail!("qdrant.collection cannot be empty");
            }
            if qdrant.placeholder_vector.is_empty() {
                bail!("qdrant.placeholder_vector cannot be empty");
            }
        }
        if let Some(pg) = &backends.postgres {
            Self::require_scheme("postgres.url", &pg.url, &["postgres://", "postgresql://"])?;
            Self::require_identifier("postgres.table", &pg.table)?;
            if pg.max_connections == 0 {
                bail!("postgres.max_connections must be > 0");
            }
        }
        if let Some(mongo) = &backends.mongodb {
            Self::require_scheme("mongodb.uri", &mongo.uri, &["mongodb://", "mongodb+srv://"])?;
            if mongo.database.is_empty() || mongo.collection.is_empty() {
                bail!("mongodb.database and mongodb.collection cannot be empty");
            }
        }
        if let Some(es) = &backends.elasticsearch {
            Self::require_http("elasticsearch.url", &es.url)?;
            if es.index.is_empty() {
                bail!("elasticsearch.index cannot be empty");
            }
        }

        if config.smoke.iterations == 0 {
            bail!("smoke.iterations must be > 0");
        }
        if !(config.smoke.min_success_ratio > 0.0 && config.smoke.min_success_ratio <= 1.0) {
            bail!("smoke.min_success_ratio must be in (0, 1]");
        }

        match config.logging.format.as_str() {
            "text" | "json" => {}
            other => bail!("Unknown logging.format: '{}'. Supported: text, json", other),
        }

        Ok(())
    }

    fn require_scheme(field: &str, url: &str, schemes: &[&str]) -> Result<()> {
        if url.is_empty() {
            bail!("{} cannot be empty", field);
        }
        if !schemes.iter().any(|s| url.starts_with(s)) {
            bail!("{} must start with one of {:?}, got '{}'", field, schemes, url);
        }
        Ok(())
    }

    fn require_http(field: &str, url: &str) -> Result<()> {
        Self::require_scheme(field, url, &["http://", "https://"])
    }

    /// Table and database names end up in SQL text, so only plain identifiers are allowed
    fn require_identifier(field: &str, name: &str) -> Result<()> {
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !name.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            bail!("{} must be a plain identifier, got '{}'", field, name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> MeshConfig {
        MeshConfig {
            backends: BackendsConfig {
                prometheus: Some(PrometheusConfig::default()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("FANOUT_LOADER_TEST_VAR", "test_value");

        let input = "url: ${FANOUT_LOADER_TEST_VAR}";
        let output = ConfigLoader::substitute_env_vars(input);
        assert_eq!(output, "url: test_value");

        std::env::remove_var("FANOUT_LOADER_TEST_VAR");
    }

    #[test]
    fn test_env_var_with_default() {
        std::env::remove_var("FANOUT_LOADER_TEST_VAR2");

        let input = "password: ${FANOUT_LOADER_TEST_VAR2:-redispw}";
        let output = ConfigLoader::substitute_env_vars(input);
        assert_eq!(output, "password: redispw");
    }

    #[test]
    fn test_env_var_without_default_is_kept() {
        std::env::remove_var("FANOUT_LOADER_TEST_VAR3");

        let output = ConfigLoader::substitute_env_vars("token: ${FANOUT_LOADER_TEST_VAR3}");
        assert_eq!(output, "token: ${FANOUT_LOADER_TEST_VAR3}");
    }

    #[test]
    fn test_validation_requires_a_backend() {
        let config = MeshConfig::default();
        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least one backend"));
    }

    #[test]
    fn test_validation_accepts_all_local_defaults() {
        let mut config = minimal();
        config.backends = BackendsConfig::all_local();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = minimal();
        config.mesh.backend_timeout_ms = 0;

        let result = ConfigLoader::validate(&config);
        assert!(result.unwrap_err().to_string().contains("backend_timeout_ms"));
    }

    #[test]
    fn test_validation_rejects_sql_in_table_name() {
        let mut config = minimal();
        config.backends.clickhouse = Some(ClickHouseConfig {
            table: "events; DROP TABLE x".to_string(),
            ..Default::default()
        });

        let result = ConfigLoader::validate(&config);
        assert!(result.unwrap_err().to_string().contains("clickhouse.table"));
    }

    #[test]
    fn test_validation_rejects_wrong_scheme() {
        let mut config = minimal();
        config.backends.redis = Some(RedisConfig {
            url: "http://localhost:6379".to_string(),
        });

        let result = ConfigLoader::validate(&config);
        assert!(result.unwrap_err().to_string().contains("redis.url"));
    }

    #[test]
    fn test_validation_rejects_empty_vector() {
        let mut config = minimal();
        config.backends.qdrant = Some(QdrantConfig {
            placeholder_vector: vec![],
            ..Default::default()
        });

        let result = ConfigLoader::validate(&config);
        assert!(result.unwrap_err().to_string().contains("placeholder_vector"));
    }
}
