//! Configuration de l'application
//!
//! Fichier JSON optionnel (`--config`), puis surcharges par variables
//! d'environnement `CONQUEST_*`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use conquest::EngineConfig;

use crate::store::postgres::{validate_schema_name, DEFAULT_SCHEMA};

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Paramètres du moteur de conquête
    pub engine: EngineConfig,

    /// Schéma PostgreSQL cible
    pub schema: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Fichier éventuel, surcharges d'environnement, puis validation
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applique les variables `CONQUEST_*`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(schema) = lookup("CONQUEST_SCHEMA") {
            self.schema = schema;
        }
        if let Some(value) = parse_env(&lookup, "CONQUEST_SLIVER_AREA_M2")? {
            self.engine.sliver_area_m2 = value;
        }
        if let Some(value) = parse_env(&lookup, "CONQUEST_CLOSURE_TOLERANCE_M")? {
            self.engine.closure_tolerance_m = value;
        }
        if let Some(value) = parse_env(&lookup, "CONQUEST_SEARCH_MARGIN_M")? {
            self.engine.search_margin_m = value;
        }
        if let Some(value) = parse_env(&lookup, "CONQUEST_UTM_ZONE")? {
            self.engine.utm_zone = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_schema_name(&self.schema)?;
        self.engine
            .validate()
            .context("Invalid engine section in configuration")
    }
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", key, raw, e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"engine": {{"sliver_area_m2": 45.0}}}}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.engine.sliver_area_m2, 45.0);
        assert_eq!(config.engine.closure_tolerance_m, 10.0);
        assert_eq!(config.schema, "conquest");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CONQUEST_SCHEMA", "game"),
            ("CONQUEST_UTM_ZONE", "33"),
            ("CONQUEST_SEARCH_MARGIN_M", " 15 "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.schema, "game");
        assert_eq!(config.engine.utm_zone, 33);
        assert_eq!(config.engine.search_margin_m, 15.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = Config::default();
        let err = config
            .apply_env(|k| (k == "CONQUEST_SLIVER_AREA_M2").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("CONQUEST_SLIVER_AREA_M2"));
    }

    #[test]
    fn test_validate_rejects_bad_schema() {
        let config = Config {
            schema: "drop table".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
