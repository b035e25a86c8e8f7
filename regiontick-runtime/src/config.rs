use crate::time_unit::{TimeUnit, MILLIS_PER_TICK};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Load config from a specific TOML file
pub fn load_toml_config<P: AsRef<Path>>(path: P) -> Result<Config, Box<dyn std::error::Error>> {
    load_config(path, FileFormat::Toml)
}

/// Load config from a specific YAML file
pub fn load_yaml_config<P: AsRef<Path>>(path: P) -> Result<Config, Box<dyn std::error::Error>> {
    load_config(path, FileFormat::Yaml)
}

fn load_config<P: AsRef<Path>>(
    path: P,
    format: FileFormat,
) -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config::builder()
        .add_source(File::from(path.as_ref()).format(format))
        .add_source(
            config::Environment::with_prefix("REGIONTICK")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    Ok(config)
}

/// Sizing for the in-process hosts, read from the `[host]` table.
///
/// ```toml
/// [host]
/// tick_interval = "50ms"
/// regions = 4
/// async_workers = 2
/// ```
///
/// Environment overrides use the `REGIONTICK__` prefix, e.g.
/// `REGIONTICK__HOST__REGIONS=8`. Nothing here chooses the scheduling backend;
/// that is always decided by probing the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    pub tick_interval: String,
    pub regions: usize,
    pub async_workers: usize,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            tick_interval: format!("{}ms", MILLIS_PER_TICK),
            regions: 4,
            async_workers: 2,
        }
    }
}

impl HostSettings {
    /// Read the `[host]` table, using defaults when it is absent
    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        match config.get::<HostSettings>("host") {
            Ok(settings) => Ok(settings),
            Err(config::ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Wall-clock interval between driven ticks
    pub fn tick_duration(&self) -> Duration {
        match TimeUnit::parse_duration(&self.tick_interval) {
            Some((value, unit)) if value > 0 => unit.to_duration(value),
            _ => {
                warn!(
                    tick_interval = %self.tick_interval,
                    "Invalid tick_interval, using {}ms", MILLIS_PER_TICK
                );
                Duration::from_millis(MILLIS_PER_TICK)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(source: &str) -> Config {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .unwrap()
    }

    #[test]
    fn missing_table_uses_defaults() {
        let settings = HostSettings::from_config(&from_toml("")).unwrap();
        assert_eq!(settings, HostSettings::default());
        assert_eq!(settings.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn reads_host_table() {
        let config = from_toml(
            r#"
            [host]
            tick_interval = "1s"
            regions = 8
            "#,
        );
        let settings = HostSettings::from_config(&config).unwrap();
        assert_eq!(settings.regions, 8);
        assert_eq!(settings.async_workers, 2);
        assert_eq!(settings.tick_duration(), Duration::from_secs(1));
    }

    #[test]
    fn bad_interval_falls_back_to_one_tick() {
        let settings = HostSettings {
            tick_interval: "soon".to_string(),
            ..HostSettings::default()
        };
        assert_eq!(settings.tick_duration(), Duration::from_millis(50));

        let zero = HostSettings {
            tick_interval: "0ms".to_string(),
            ..HostSettings::default()
        };
        assert_eq!(zero.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn loads_toml_and_yaml_files() {
        let dir = std::env::temp_dir().join(format!("regiontick-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let toml_path = dir.join("host.toml");
        std::fs::write(&toml_path, "[host]\nregions = 3\n").unwrap();
        let settings = HostSettings::from_config(&load_toml_config(&toml_path).unwrap()).unwrap();
        assert_eq!(settings.regions, 3);

        let yaml_path = dir.join("host.yaml");
        std::fs::write(&yaml_path, "host:\n  async_workers: 5\n").unwrap();
        let settings = HostSettings::from_config(&load_yaml_config(&yaml_path).unwrap()).unwrap();
        assert_eq!(settings.async_workers, 5);

        std::fs::remove_dir_all(&dir).ok();
    }
}
