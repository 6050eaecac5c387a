//! # wmsim-model
//!
//! YAML configuration loading and medium construction for wmsim.
//!
//! A configuration file enumerates the stations sharing the medium and
//! tunes the run:
//!
//! ```yaml
//! stations:
//!   - addr: "02:00:00:00:00:00"
//!   - addr: "02:00:00:00:01:00"
//!     data_queue: { cw_min: 15, cw_max: 63 }
//! defaults:
//!   data_queue: { cw_min: 15, cw_max: 1023 }
//!   mgmt_queue: { cw_min: 3, cw_max: 7 }
//! medium:
//!   snr_db: 15.0
//!   seed: 42
//! control:
//!   listen: /tmp/wmsim.sock
//!   driver: /tmp/wmsim-driver.sock
//! ```
//!
//! Properties resolve built-in defaults → `defaults:` section →
//! per-station values. Validation is fatal at load time: addresses must
//! be pairwise distinct and at least two stations must be present.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use wmsim_common::MacAddr;
use wmsim_medium::sim::DEFAULT_SEED;
use wmsim_medium::{
    DeadlineTimer, Medium, MediumError, MediumParams, PhyParams, QueueParams, SnrErrorModel,
    Station, StationRegistry,
};

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while loading or writing configuration. All of them
/// are fatal at startup.
#[derive(Debug, Error)]
pub enum ModelError {
    /// YAML parsing error.
    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error reading or writing the file.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    /// Two stations share an address.
    #[error("duplicate station address {0}")]
    DuplicateAddress(MacAddr),

    /// The medium needs at least two stations.
    #[error("too few stations: {0} (need at least 2)")]
    TooFewStations(usize),

    /// Registry construction failed.
    #[error(transparent)]
    Medium(#[from] MediumError),
}

// ============================================================================
// Schema
// ============================================================================

/// One station entry. Queue parameters fall back to the file's
/// `defaults:` section, then to the built-in contention bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// The station's hardware address.
    pub addr: MacAddr,
    /// Data-queue contention bounds override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_queue: Option<QueueParams>,
    /// Management-queue contention bounds override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgmt_queue: Option<QueueParams>,
}

/// The `defaults:` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueDefaults {
    /// Contention bounds applied to data queues without an override.
    pub data_queue: QueueParams,
    /// Contention bounds applied to management queues without an
    /// override.
    pub mgmt_queue: QueueParams,
}

impl Default for QueueDefaults {
    fn default() -> Self {
        QueueDefaults {
            data_queue: QueueParams::DATA_DEFAULT,
            mgmt_queue: QueueParams::MGMT_DEFAULT,
        }
    }
}

/// The `medium:` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediumConfig {
    /// Link SNR in dB, shared by every station pair.
    pub snr_db: f64,
    /// PRNG seed for the run.
    pub seed: u64,
    /// Slot time in microseconds.
    pub slot_time_us: u64,
    /// Short inter-frame space in microseconds.
    pub sifs_us: u64,
}

impl Default for MediumConfig {
    fn default() -> Self {
        let phy = PhyParams::default();
        MediumConfig {
            snr_db: 15.0,
            seed: DEFAULT_SEED,
            slot_time_us: phy.slot_time_us,
            sifs_us: phy.sifs_us,
        }
    }
}

/// The `control:` section: where the control sockets live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Path the medium binds and receives submissions on.
    pub listen: PathBuf,
    /// Path the driver listens on for Deliver/TxStatus/Register.
    pub driver: PathBuf,
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            listen: PathBuf::from("/tmp/wmsim.sock"),
            driver: PathBuf::from("/tmp/wmsim-driver.sock"),
        }
    }
}

/// A loaded, validated configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The stations sharing the medium, in file order.
    pub stations: Vec<StationConfig>,
    /// Queue-parameter defaults.
    #[serde(default)]
    pub defaults: QueueDefaults,
    /// Medium parameters.
    #[serde(default)]
    pub medium: MediumConfig,
    /// Control-channel socket paths.
    #[serde(default)]
    pub control: ControlConfig,
}

// ============================================================================
// Loading
// ============================================================================

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config, ModelError> {
    let text = std::fs::read_to_string(path)?;
    load_config_from_str(&text)
}

/// Parse and validate a configuration from a YAML string.
pub fn load_config_from_str(yaml: &str) -> Result<Config, ModelError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ModelError> {
    if config.stations.len() < 2 {
        return Err(ModelError::TooFewStations(config.stations.len()));
    }
    for (i, station) in config.stations.iter().enumerate() {
        if config.stations[..i].iter().any(|s| s.addr == station.addr) {
            return Err(ModelError::DuplicateAddress(station.addr));
        }
    }
    Ok(())
}

// ============================================================================
// Skeleton Generation
// ============================================================================

/// Write a skeleton configuration for `station_count` stations, using
/// locally-administered addresses and the built-in defaults.
pub fn write_skeleton(path: &Path, station_count: usize) -> Result<(), ModelError> {
    if station_count < 2 {
        return Err(ModelError::TooFewStations(station_count));
    }
    let stations = (0..station_count)
        .map(|i| StationConfig {
            addr: MacAddr::from_octets([0x02, 0, 0, (i >> 8) as u8, i as u8, 0]),
            data_queue: None,
            mgmt_queue: None,
        })
        .collect();
    let config = Config {
        stations,
        defaults: QueueDefaults::default(),
        medium: MediumConfig::default(),
        control: ControlConfig::default(),
    };
    let yaml = serde_yaml::to_string(&config)?;
    std::fs::write(path, yaml)?;
    log::info!("wrote skeleton config for {station_count} stations to {}", path.display());
    Ok(())
}

// ============================================================================
// Medium Construction
// ============================================================================

/// Build the medium from a validated configuration: register the
/// stations in file order with their resolved queue parameters, and
/// hand over the timer.
pub fn build_medium<T: DeadlineTimer>(
    config: &Config,
    timer: T,
) -> Result<Medium<T>, ModelError> {
    let mut registry = StationRegistry::new();
    for entry in &config.stations {
        let mgmt = entry.mgmt_queue.unwrap_or(config.defaults.mgmt_queue);
        let data = entry.data_queue.unwrap_or(config.defaults.data_queue);
        log::debug!(
            "station {}: mgmt cw {}..{} data cw {}..{}",
            entry.addr,
            mgmt.cw_min,
            mgmt.cw_max,
            data.cw_min,
            data.cw_max,
        );
        registry.register(Station::new(entry.addr, mgmt, data))?;
    }

    let params = MediumParams {
        phy: PhyParams {
            slot_time_us: config.medium.slot_time_us,
            sifs_us: config.medium.sifs_us,
        },
        snr_db: config.medium.snr_db,
        seed: config.medium.seed,
    };
    Ok(Medium::new(params, registry, Box::new(SnrErrorModel::default()), timer))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
stations:
  - addr: "02:00:00:00:00:00"
  - addr: "02:00:00:00:01:00"
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.stations.len(), 2);
        assert_eq!(config.defaults.data_queue, QueueParams::DATA_DEFAULT);
        assert_eq!(config.defaults.mgmt_queue, QueueParams::MGMT_DEFAULT);
        assert_eq!(config.medium.snr_db, 15.0);
        assert_eq!(config.medium.slot_time_us, 9);
    }

    #[test]
    fn test_per_station_override_beats_defaults() {
        let yaml = r#"
stations:
  - addr: "02:00:00:00:00:00"
    data_queue: { cw_min: 7, cw_max: 63 }
  - addr: "02:00:00:00:01:00"
defaults:
  data_queue: { cw_min: 31, cw_max: 511 }
"#;
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(
            config.stations[0].data_queue,
            Some(QueueParams { cw_min: 7, cw_max: 63 })
        );
        assert_eq!(config.defaults.data_queue, QueueParams { cw_min: 31, cw_max: 511 });
    }

    #[test]
    fn test_duplicate_address_is_fatal() {
        let yaml = r#"
stations:
  - addr: "02:00:00:00:00:00"
  - addr: "02:00:00:00:00:00"
"#;
        assert!(matches!(
            load_config_from_str(yaml).unwrap_err(),
            ModelError::DuplicateAddress(_)
        ));
    }

    #[test]
    fn test_too_few_stations_is_fatal() {
        let yaml = r#"
stations:
  - addr: "02:00:00:00:00:00"
"#;
        assert!(matches!(
            load_config_from_str(yaml).unwrap_err(),
            ModelError::TooFewStations(1)
        ));
    }

    #[test]
    fn test_malformed_yaml_is_fatal() {
        assert!(matches!(
            load_config_from_str("stations: [{addr: 12}").unwrap_err(),
            ModelError::Yaml(_)
        ));
    }

    #[test]
    fn test_skeleton_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skeleton.yaml");
        write_skeleton(&path, 3).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.stations.len(), 3);
        assert_eq!(config.stations[1].addr.to_string(), "02:00:00:00:01:00");
    }

    #[test]
    fn test_skeleton_needs_two_stations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skeleton.yaml");
        assert!(matches!(
            write_skeleton(&path, 1).unwrap_err(),
            ModelError::TooFewStations(1)
        ));
    }

    #[test]
    fn test_build_medium_registers_in_file_order() {
        struct NullTimer;
        impl DeadlineTimer for NullTimer {
            fn arm(&mut self, _: wmsim_common::MonoTime) -> std::io::Result<()> {
                Ok(())
            }
            fn disarm(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let config = load_config_from_str(MINIMAL).unwrap();
        let medium = build_medium(&config, NullTimer).unwrap();
        let order: Vec<String> = medium
            .registry()
            .iter()
            .map(|s| s.addr().to_string())
            .collect();
        assert_eq!(order, vec!["02:00:00:00:00:00", "02:00:00:00:01:00"]);
    }
}
