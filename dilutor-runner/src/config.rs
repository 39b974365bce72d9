//! Configuration loading
//!
//! Reads a [`ProtocolConfig`] from disk. Files ending in `.bin` hold the
//! postcard encoding; anything else is parsed as TOML. Every loaded
//! configuration is validated before it is returned.

use std::fs;
use std::path::{Path, PathBuf};

use dilutor_core::config::{ConfigError, ProtocolConfig};
use thiserror::Error;
use tracing::{debug, info};

/// Extension that selects the binary (postcard) format
pub const BINARY_EXTENSION: &str = "bin";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("binary config decode error: {0}")]
    Postcard(#[from] postcard::Error),

    #[error("invalid configuration")]
    Invalid(#[from] ConfigError),
}

/// Load a configuration file, or the built-in defaults when no path is given
pub fn load(path: Option<&Path>) -> Result<ProtocolConfig, ConfigLoadError> {
    let config = match path {
        Some(path) => load_file(path)?,
        None => {
            info!("No configuration file given, using built-in defaults");
            ProtocolConfig::default()
        }
    };
    config.validate()?;
    log_config_summary(&config);
    Ok(config)
}

fn load_file(path: &Path) -> Result<ProtocolConfig, ConfigLoadError> {
    let io_err = |source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    if is_binary(path) {
        let bytes = fs::read(path).map_err(io_err)?;
        debug!("Read {} bytes of binary config from {}", bytes.len(), path.display());
        from_postcard(&bytes)
    } else {
        let text = fs::read_to_string(path).map_err(io_err)?;
        debug!("Read {} bytes of TOML from {}", text.len(), path.display());
        from_toml(&text)
    }
}

fn is_binary(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(BINARY_EXTENSION))
}

/// Parse TOML; missing keys keep their defaults
pub fn from_toml(text: &str) -> Result<ProtocolConfig, ConfigLoadError> {
    Ok(toml::from_str(text)?)
}

pub fn from_postcard(bytes: &[u8]) -> Result<ProtocolConfig, ConfigLoadError> {
    Ok(postcard::from_bytes(bytes)?)
}

/// Encode a configuration in the binary format
pub fn to_postcard(config: &ProtocolConfig) -> Result<Vec<u8>, ConfigLoadError> {
    Ok(postcard::to_allocvec(config)?)
}

/// Write the binary form of a configuration
pub fn export(config: &ProtocolConfig, path: &Path) -> Result<usize, ConfigLoadError> {
    let bytes = to_postcard(config)?;
    fs::write(path, &bytes).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Exported {} bytes of binary config to {}", bytes.len(), path.display());
    Ok(bytes.len())
}

/// Log a summary of the loaded configuration
fn log_config_summary(config: &ProtocolConfig) {
    info!(
        target_od = config.target.od,
        target_volume_ul = config.target.volume_ul,
        threshold_ul = config.pipette_threshold_ul,
        "Configuration loaded"
    );
    for pipette in config.pipettes() {
        debug!(
            "  {} on {} mount, {} tip rack(s)",
            pipette.kind,
            pipette.mount,
            pipette.tip_racks.len()
        );
    }
    debug!(
        "  plates: preculture slot {}, target slot {}, media slot {}",
        config.deck.preculture_plate.slot,
        config.deck.target_plate.slot,
        config.deck.media_plate.slot
    );
    debug!("  coverage gap policy: {:?}", config.coverage_gap_policy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dilutor_core::dispatch::CoverageGapPolicy;
    use dilutor_core::Mount;

    #[test]
    fn test_empty_toml_gives_defaults() {
        assert_eq!(from_toml("").unwrap(), ProtocolConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = from_toml(
            r#"
            pipette_threshold_ul = 20.0
            large_volume_ceiling_ul = 300.0
            coverage_gap_policy = "fail_at_end"

            [target]
            od = 0.1
            volume_ul = 200.0

            [small_pipette]
            kind = "p20_single_gen2"
            mount = "left"
            tip_racks = [{ kind = "opentrons_96_tiprack_20ul", slot = 5 }]
            "#,
        )
        .unwrap();

        assert_eq!(config.target.od, 0.1);
        assert_eq!(config.target.volume_ul, 200.0);
        assert_eq!(config.pipette_threshold_ul, 20.0);
        assert_eq!(config.large_volume_ceiling_ul, Some(300.0));
        assert_eq!(config.coverage_gap_policy, CoverageGapPolicy::FailAtEnd);
        assert_eq!(config.small_pipette.kind.as_str(), "p20_single_gen2");
        assert_eq!(config.large_pipette.mount, Mount::Right);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            from_toml("pipette_threshold_ul = \"thirty\""),
            Err(ConfigLoadError::Toml(_))
        ));
    }

    #[test]
    fn test_binary_export_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protocol.bin");

        let mut config = ProtocolConfig::default();
        config.target.od = 0.08;
        config.coverage_gap_policy = CoverageGapPolicy::Skip;
        export(&config, &path).unwrap();

        assert_eq!(load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protocol.toml");
        fs::write(&path, "[target]\nod = 0.0\nvolume_ul = 150.0\n").unwrap();

        let err = load(Some(&path)).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::Invalid(ConfigError::InvalidTarget)
        ));

        // Cause printed once in an error chain
        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(
            chain,
            "invalid configuration: target OD and volume must be positive numbers"
        );
    }

    #[test]
    fn test_missing_file() {
        let err = load(Some(Path::new("/nonexistent/protocol.toml"))).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/protocol.toml"));
    }
}
