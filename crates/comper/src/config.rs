//! Config file discovery, loading, and environment variable overlay.
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/comper/config.toml` (system)
//! 2. `~/.config/comper/config.toml` (user)
//! 3. `./comper.toml`, or the `--config` path when given
//! 4. Environment variables (`COMPER_*`)
//!
//! ```toml
//! [generation]
//! style = "arp"
//! arp_direction = "up-down"
//! target_octave = 3
//! velocity = 72
//! min_hold_beats = 2.0
//!
//! [export]
//! channel = 1
//! track_name = "Comp"
//! program = 0
//!
//! [logging]
//! level = "info"
//! ```

use std::env;
use std::path::{Path, PathBuf};

use comping::{ArpDirection, BassPattern, ExportOptions, GenerationSettings, StyleKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// `[generation]`: unclamped; [`GenerationSettings::into_config`] does that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    pub style: Option<StyleKind>,
    pub bass_pattern: Option<BassPattern>,
    pub arp_direction: Option<ArpDirection>,
    pub target_octave: Option<i64>,
    pub velocity: Option<i64>,
    pub min_hold_beats: Option<f64>,
}

/// `[export]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    pub channel: Option<u8>,
    pub track_name: Option<String>,
    pub program: Option<u8>,
}

/// `[logging]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: Option<String>,
}

/// One config layer. Unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComperConfig {
    pub generation: GenerationSection,
    pub export: ExportSection,
    pub logging: LoggingSection,
}

impl ComperConfig {
    /// Load from all sources, with `cli_path` standing in for `./comper.toml`.
    pub fn load_from(cli_path: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = ComperConfig::default();

        for path in discover_config_files_with_override(cli_path)? {
            let layer = load_from_file(&path)?;
            config = config.merge(layer);
            sources.files.push(path);
        }

        apply_env_overrides(&mut config, &mut sources);
        Ok((config, sources))
    }

    /// Field-by-field merge, with `overlay` taking precedence.
    pub fn merge(self, overlay: ComperConfig) -> ComperConfig {
        let (base, over) = (self.generation, overlay.generation);
        let generation = GenerationSection {
            style: over.style.or(base.style),
            bass_pattern: over.bass_pattern.or(base.bass_pattern),
            arp_direction: over.arp_direction.or(base.arp_direction),
            target_octave: over.target_octave.or(base.target_octave),
            velocity: over.velocity.or(base.velocity),
            min_hold_beats: over.min_hold_beats.or(base.min_hold_beats),
        };

        let (base, over) = (self.export, overlay.export);
        let export = ExportSection {
            channel: over.channel.or(base.channel),
            track_name: over.track_name.or(base.track_name),
            program: over.program.or(base.program),
        };

        ComperConfig {
            generation,
            export,
            logging: LoggingSection {
                level: overlay.logging.level.or(self.logging.level),
            },
        }
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        let defaults = GenerationSettings::default();
        let g = &self.generation;
        GenerationSettings {
            target_octave: g.target_octave.unwrap_or(defaults.target_octave),
            velocity: g.velocity.unwrap_or(defaults.velocity),
            min_hold_beats: g.min_hold_beats.unwrap_or(defaults.min_hold_beats),
            style: g.style.unwrap_or(defaults.style),
            bass_pattern: g.bass_pattern.unwrap_or(defaults.bass_pattern),
            arp_direction: g.arp_direction.unwrap_or(defaults.arp_direction),
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        let defaults = ExportOptions::default();
        ExportOptions {
            channel: self.export.channel.map_or(defaults.channel, |c| c.min(15)),
            track_name: self
                .export
                .track_name
                .clone()
                .unwrap_or(defaults.track_name),
            program: self.export.program.map(|p| p.min(127)).or(defaults.program),
        }
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

/// Discover config files, optionally with a CLI override path.
///
/// Returns paths in load order (system, user, local/cli). Missing system,
/// user and local files are skipped; an explicit `cli_path` that does not
/// exist is an error.
pub fn discover_config_files_with_override(
    cli_path: Option<&Path>,
) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/comper/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("comper/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(ConfigError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        files.push(path.to_path_buf());
        return Ok(files);
    }

    let local = PathBuf::from("comper.toml");
    if local.exists() {
        files.push(local);
    }

    Ok(files)
}

/// Load one config layer from a TOML file.
pub fn load_from_file(path: &Path) -> Result<ComperConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<ComperConfig, ConfigError> {
    toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Apply `COMPER_*` environment variable overrides to config.
pub fn apply_env_overrides(config: &mut ComperConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |name| env::var(name).ok());
}

/// Apply overrides from any variable lookup. Values that do not parse are
/// ignored.
fn apply_overrides_from(
    config: &mut ComperConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    fn set<T: std::str::FromStr>(
        slot: &mut Option<T>,
        name: &str,
        value: Option<String>,
        sources: &mut ConfigSources,
    ) {
        if let Some(parsed) = value.and_then(|v| v.trim().parse().ok()) {
            *slot = Some(parsed);
            sources.env_overrides.push(name.to_string());
        }
    }

    let g = &mut config.generation;
    set(&mut g.style, "COMPER_STYLE", lookup("COMPER_STYLE"), sources);
    set(
        &mut g.bass_pattern,
        "COMPER_BASS_PATTERN",
        lookup("COMPER_BASS_PATTERN"),
        sources,
    );
    set(
        &mut g.arp_direction,
        "COMPER_ARP_DIRECTION",
        lookup("COMPER_ARP_DIRECTION"),
        sources,
    );
    set(&mut g.target_octave, "COMPER_OCTAVE", lookup("COMPER_OCTAVE"), sources);
    set(&mut g.velocity, "COMPER_VELOCITY", lookup("COMPER_VELOCITY"), sources);
    set(
        &mut g.min_hold_beats,
        "COMPER_MIN_HOLD_BEATS",
        lookup("COMPER_MIN_HOLD_BEATS"),
        sources,
    );

    set(
        &mut config.export.channel,
        "COMPER_CHANNEL",
        lookup("COMPER_CHANNEL"),
        sources,
    );
    set(&mut config.logging.level, "COMPER_LOG", lookup("COMPER_LOG"), sources);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[generation]
style = "bass"
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.generation.style, Some(StyleKind::Bass));
        assert_eq!(config.generation.velocity, None);
        assert_eq!(config.log_level(), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[generation]
style = "arp"
bass_pattern = "syncopated"
arp_direction = "up-down"
target_octave = 4
velocity = 90
min_hold_beats = 0.5

[export]
channel = 2
track_name = "Comp"
program = 33

[logging]
level = "debug"
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        let settings = config.generation_settings();

        assert_eq!(settings.style, StyleKind::Arp);
        assert_eq!(settings.bass_pattern, BassPattern::Syncopated);
        assert_eq!(settings.arp_direction, ArpDirection::UpDown);
        assert_eq!(settings.target_octave, 4);
        assert_eq!(settings.velocity, 90);
        assert_eq!(settings.min_hold_beats, 0.5);
        assert_eq!(
            config.export_options(),
            ExportOptions {
                channel: 2,
                track_name: "Comp".into(),
                program: Some(33),
            }
        );
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let err = parse_toml("[generation\nstyle = 1", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_unknown_style_is_a_parse_error() {
        let err = parse_toml("[generation]\nstyle = \"waltz\"", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_merge_is_field_by_field() {
        let base = parse_toml(
            "[generation]\nstyle = \"bass\"\nvelocity = 50\n[logging]\nlevel = \"info\"",
            Path::new("base.toml"),
        )
        .unwrap();
        let overlay = parse_toml("[generation]\nvelocity = 100", Path::new("local.toml")).unwrap();

        let merged = base.merge(overlay);
        assert_eq!(merged.generation.style, Some(StyleKind::Bass));
        assert_eq!(merged.generation.velocity, Some(100));
        assert_eq!(merged.log_level(), "info");
    }

    #[test]
    fn test_defaults_without_any_layer() {
        let config = ComperConfig::default();
        assert_eq!(config.generation_settings(), GenerationSettings::default());
        assert_eq!(config.export_options(), ExportOptions::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("COMPER_STYLE", "arp"),
            ("COMPER_ARP_DIRECTION", "down"),
            ("COMPER_VELOCITY", "110"),
            ("COMPER_MIN_HOLD_BEATS", "not-a-number"),
            ("COMPER_LOG", "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = ComperConfig::default();
        config.generation.min_hold_beats = Some(2.0);
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |name| {
            vars.get(name).map(|v| v.to_string())
        });

        assert_eq!(config.generation.style, Some(StyleKind::Arp));
        assert_eq!(config.generation.arp_direction, Some(ArpDirection::Down));
        assert_eq!(config.generation.velocity, Some(110));
        assert_eq!(config.generation.min_hold_beats, Some(2.0));
        assert_eq!(config.log_level(), "trace");
        assert_eq!(
            sources.env_overrides,
            vec!["COMPER_STYLE", "COMPER_ARP_DIRECTION", "COMPER_VELOCITY", "COMPER_LOG"]
        );
    }

    #[test]
    fn test_cli_path_replaces_local() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[export]\nchannel = 9\n").unwrap();

        let files = discover_config_files_with_override(Some(&path)).unwrap();
        assert_eq!(files.last(), Some(&path));

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.export_options().channel, 9);
    }

    #[test]
    fn test_missing_cli_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = discover_config_files_with_override(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
