//! Configuration handling for the GapNeedle CLI
//!
//! Settings come from a `gapneedle.toml` file; command-line flags override
//! them. Every field has a default, so a partial file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use gapneedle_core::{aligner, gaps, stitch, telomere};

pub const CONFIG_FILE_NAME: &str = "gapneedle.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub align: AlignConfig,
    #[serde(default)]
    pub stitch: StitchConfig,
    #[serde(default)]
    pub gaps: GapsConfig,
    #[serde(default)]
    pub telomere: TelomereConfig,
    #[serde(default)]
    pub paf: PafConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignConfig {
    /// minimap2 preset passed to `-x`
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Threads passed to `-t`
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// minimap2 binary name or path
    #[serde(default = "default_minimap2")]
    pub minimap2: String,

    /// Directory for automatically named PAF files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Skip the aligner when the PAF already exists
    #[serde(default = "default_true")]
    pub reuse_existing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitchConfig {
    /// Bases shown on each side of a junction preview
    #[serde(default = "default_context_bp")]
    pub context_bp: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapsConfig {
    /// Shortest run of N reported as a gap
    #[serde(default = "default_min_gap")]
    pub min_gap: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelomereConfig {
    #[serde(default = "default_window")]
    pub window: u64,

    #[serde(default = "default_motif")]
    pub motif: String,

    #[serde(default = "default_min_repeats")]
    pub min_repeats: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PafConfig {
    /// Candidates listed by `overlaps`; 0 lists all
    #[serde(default = "default_suggest_limit")]
    pub suggest_limit: usize,
}

// Default value functions
fn default_preset() -> String { aligner::DEFAULT_PRESET.to_string() }
fn default_threads() -> usize { num_cpus::get().max(1) }
fn default_minimap2() -> String { "minimap2".to_string() }
fn default_output_dir() -> PathBuf { PathBuf::from(aligner::DEFAULT_OUTPUT_DIR) }
fn default_true() -> bool { true }
fn default_context_bp() -> usize { stitch::DEFAULT_CONTEXT_BP }
fn default_min_gap() -> u64 { gaps::DEFAULT_MIN_GAP }
fn default_window() -> u64 { telomere::DEFAULT_WINDOW }
fn default_motif() -> String { telomere::DEFAULT_MOTIF.to_string() }
fn default_min_repeats() -> usize { telomere::DEFAULT_MIN_REPEATS }
fn default_suggest_limit() -> usize { 10 }

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            threads: default_threads(),
            minimap2: default_minimap2(),
            output_dir: default_output_dir(),
            reuse_existing: true,
        }
    }
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self { context_bp: default_context_bp() }
    }
}

impl Default for GapsConfig {
    fn default() -> Self {
        Self { min_gap: default_min_gap() }
    }
}

impl Default for TelomereConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            motif: default_motif(),
            min_repeats: default_min_repeats(),
        }
    }
}

impl Default for PafConfig {
    fn default() -> Self {
        Self { suggest_limit: default_suggest_limit() }
    }
}

impl TelomereConfig {
    pub fn to_params(&self) -> telomere::TelomereParams {
        telomere::TelomereParams {
            window: self.window,
            motif: self.motif.clone(),
            min_repeats: self.min_repeats,
        }
    }
}

impl Config {
    /// Load configuration from `config_path`, or the first file found among
    /// `./gapneedle.toml` and the user configuration directory, or defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            log::info!("Loading configuration from: {}", path.display());
            return Self::load_from_file(path);
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                log::info!("Loading configuration from: {}", candidate.display());
                return Self::load_from_file(&candidate);
            }
        }

        log::debug!("Using default configuration");
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("gapneedle").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }
}
