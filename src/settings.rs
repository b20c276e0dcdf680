//! Runtime configuration of the analysis defaults.
//!
//! Settings come from `config/default.toml` (or `config/local.toml` when
//! present), overridden by `UVECS_`-prefixed environment variables, e.g.
//! `UVECS_POLE_FIGURE__BANDWIDTH=0.1`. Every field also has an in-code
//! default, so a missing table falls back to [`Settings::default`].

use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use rand::{rngs::StdRng, SeedableRng};
use serde::Deserialize;
use tracing::info;

use crate::{config as constants, density::Projection, grid::SelectMethod, misorientation::AngleUnit};


/// Colormap rendering defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColormapSettings {
    /// Side length of the colorwheel lookup table.
    pub resolution: usize,
    /// Fold the colorwheel hue into a half turn.
    pub semi: bool,
}

impl Default for ColormapSettings {
    fn default() -> Self {
        Self {
            resolution: constants::DEFAULT_LUT_RESOLUTION,
            semi: false,
        }
    }
}

/// Misorientation profile defaults.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub method: SelectMethod,
    pub unit: AngleUnit,
}

/// Pole-figure pipeline defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoleFigureSettings {
    /// Cap on doubled samples handed to the estimator; 0 keeps them all.
    pub max_samples: usize,
    /// Kernel bandwidth in radians.
    pub bandwidth: f64,
    pub projection: Projection,
    pub mesh_points: usize,
    pub circle_points: usize,
    /// Colatitudes (degrees) of the reference circles.
    pub angles: Vec<f64>,
    /// Add the orientation tensor's principal axes as markers.
    pub plot_tensor: bool,
}

impl Default for PoleFigureSettings {
    fn default() -> Self {
        Self {
            max_samples: constants::DEFAULT_MAX_SAMPLES,
            bandwidth: constants::DEFAULT_BANDWIDTH,
            projection: Projection::default(),
            mesh_points: constants::DEFAULT_MESH_POINTS,
            circle_points: constants::DEFAULT_CIRCLE_POINTS,
            angles: constants::DEFAULT_REFERENCE_ANGLES.to_vec(),
            plot_tensor: true,
        }
    }
}

/// Runtime configuration for the analysis.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub colormap: ColormapSettings,
    pub profile: ProfileSettings,
    pub pole_figure: PoleFigureSettings,
    /// Seed for the randomized paths; OS entropy when absent.
    pub seed: Option<u64>,
}

impl Settings {
    /// Parses a TOML document, filling omitted fields with defaults.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()
            .context("failed to read settings document")?;
        let settings: Settings = config
            .try_deserialize()
            .context("failed to deserialize settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.colormap.resolution == 0 {
            return Err(anyhow!("colormap resolution must be at least 1"));
        }
        let bandwidth = self.pole_figure.bandwidth;
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return Err(anyhow!(
                "kernel bandwidth must be positive and finite, got {}",
                bandwidth
            ));
        }
        Ok(())
    }

    /// Random source for the randomized paths.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// Loads the bundled `config/default.toml` only.
pub fn load_default_config() -> Result<Settings> {
    let default_config_file = retrieve_project_root()?.join("config/default.toml");
    let config = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("failed to load default configuration")?;
    let settings: Settings = config
        .try_deserialize()
        .context("failed to deserialize default configuration")?;
    settings.validate()?;
    Ok(settings)
}

/// Loads `config/local.toml` if present, else `config/default.toml`, then
/// applies `UVECS_` environment overrides.
pub fn load_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    let config_file = if local_config.exists() {
        local_config
    } else {
        default_config_file
    };
    info!(path = %config_file.display(), "loading configuration");

    let config = Config::builder()
        .add_source(File::from(config_file).required(false))
        .add_source(
            Environment::with_prefix("uvecs")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to load configuration")?;
    let settings: Settings = config
        .try_deserialize()
        .context("failed to deserialize configuration")?;
    settings.validate()?;
    Ok(settings)
}

/// Directory holding `config/`: `CARGO_MANIFEST_DIR` when run through cargo,
/// otherwise `UVECS_ROOT_DIR`, otherwise the nearest ancestor of the
/// executable that contains a `config` directory.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("UVECS_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }
    let exe_path = env::current_exe().context("failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(|dir| dir.to_path_buf())
        .ok_or_else(|| anyhow!("could not find a directory containing config/"))
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Colorwheel Resolution: {}
  - Semi Colorwheel: {}
  - Profile Selection: {:?}
  - Profile Unit: {:?}
  - Max KDE Samples: {}
  - KDE Bandwidth: {:.4}
  - Projection: {:?}
  - Seed: {:?}
  ",
            self.colormap.resolution,
            self.colormap.semi,
            self.profile.method,
            self.profile.unit,
            self.pole_figure.max_samples,
            self.pole_figure.bandwidth,
            self.pole_figure.projection,
            self.seed,
        )
    }
}
