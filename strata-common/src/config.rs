// strata-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use tracing::debug;

use super::error::Result;

// Fallback directory name under the user's home when STRATA_ROOT is unset.
const DEFAULT_ROOT_DIR_NAME: &str = ".strata";
const DEFAULT_RECIPE_FILENAME: &str = "strata.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub strata_root: PathBuf,
    pub recipe_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading strata configuration");

        // STRATA_ROOT overrides the default home-relative root.
        let strata_root = env::var("STRATA_ROOT")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                debug!(
                    "STRATA_ROOT environment variable not set or empty, falling back to ~/{}",
                    DEFAULT_ROOT_DIR_NAME
                );
                home_dir().join(DEFAULT_ROOT_DIR_NAME)
            });
        debug!("Effective STRATA_ROOT set to: {}", strata_root.display());

        let recipe_path = env::var("STRATA_RECIPE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RECIPE_FILENAME));

        debug!("Configuration loaded successfully.");
        Ok(Self {
            strata_root,
            recipe_path,
        })
    }

    pub fn strata_root(&self) -> &Path {
        &self.strata_root
    }

    /// Published artifacts, one directory per variant id.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.strata_root.join("artifacts")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.strata_root.join("state")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.strata_root.join("logs")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.strata_root.join("tmp")
    }

    /// VCS requirement checkouts, namespaced per variant.
    pub fn checkouts_dir(&self) -> PathBuf {
        self.strata_root.join("checkouts")
    }

    pub fn variant_artifact_path(&self, variant_id: &str) -> PathBuf {
        self.artifacts_dir().join(variant_id)
    }

    pub fn variant_staging_path(&self, variant_id: &str) -> PathBuf {
        self.tmp_dir().join(format!("{variant_id}.staging"))
    }

    pub fn variant_checkouts_path(&self, variant_id: &str) -> PathBuf {
        self.checkouts_dir().join(variant_id)
    }

    pub fn report_path(&self) -> PathBuf {
        self.state_dir().join("last_build_report.json")
    }

    pub fn home_dir(&self) -> PathBuf {
        home_dir()
    }
}

fn home_dir() -> PathBuf {
    UserDirs::new().map_or_else(|| PathBuf::from("/"), |ud| ud.home_dir().to_path_buf())
}

impl Default for Config {
    fn default() -> Self {
        Self::load().expect("Failed to load default configuration")
    }
}

pub fn load_config() -> Result<Config> {
    Config::load()
}
