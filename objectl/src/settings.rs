//! # Settings
//!
//! Optional JSON file with default values for the global flags, for example:
//!
//! ```json
//! {
//!   "address": "http://localhost:8000",
//!   "descriptors": "/etc/objectl/descriptors.bin",
//!   "packages": { "private.v1": 0, "fulfillment.v1": 1 },
//!   "headers": { "authorization": "Bearer ..." }
//! }
//! ```
//!
//! The file is only read, never written.
use crate::cli::Cli;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub address: Option<String>,
    pub descriptors: Option<PathBuf>,
    pub packages: BTreeMap<String, i32>,
    pub headers: BTreeMap<String, String>,
    pub tables_dir: Option<PathBuf>,
}

impl Settings {
    /// Loads the settings from the given file, or from the default location. A missing file
    /// gives the default settings, a file that can't be decoded is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Settings file doesn't exist");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read settings from '{}'", path.display()));
            }
        };
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to decode settings from '{}'", path.display()))
    }

    /// Applies the command line flags on top of the settings. Flags win.
    pub fn merge(mut self, cli: &Cli) -> Self {
        if let Some(address) = &cli.address {
            self.address = Some(address.clone());
        }
        if let Some(descriptors) = &cli.descriptors {
            self.descriptors = Some(descriptors.clone());
        }
        if let Some(tables_dir) = &cli.tables_dir {
            self.tables_dir = Some(tables_dir.clone());
        }
        if !cli.packages.is_empty() {
            self.packages = cli.packages.iter().cloned().collect();
        }
        self.headers.extend(cli.headers.iter().cloned());
        self
    }
}

fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "objectl", "objectl").map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
}
