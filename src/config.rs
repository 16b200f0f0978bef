use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::color::default_palette;
use crate::error::CurtainError;
use crate::nearby::DEFAULT_NEARBY_CUTOFF;
use crate::store::StoreLayout;

pub const DEFAULT_CATALOG_URL: &str = "https://curtain-backend.omics.quest";
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub palette: Option<Vec<String>>,
    #[serde(default)]
    pub nearby_cutoff: Option<f64>,
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub data_dir: Option<Utf8PathBuf>,
    pub palette: Vec<String>,
    pub nearby_cutoff: f64,
    pub catalog_url: String,
    pub page_size: usize,
}

impl ResolvedConfig {
    pub fn layout(&self) -> Result<StoreLayout, CurtainError> {
        match &self.data_dir {
            Some(dir) => Ok(StoreLayout::new_with_root(dir.clone())),
            None => StoreLayout::new(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `curtain.json` (or `path`). A missing default file resolves to
    /// the built-in defaults; a missing explicit file is an error.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CurtainError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("curtain.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CurtainError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CurtainError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CurtainError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let palette = match config.palette {
            Some(palette) if palette.is_empty() => {
                return Err(CurtainError::ConfigParse("palette must not be empty".to_string()));
            }
            Some(palette) => palette,
            None => default_palette(),
        };

        let nearby_cutoff = config.nearby_cutoff.unwrap_or(DEFAULT_NEARBY_CUTOFF);
        if !nearby_cutoff.is_finite() || nearby_cutoff < 0.0 {
            return Err(CurtainError::ConfigParse(format!(
                "nearby_cutoff must be a non-negative number, got {nearby_cutoff}"
            )));
        }

        let page_size = config.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(CurtainError::ConfigParse("page_size must be positive".to_string()));
        }

        Ok(ResolvedConfig {
            schema_version,
            data_dir: config.data_dir.map(Utf8PathBuf::from),
            palette,
            nearby_cutoff,
            catalog_url: config
                .catalog_url
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            page_size,
        })
    }
}
