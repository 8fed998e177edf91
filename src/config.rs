use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::Species;
use crate::error::KiraError;
use crate::pipeline::PipelineSettings;

pub const DEFAULT_CONFIG_FILE: &str = "kira-wgs.json";
pub const DEFAULT_RUN_NAME: &str = "run_efsa";
pub const DEFAULT_READ_TYPE: &str = "dual";
pub const DEFAULT_NEXTFLOW: &str = "nextflow";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub nextflow: Option<String>,
    #[serde(default)]
    pub workflow: Option<String>,
    #[serde(default)]
    pub nextflow_config: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub run_name: Option<String>,
    #[serde(default)]
    pub read_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub nextflow: PathBuf,
    pub workflow: Option<PathBuf>,
    pub nextflow_config: Option<PathBuf>,
    pub species: Option<Species>,
    pub run_name: String,
    pub read_type: String,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workflow: Option<PathBuf>,
    pub nextflow_config: Option<PathBuf>,
    pub species: Option<Species>,
    pub run_name: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `kira-wgs.json` if present; defaults otherwise.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(KiraError::MissingConfig(config_path));
            }
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let species = config
            .species
            .as_deref()
            .map(str::parse::<Species>)
            .transpose()?;

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            nextflow: PathBuf::from(config.nextflow.unwrap_or_else(|| DEFAULT_NEXTFLOW.to_string())),
            workflow: config.workflow.map(PathBuf::from),
            nextflow_config: config.nextflow_config.map(PathBuf::from),
            species,
            run_name: config
                .run_name
                .unwrap_or_else(|| DEFAULT_RUN_NAME.to_string()),
            read_type: config
                .read_type
                .unwrap_or_else(|| DEFAULT_READ_TYPE.to_string()),
        })
    }
}

impl ResolvedConfig {
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(workflow) = overrides.workflow {
            self.workflow = Some(workflow);
        }
        if let Some(nextflow_config) = overrides.nextflow_config {
            self.nextflow_config = Some(nextflow_config);
        }
        if let Some(species) = overrides.species {
            self.species = Some(species);
        }
        if let Some(run_name) = overrides.run_name {
            self.run_name = run_name;
        }
        self
    }

    /// Pipeline settings; fails on the first mandatory value still unset.
    pub fn pipeline_settings(&self) -> Result<PipelineSettings, KiraError> {
        let species = self
            .species
            .ok_or_else(|| KiraError::MissingOption("species".to_string()))?;
        let config = self
            .nextflow_config
            .clone()
            .ok_or_else(|| KiraError::MissingOption("nextflow config".to_string()))?;
        let workflow = self
            .workflow
            .clone()
            .ok_or_else(|| KiraError::MissingOption("workflow".to_string()))?;
        Ok(PipelineSettings {
            nextflow: self.nextflow.clone(),
            workflow,
            config,
            species,
            read_type: self.read_type.clone(),
        })
    }
}
