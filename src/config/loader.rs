//! Splice plan loading: read, parse, validate.
//!
//! Every error names the plan it came from; plans parsed from a string
//! report as `<inline plan>`.

use crate::config::schema::{PlanConfig, ValidationError};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where a plan was loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOrigin(Option<PathBuf>);

impl PlanOrigin {
    pub fn file(path: &Path) -> Self {
        Self(Some(path.to_path_buf()))
    }

    pub fn path(&self) -> Option<&Path> {
        self.0.as_deref()
    }
}

impl fmt::Display for PlanOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(path) => write!(f, "{}", path.display()),
            None => f.write_str("<inline plan>"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read splice plan {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin}: not a valid splice plan: {source}")]
    Parse {
        origin: PlanOrigin,
        #[source]
        source: toml_edit::de::Error,
    },

    #[error("{origin}: {} problem(s) in splice plan\n{source}", .source.issues.len())]
    Validation {
        origin: PlanOrigin,
        #[source]
        source: ValidationError,
    },
}

impl ConfigError {
    /// Plan the error came from, if it was loaded from disk.
    pub fn plan_path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } => Some(path),
            ConfigError::Parse { origin, .. } | ConfigError::Validation { origin, .. } => {
                origin.path()
            }
        }
    }
}

/// Parse and validate a plan held in memory.
pub fn load_from_str(input: &str) -> Result<PlanConfig, ConfigError> {
    parse_plan(input, PlanOrigin::default())
}

/// Read, parse, and validate the plan at `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<PlanConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_plan(&contents, PlanOrigin::file(path))
}

fn parse_plan(input: &str, origin: PlanOrigin) -> Result<PlanConfig, ConfigError> {
    let config: PlanConfig = match toml_edit::de::from_str(input) {
        Ok(config) => config,
        Err(source) => return Err(ConfigError::Parse { origin, source }),
    };
    if let Err(source) = config.validate() {
        return Err(ConfigError::Validation { origin, source });
    }

    let targets: BTreeSet<&str> = config.splices.iter().map(|s| s.file.as_str()).collect();
    tracing::debug!(
        %origin,
        name = %config.meta.name,
        splices = config.splices.len(),
        targets = targets.len(),
        "loaded splice plan"
    );
    Ok(config)
}
