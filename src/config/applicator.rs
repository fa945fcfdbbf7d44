//! Plan applicator - applies the splices of a plan file, grouped per target
//!
//! - Resolves each target (confined to the plan directory when
//!   `base_relative` is set)
//! - Applies all splices for one file as a bottom-to-top batch
//! - Reports a result per splice, in plan order

use crate::config::schema::PlanConfig;
use crate::safety::{PathGuard, SafetyError};
use crate::splice::{open_writable, Splice, SpliceApplyError, SpliceResult, SpliceStatus};
use crate::stream::FileStream;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of one splice from a plan
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PlanResult should be checked for success/failure"]
pub enum PlanResult {
    /// Splice was applied (or would be, when checking)
    Applied { file: PathBuf, length_delta: i64 },
    /// Target already holds the new bytes
    AlreadyApplied { file: PathBuf },
}

impl fmt::Display for PlanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanResult::Applied { file, length_delta } => {
                write!(f, "Applied to {} ({:+} bytes)", file.display(), length_delta)
            }
            PlanResult::AlreadyApplied { file } => {
                write!(f, "Already applied to {}", file.display())
            }
        }
    }
}

/// Errors during plan application
///
/// Every splice of a failed target reports the same error, so the typed
/// source is shared.
#[derive(Debug, Clone)]
pub enum ApplicationError {
    /// Target path could not be resolved or escapes the plan directory
    Safety {
        file: String,
        source: Arc<SafetyError>,
    },
    /// The batch for a target failed; every splice of that target reports it
    Batch {
        file: PathBuf,
        source: Arc<SpliceApplyError>,
    },
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Safety { file, source } => {
                write!(f, "cannot use target {}: {}", file, source)
            }
            ApplicationError::Batch { file, source } => {
                write!(f, "splicing {} failed: {}", file.display(), source)
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Safety { source, .. } => Some(source.as_ref()),
            ApplicationError::Batch { source, .. } => Some(source.as_ref()),
        }
    }
}

type PlanOutcome = Vec<(String, Result<PlanResult, ApplicationError>)>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Apply,
    Check,
}

/// Apply a splice plan.
///
/// `base_dir` is the directory relative targets resolve against, normally
/// the directory holding the plan file.
pub fn apply_plan(config: &PlanConfig, base_dir: &Path) -> PlanOutcome {
    run_plan(config, base_dir, Mode::Apply)
}

/// Check a splice plan without writing. `Applied` means "would apply".
pub fn check_plan(config: &PlanConfig, base_dir: &Path) -> PlanOutcome {
    run_plan(config, base_dir, Mode::Check)
}

fn run_plan(config: &PlanConfig, base_dir: &Path, mode: Mode) -> PlanOutcome {
    let mut results: Vec<Option<Result<PlanResult, ApplicationError>>> =
        (0..config.splices.len()).map(|_| None).collect();

    let guard = if config.meta.base_relative {
        match PathGuard::new(base_dir) {
            Ok(guard) => Some(guard),
            Err(e) => {
                let error = ApplicationError::Safety {
                    file: base_dir.display().to_string(),
                    source: Arc::new(e),
                };
                return config
                    .splices
                    .iter()
                    .map(|splice| (splice.id.clone(), Err(error.clone())))
                    .collect();
            }
        }
    } else {
        None
    };

    // Group splice indices by resolved target.
    let mut by_file: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
    for (idx, splice) in config.splices.iter().enumerate() {
        match resolve_target(guard.as_ref(), &splice.file) {
            Ok(path) => by_file.entry(path).or_default().push(idx),
            Err(source) => {
                results[idx] = Some(Err(ApplicationError::Safety {
                    file: splice.file.clone(),
                    source: Arc::new(source),
                }));
            }
        }
    }

    for (file, indices) in by_file {
        let splices: Vec<Splice> = indices
            .iter()
            .map(|&idx| config.splices[idx].to_splice())
            .collect();

        tracing::debug!(file = %file.display(), splices = splices.len(), "splicing target");
        match run_batch(guard.as_ref(), &file, &splices, mode) {
            Ok(batch) => {
                for (idx, result) in indices.into_iter().zip(batch) {
                    results[idx] = Some(Ok(result));
                }
            }
            Err(error) => {
                tracing::warn!(file = %file.display(), %error, "batch failed");
                for idx in indices {
                    results[idx] = Some(Err(error.clone()));
                }
            }
        }
    }

    config
        .splices
        .iter()
        .zip(results)
        .filter_map(|(splice, result)| result.map(|r| (splice.id.clone(), r)))
        .collect()
}

fn resolve_target(guard: Option<&PathGuard>, file: &str) -> Result<PathBuf, SafetyError> {
    match guard {
        Some(guard) => guard.validate_path(file),
        None => Ok(Path::new(file).canonicalize()?),
    }
}

fn run_batch(
    guard: Option<&PathGuard>,
    file: &Path,
    splices: &[Splice],
    mode: Mode,
) -> Result<Vec<PlanResult>, ApplicationError> {
    if let Some(guard) = guard {
        guard
            .revalidate(file)
            .map_err(|source| ApplicationError::Safety {
                file: file.display().to_string(),
                source: Arc::new(source),
            })?;
    }

    let results = match mode {
        Mode::Apply => apply_target(file, splices),
        Mode::Check => check_target(file, splices),
    };
    results.map_err(|source| ApplicationError::Batch {
        file: file.to_path_buf(),
        source: Arc::new(source),
    })
}

fn apply_target(file: &Path, splices: &[Splice]) -> Result<Vec<PlanResult>, SpliceApplyError> {
    let mut stream = open_writable(file)?;
    let results = Splice::apply_batch(&mut stream, splices)?;
    stream.sync()?;
    Ok(results
        .into_iter()
        .map(|result| match result {
            SpliceResult::AlreadyApplied { .. } => PlanResult::AlreadyApplied {
                file: file.to_path_buf(),
            },
            applied @ SpliceResult::Applied { .. } => PlanResult::Applied {
                file: file.to_path_buf(),
                length_delta: applied.length_delta(),
            },
        })
        .collect())
}

fn check_target(file: &Path, splices: &[Splice]) -> Result<Vec<PlanResult>, SpliceApplyError> {
    let mut stream =
        FileStream::open_read_only(file).map_err(|source| SpliceApplyError::Open {
            path: file.to_path_buf(),
            source,
        })?;
    let statuses = Splice::check_batch(&mut stream, splices)?;
    Ok(statuses
        .into_iter()
        .zip(splices)
        .map(|(status, splice)| match status {
            SpliceStatus::AlreadyApplied => PlanResult::AlreadyApplied {
                file: file.to_path_buf(),
            },
            SpliceStatus::Pending => PlanResult::Applied {
                file: file.to_path_buf(),
                length_delta: splice.data.len() as i64 - splice.count as i64,
            },
        })
        .collect())
}
