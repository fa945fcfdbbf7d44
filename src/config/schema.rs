use crate::splice::{Splice, SpliceVerification};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PlanConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub splices: Vec<SpliceDefinition>,
}

impl PlanConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.splices.is_empty() {
            issues.push(ValidationIssue::EmptySpliceList);
        }

        for splice in &self.splices {
            if splice.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    splice_id: None,
                    field: "id",
                });
            }
            if splice.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    splice_id: Some(splice.id.clone()),
                    field: "file",
                });
            }
            if splice.offset.checked_add(splice.operation.count()).is_none() {
                issues.push(ValidationIssue::InvalidCombo {
                    splice_id: Some(splice.id.clone()),
                    message: "offset + count overflows".to_string(),
                });
            }

            match &splice.operation {
                Operation::Delete { count: 0 } => {
                    issues.push(ValidationIssue::InvalidCombo {
                        splice_id: Some(splice.id.clone()),
                        message: "delete requires count > 0".to_string(),
                    });
                }
                Operation::Delete { .. } => {}
                Operation::Insert { text, bytes } => {
                    match payload_issue(text, bytes) {
                        Some(message) => issues.push(ValidationIssue::InvalidCombo {
                            splice_id: Some(splice.id.clone()),
                            message,
                        }),
                        None => {
                            if splice.operation.payload().is_empty() {
                                issues.push(ValidationIssue::InvalidCombo {
                                    splice_id: Some(splice.id.clone()),
                                    message: "insert requires non-empty data".to_string(),
                                });
                            }
                        }
                    }
                    if splice.verify.is_some() {
                        issues.push(ValidationIssue::InvalidCombo {
                            splice_id: Some(splice.id.clone()),
                            message: "insert replaces no bytes and cannot be verified"
                                .to_string(),
                        });
                    }
                }
                Operation::Update { text, bytes, .. } => {
                    if let Some(message) = payload_issue(text, bytes) {
                        issues.push(ValidationIssue::InvalidCombo {
                            splice_id: Some(splice.id.clone()),
                            message,
                        });
                    }
                }
            }

            if let Some(verify) = &splice.verify {
                if let Err(message) = verify.validate() {
                    issues.push(ValidationIssue::InvalidCombo {
                        splice_id: Some(splice.id.clone()),
                        message,
                    });
                }
            }
        }

        issues.extend(self.duplicate_ids());
        issues.extend(self.overlapping_targets());

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

impl PlanConfig {
    fn duplicate_ids(&self) -> Vec<ValidationIssue> {
        let mut seen = BTreeSet::new();
        let mut reported = BTreeSet::new();
        self.splices
            .iter()
            .filter(|splice| !splice.id.trim().is_empty())
            .filter(|splice| !seen.insert(splice.id.as_str()))
            .filter(|splice| reported.insert(splice.id.as_str()))
            .map(|splice| ValidationIssue::DuplicateId {
                splice_id: splice.id.clone(),
            })
            .collect()
    }

    /// Splices naming the same target must not touch the same bytes.
    /// Offsets refer to the target before the plan runs, and at a shared
    /// offset a ranged splice may only follow the inserts listed before it.
    fn overlapping_targets(&self) -> Vec<ValidationIssue> {
        let mut by_target: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, splice) in self.splices.iter().enumerate() {
            by_target.entry(splice.file.as_str()).or_default().push(idx);
        }

        let mut issues = Vec::new();
        for (file, mut indices) in by_target {
            indices.sort_by_key(|&idx| (self.splices[idx].offset, idx));
            for pair in indices.windows(2) {
                let (first, second) = (&self.splices[pair[0]], &self.splices[pair[1]]);
                let first_end = first.offset.saturating_add(first.operation.count());
                if first_end > second.offset {
                    issues.push(ValidationIssue::Overlap {
                        file: file.to_string(),
                        first: first.id.clone(),
                        second: second.id.clone(),
                    });
                }
            }
        }
        issues
    }
}

fn payload_issue(text: &Option<String>, bytes: &Option<Vec<u8>>) -> Option<String> {
    match (text, bytes) {
        (Some(_), Some(_)) => Some("only one of 'text' or 'bytes' is allowed".to_string()),
        (None, None) => Some("one of 'text' or 'bytes' is required".to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Resolve target files against the plan's directory and refuse any
    /// that escape it
    #[serde(default)]
    pub base_relative: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpliceDefinition {
    pub id: String,
    pub file: String,
    pub offset: u64,
    pub operation: Operation,
    #[serde(default)]
    pub verify: Option<Verify>,
}

impl SpliceDefinition {
    /// Build the splice this definition describes. Assumes the plan was
    /// validated.
    pub fn to_splice(&self) -> Splice {
        let splice = Splice::update(self.offset, self.operation.count(), self.operation.payload());
        match self.verify.as_ref().and_then(Verify::to_verification) {
            Some(verification) => splice.with_verification(verification),
            None => splice,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    Delete {
        count: u64,
    },
    Insert {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        bytes: Option<Vec<u8>>,
    },
    Update {
        count: u64,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        bytes: Option<Vec<u8>>,
    },
}

impl Operation {
    /// Number of existing bytes the operation replaces.
    pub fn count(&self) -> u64 {
        match self {
            Operation::Delete { count } | Operation::Update { count, .. } => *count,
            Operation::Insert { .. } => 0,
        }
    }

    /// Bytes the operation writes.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Operation::Delete { .. } => Vec::new(),
            Operation::Insert { text, bytes } | Operation::Update { text, bytes, .. } => {
                match (text, bytes) {
                    (Some(text), _) => text.as_bytes().to_vec(),
                    (None, Some(bytes)) => bytes.clone(),
                    (None, None) => Vec::new(),
                }
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Delete { .. } => "delete",
            Operation::Insert { .. } => "insert",
            Operation::Update { .. } => "update",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Verify {
    ExactMatch {
        #[serde(default)]
        expected_text: Option<String>,
        #[serde(default)]
        expected_bytes: Option<Vec<u8>>,
    },
    Hash {
        algorithm: Option<HashAlgorithm>,
        /// xxh3 digest, decimal or `0x`-prefixed hex
        expected: String,
    },
}

impl Verify {
    fn validate(&self) -> Result<(), String> {
        match self {
            Verify::ExactMatch {
                expected_text,
                expected_bytes,
            } => match (expected_text, expected_bytes) {
                (Some(_), Some(_)) => {
                    Err("only one of 'expected_text' or 'expected_bytes' is allowed".to_string())
                }
                (None, None) => Err("exact_match requires 'expected_text' or 'expected_bytes'"
                    .to_string()),
                _ => Ok(()),
            },
            Verify::Hash { expected, .. } => parse_digest(expected)
                .map(|_| ())
                .ok_or_else(|| format!("invalid xxh3 digest '{expected}'")),
        }
    }

    pub fn to_verification(&self) -> Option<SpliceVerification> {
        match self {
            Verify::ExactMatch {
                expected_text: Some(text),
                ..
            } => Some(SpliceVerification::ExactMatch(text.as_bytes().to_vec())),
            Verify::ExactMatch {
                expected_bytes: Some(bytes),
                ..
            } => Some(SpliceVerification::ExactMatch(bytes.clone())),
            Verify::ExactMatch { .. } => None,
            Verify::Hash { expected, .. } => parse_digest(expected).map(SpliceVerification::Hash),
        }
    }
}

fn parse_digest(input: &str) -> Option<u64> {
    let input = input.trim();
    match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => input.parse().ok(),
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Xxh3,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptySpliceList,
    MissingField {
        splice_id: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        splice_id: Option<String>,
        message: String,
    },
    DuplicateId {
        splice_id: String,
    },
    Overlap {
        file: String,
        first: String,
        second: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptySpliceList => write!(f, "splice plan contains no splices"),
            ValidationIssue::MissingField { splice_id, field } => match splice_id {
                Some(id) => write!(f, "splice '{id}' missing required field '{field}'"),
                None => write!(f, "splice missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { splice_id, message } => match splice_id {
                Some(id) => write!(f, "splice '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid splice configuration: {message}"),
            },
            ValidationIssue::DuplicateId { splice_id } => {
                write!(f, "splice id '{splice_id}' is used more than once")
            }
            ValidationIssue::Overlap {
                file,
                first,
                second,
            } => write!(f, "splices '{first}' and '{second}' overlap in target '{file}'"),
        }
    }
}
