//! Build label computation.
//!
//! A label names one successful build ("KILN_12_INT", "build.42"). An
//! incrementer knows one label shape: it validates labels, computes the
//! successor of a label, and supplies the default assigned to the first
//! successful build. Incrementers are pure; the project loop decides when
//! a label advances.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kiln_core::ConfigError;

// ── Contract ──

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("label {label:?} does not fit the {shape} shape")]
    Malformed { label: String, shape: &'static str },
}

/// One label shape. Implementations carry no clock and do no I/O.
pub trait LabelIncrementer: Send + Sync {
    /// True iff `label` matches this incrementer's shape.
    fn is_valid_label(&self, label: &str) -> bool;

    /// The successor of `previous`: only the counter advances, prefix and
    /// qualifier ride along unchanged.
    fn increment_label(&self, previous: &str) -> Result<String, LabelError>;

    /// Label assigned to the first successful build.
    fn default_label(&self) -> String;
}

// ── Config ──

/// Incrementer configuration, selected by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabelSpec {
    Formatted {
        #[serde(default = "default_prefix")]
        prefix: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_label: Option<String>,
    },
    Dotted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_label: Option<String>,
    },
}

fn default_prefix() -> bool {
    true
}

impl Default for LabelSpec {
    fn default() -> Self {
        LabelSpec::Dotted {
            default_label: None,
        }
    }
}

impl LabelSpec {
    /// Instantiate the configured incrementer. A custom default label that
    /// does not fit the shape is a configuration error.
    pub fn build(&self) -> Result<Box<dyn LabelIncrementer>, ConfigError> {
        match self {
            LabelSpec::Formatted {
                prefix,
                default_label,
            } => {
                let inc = match default_label {
                    Some(label) => FormattedIncrementer::with_default(*prefix, label)?,
                    None => FormattedIncrementer::new(*prefix),
                };
                Ok(Box::new(inc))
            }
            LabelSpec::Dotted { default_label } => {
                let inc = match default_label {
                    Some(label) => DottedIncrementer::with_default(label)?,
                    None => DottedIncrementer::default(),
                };
                Ok(Box::new(inc))
            }
        }
    }
}

fn parse_counter(digits: &str) -> Option<u64> {
    // str::parse would accept a leading '+', which is not a label
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// ── Formatted: PREFIX_N_QUALIFIER ──

const QUALIFIERS: &[&str] = &["INT", "REL"];

/// `PREFIX_N_QUALIFIER` labels ("KILN_12_INT"), or `N_QUALIFIER` when the
/// prefix is disabled. The qualifier must be a release qualifier, INT or
/// REL; the prefix may be any non-empty token.
#[derive(Debug, Clone)]
pub struct FormattedIncrementer {
    prefix: bool,
    default_label: String,
}

impl FormattedIncrementer {
    pub fn new(prefix: bool) -> Self {
        let default_label = if prefix { "KILN_1_INT" } else { "1_INT" };
        FormattedIncrementer {
            prefix,
            default_label: default_label.to_string(),
        }
    }

    /// Use a custom default label, uppercased before validation.
    pub fn with_default(prefix: bool, label: &str) -> Result<Self, ConfigError> {
        let mut inc = FormattedIncrementer::new(prefix);
        let normalized = label.to_uppercase();
        if !inc.is_valid_label(&normalized) {
            return Err(ConfigError::invalid(
                "formatted incrementer",
                "default_label",
                format!("{label:?} does not fit the {} shape", inc.shape()),
            ));
        }
        inc.default_label = normalized;
        Ok(inc)
    }

    fn shape(&self) -> &'static str {
        if self.prefix {
            "PREFIX_N_QUALIFIER"
        } else {
            "N_QUALIFIER"
        }
    }

    /// Split into (prefix, counter, qualifier) from the right, so prefixes
    /// containing underscores still parse.
    fn parse<'a>(&self, label: &'a str) -> Option<(Option<&'a str>, u64, &'a str)> {
        let (rest, qualifier) = label.rsplit_once('_')?;
        if !QUALIFIERS.contains(&qualifier.to_uppercase().as_str()) {
            return None;
        }
        if self.prefix {
            let (prefix, digits) = rest.rsplit_once('_')?;
            if prefix.is_empty() {
                return None;
            }
            Some((Some(prefix), parse_counter(digits)?, qualifier))
        } else {
            Some((None, parse_counter(rest)?, qualifier))
        }
    }
}

impl LabelIncrementer for FormattedIncrementer {
    fn is_valid_label(&self, label: &str) -> bool {
        self.parse(label).is_some()
    }

    fn increment_label(&self, previous: &str) -> Result<String, LabelError> {
        let (prefix, counter, qualifier) =
            self.parse(previous).ok_or_else(|| LabelError::Malformed {
                label: previous.to_string(),
                shape: self.shape(),
            })?;
        let next = counter + 1;
        Ok(match prefix {
            Some(prefix) => format!("{prefix}_{next}_{qualifier}"),
            None => format!("{next}_{qualifier}"),
        })
    }

    fn default_label(&self) -> String {
        self.default_label.clone()
    }
}

// ── Dotted: STEM.N ──

/// `stem.N` labels ("build.42"). This is the shape used when a project
/// configures no incrementer at all.
#[derive(Debug, Clone)]
pub struct DottedIncrementer {
    default_label: String,
}

impl Default for DottedIncrementer {
    fn default() -> Self {
        DottedIncrementer {
            default_label: "build.1".to_string(),
        }
    }
}

impl DottedIncrementer {
    pub fn with_default(label: &str) -> Result<Self, ConfigError> {
        let inc = DottedIncrementer {
            default_label: label.to_string(),
        };
        if !inc.is_valid_label(label) {
            return Err(ConfigError::invalid(
                "dotted incrementer",
                "default_label",
                format!("{label:?} does not fit the stem.N shape"),
            ));
        }
        Ok(inc)
    }
}

fn parse_dotted(label: &str) -> Option<(&str, u64)> {
    let (stem, digits) = label.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some((stem, parse_counter(digits)?))
}

impl LabelIncrementer for DottedIncrementer {
    fn is_valid_label(&self, label: &str) -> bool {
        parse_dotted(label).is_some()
    }

    fn increment_label(&self, previous: &str) -> Result<String, LabelError> {
        let (stem, counter) = parse_dotted(previous).ok_or_else(|| LabelError::Malformed {
            label: previous.to_string(),
            shape: "stem.N",
        })?;
        Ok(format!("{stem}.{}", counter + 1))
    }

    fn default_label(&self) -> String {
        self.default_label.clone()
    }
}

// ── Tests ──
