//! Validator mode and the import blocking policy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How strictly CSV validation gates an import
///
/// Ordered: `Off < Permissive < Strict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorMode {
    #[default]
    Off,
    Permissive,
    Strict,
}

impl ValidatorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorMode::Off => "off",
            ValidatorMode::Permissive => "permissive",
            ValidatorMode::Strict => "strict",
        }
    }
}

impl fmt::Display for ValidatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidatorMode {
    type Err = String;

    /// Accepts names and the numeric levels 0, 1, 2
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(ValidatorMode::Off),
            "permissive" | "1" => Ok(ValidatorMode::Permissive),
            "strict" | "2" => Ok(ValidatorMode::Strict),
            other => Err(format!("unknown validator mode '{}'", other)),
        }
    }
}

/// Outcome of one validator run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub warn_count: usize,
    pub error_count: usize,
    pub verbose_report: String,
    pub short_report: String,
}

/// Why validation blocked an import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationBlock {
    Errors(usize),
    Warnings(usize),
}

impl ValidationResult {
    /// Apply the mode policy. Errors block in permissive and strict mode,
    /// warnings only in strict mode.
    pub fn blocking(&self, mode: ValidatorMode) -> Option<ValidationBlock> {
        if self.error_count > 0 && mode >= ValidatorMode::Permissive {
            return Some(ValidationBlock::Errors(self.error_count));
        }
        if self.warn_count > 0 && mode == ValidatorMode::Strict {
            return Some(ValidationBlock::Warnings(self.warn_count));
        }
        None
    }
}
