//! Environment the run targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Selects how rows are mapped and whether stray documents are cleaned up.
///
/// Development runs replace every document and reconcile the index afterwards.
/// Production runs upsert corrected rows and never delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Development),
            "prod" | "production" => Ok(Self::Production),
            other => Err(format!(
                "unknown run mode '{}', expected 'dev' or 'prod'",
                other
            )),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "dev"),
            Self::Production => write!(f, "prod"),
        }
    }
}
