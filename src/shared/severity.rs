//! Severity levels in their symbolic, wire-string and wire-code forms.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Code 5, `WARNING` on the wire, `warning` in state.
    Warning,
    /// Code 10, `CRITICAL` on the wire, `critical` in state.
    Critical,
}

impl Severity {
    /// Both severities, in ascending order.
    pub const ALL: [Severity; 2] = [Severity::Warning, Severity::Critical];

    /// Symbolic name used in state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Upper-case name used as a wire map key.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }

    /// Numeric code used by event specifications.
    pub fn code(self) -> i64 {
        match self {
            Self::Warning => 5,
            Self::Critical => 10,
        }
    }

    /// Resolve a numeric code received from the server.
    ///
    /// Unknown codes are a decode error.
    pub fn from_code(code: i64) -> Result<Self, ProviderError> {
        Self::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| ProviderError::Decode(format!("unknown severity code {}", code)))
    }

    /// Resolve a symbolic name from configuration.
    ///
    /// Unknown names are a validation error.
    pub fn parse(name: &str) -> Result<Self, ProviderError> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == name)
            .ok_or_else(|| {
                ProviderError::Validation(format!(
                    "unknown severity '{}', expected one of warning, critical",
                    name
                ))
            })
    }

    /// Symbolic names, for schema enumerations.
    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(Self::as_str)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
