//! Result kinds the user cache is keyed by.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of cached result for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    /// Derived public summary.
    Summary,
    /// Full "important data" payload from the upstream.
    Detail,
    /// Flow package breakdown.
    FluxPackage,
}

impl ResultKind {
    /// All kinds, in a stable order.
    pub const ALL: [ResultKind; 3] = [
        ResultKind::Summary,
        ResultKind::Detail,
        ResultKind::FluxPackage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Summary => "summary",
            ResultKind::Detail => "detail",
            ResultKind::FluxPackage => "flux-package",
        }
    }

    /// Whether this kind is produced by the "important data" upstream call.
    ///
    /// Summary is derived from the detail payload, so both are refreshed together.
    pub fn from_important_data(&self) -> bool {
        matches!(self, ResultKind::Summary | ResultKind::Detail)
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown result kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError(pub String);

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown result kind '{}'", self.0)
    }
}

impl std::error::Error for ParseKindError {}

impl FromStr for ResultKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(ResultKind::Summary),
            "detail" => Ok(ResultKind::Detail),
            "flux-package" | "flux_package" => Ok(ResultKind::FluxPackage),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}
