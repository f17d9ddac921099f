use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown atom-map policy {0:?} (expected ignore-aam, daylight-aam or strict-aam)")]
    UnknownPolicy(String),
}

/// How query atom-map numbers constrain a reaction match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AamPolicy {
    /// Map numbers are ignored entirely.
    IgnoreAam,
    /// A map number used on both sides of the query must land on a single
    /// target map number. Required occurrences (`:n`) need a mapped target
    /// atom. Optional ones (`:?n`) are not held to the number at all.
    #[default]
    DaylightAam,
    /// As `DaylightAam`, and distinct query numbers need distinct target
    /// numbers.
    StrictAam,
}

impl AamPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            AamPolicy::IgnoreAam => "ignore-aam",
            AamPolicy::DaylightAam => "daylight-aam",
            AamPolicy::StrictAam => "strict-aam",
        }
    }
}

impl fmt::Display for AamPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AamPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore-aam" => Ok(AamPolicy::IgnoreAam),
            "daylight-aam" => Ok(AamPolicy::DaylightAam),
            "strict-aam" => Ok(AamPolicy::StrictAam),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Configuration for a [`ReactionMatcher`](super::ReactionMatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MatchOptions {
    pub policy: AamPolicy,
    /// Upper bound on embeddings returned by `find_all`. `None` enumerates
    /// every embedding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_matches: Option<usize>,
}

impl MatchOptions {
    pub fn with_policy(policy: AamPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn max_matches(mut self, limit: usize) -> Self {
        self.max_matches = Some(limit);
        self
    }
}

impl From<AamPolicy> for MatchOptions {
    fn from(policy: AamPolicy) -> Self {
        Self::with_policy(policy)
    }
}
