use std::fmt;

use serde::Serialize;

use crate::normalize::{code_key, CODE_LEN};

// ---------------------------------------------------------------------------
// Code
// ---------------------------------------------------------------------------

/// A canonical 8-digit NCM code.
///
/// Only constructible through [`NcmCode::parse`], which strips non-digits and
/// pads or truncates, so every value held by the engine is exactly eight ASCII
/// digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NcmCode(String);

impl NcmCode {
    /// Parse raw cell text into a code. `None` when the text has no digits;
    /// digits past the eighth are dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = code_key(raw);
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Chapter/heading/subheading prefix. `len` is clamped to 8.
    pub fn prefix(&self, len: usize) -> &str {
        &self.0[..len.min(CODE_LEN)]
    }
}

impl fmt::Display for NcmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Reference table
// ---------------------------------------------------------------------------

/// One usable row of the authoritative table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    pub code: NcmCode,
    /// Normalized description, the comparison key.
    pub description: String,
    /// Description as it appears in the table, for prompts and output.
    pub label: String,
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// A product row under reconciliation.
///
/// `row` is the position in the loaded table and is how the persistence
/// layer writes results back next to the untouched columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductRecord {
    pub row: usize,
    pub name: String,
    /// Code cell as loaded, before any validation.
    pub current_code: String,
    /// Existing description cell (describe mode only).
    pub current_description: String,
    pub resolved_code: Option<NcmCode>,
    pub resolved_description: Option<String>,
    pub tier: Option<MatchTier>,
}

impl ProductRecord {
    pub fn new(row: usize, name: impl Into<String>, current_code: impl Into<String>) -> Self {
        Self {
            row,
            name: name.into(),
            current_code: current_code.into(),
            ..Default::default()
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_code.is_some() || self.resolved_description.is_some()
    }
}

// ---------------------------------------------------------------------------
// Match results
// ---------------------------------------------------------------------------

/// How a record's code was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchTier {
    /// Existing code confirmed by an exact (description, code) pair.
    ExactValid,
    /// Product name equals a reference description.
    ExactDescription,
    /// Code present in the table as is; no name was checked (describe, lookup).
    ExactCode,
    #[serde(rename = "PREFIX_6")]
    Prefix6,
    #[serde(rename = "PREFIX_4")]
    Prefix4,
    #[serde(rename = "PREFIX_2")]
    Prefix2,
    /// Classifier proposal that passed the guardrail.
    AiAssisted,
    None,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactValid => "EXACT_VALID",
            Self::ExactDescription => "EXACT_DESCRIPTION",
            Self::ExactCode => "EXACT_CODE",
            Self::Prefix6 => "PREFIX_6",
            Self::Prefix4 => "PREFIX_4",
            Self::Prefix2 => "PREFIX_2",
            Self::AiAssisted => "AI_ASSISTED",
            Self::None => "NONE",
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Inverse of [`MatchTier::as_str`], for tiers read back from an earlier
    /// run's output.
    pub fn parse(s: &str) -> Option<Self> {
        let tier = match s.trim() {
            "EXACT_VALID" => Self::ExactValid,
            "EXACT_DESCRIPTION" => Self::ExactDescription,
            "EXACT_CODE" => Self::ExactCode,
            "PREFIX_6" => Self::Prefix6,
            "PREFIX_4" => Self::Prefix4,
            "PREFIX_2" => Self::Prefix2,
            "AI_ASSISTED" => Self::AiAssisted,
            "NONE" => Self::None,
            _ => return None,
        };
        Some(tier)
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating one record. Diagnostic only; not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub code: Option<NcmCode>,
    pub tier: MatchTier,
    /// Existing code that did not survive validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_code: Option<String>,
    /// Classifier answer refused by the guardrail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_proposal: Option<String>,
}

impl MatchResult {
    pub fn matched(code: NcmCode, tier: MatchTier) -> Self {
        Self {
            code: Some(code),
            tier,
            rejected_code: None,
            rejected_proposal: None,
        }
    }

    pub fn unresolved() -> Self {
        Self {
            code: None,
            tier: MatchTier::None,
            rejected_code: None,
            rejected_proposal: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.code.is_some()
    }
}

/// What the batch runner did with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved(MatchResult),
    Pending(MatchResult),
    /// Not evaluated: already resolved by an earlier run, or not applicable
    /// to the current mode.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Carried over from a previous checkpoint.
    AlreadyResolved,
    /// Describe mode: no code to look up.
    NoCode,
    /// Describe mode: description already filled.
    HasDescription,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub resolved: usize,
    pub pending: usize,
    pub skipped: usize,
    pub carried_over: usize,
    /// Existing codes that failed validation and were replaced or cleared.
    pub rejected_codes: usize,
    /// Classifier answers refused by the guardrail.
    pub rejected_proposals: usize,
    pub checkpoints: usize,
    pub interrupted: bool,
    pub tier_counts: std::collections::BTreeMap<String, usize>,
}
