use serde::{Deserialize, Serialize};

use crate::index::{ReferenceIndex, PREFIX_LEVELS};
use crate::model::{MatchTier, NcmCode};
use crate::normalize::{canonicalize_code, normalize_code, CODE_LEN};

/// How an input code is prepared before prefix comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixMode {
    /// Right-pad to 8 digits first, then compare prefixes.
    #[default]
    Canonical,
    /// Compare the raw digit string; tiers longer than the input are skipped.
    Raw,
}

/// Level of the hierarchy at which a code was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    Exact,
    Subheading,
    Heading,
    Chapter,
    None,
}

impl HierarchyLevel {
    fn for_prefix_len(len: usize) -> Self {
        match len {
            6 => Self::Subheading,
            4 => Self::Heading,
            2 => Self::Chapter,
            _ => Self::None,
        }
    }
}

impl From<HierarchyLevel> for MatchTier {
    fn from(level: HierarchyLevel) -> Self {
        match level {
            HierarchyLevel::Exact => MatchTier::ExactCode,
            HierarchyLevel::Subheading => MatchTier::Prefix6,
            HierarchyLevel::Heading => MatchTier::Prefix4,
            HierarchyLevel::Chapter => MatchTier::Prefix2,
            HierarchyLevel::None => MatchTier::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatch {
    pub code: Option<NcmCode>,
    pub level: HierarchyLevel,
}

impl PrefixMatch {
    fn none() -> Self {
        Self { code: None, level: HierarchyLevel::None }
    }

    pub fn tier(&self) -> MatchTier {
        self.level.into()
    }
}

/// Resolve a possibly malformed code against the index, falling back from
/// the exact code to the 6-, 4- and 2-digit ancestors. First hit wins; ties
/// at a level go to the earliest code in table order.
pub fn match_by_prefix(raw: &str, index: &ReferenceIndex, mode: PrefixMode) -> PrefixMatch {
    let digits = normalize_code(raw);
    let digits = match mode {
        PrefixMode::Canonical => canonicalize_code(&digits),
        PrefixMode::Raw => digits.chars().take(CODE_LEN).collect(),
    };
    if digits.is_empty() {
        return PrefixMatch::none();
    }

    if digits.len() == CODE_LEN {
        if let Some(code) = NcmCode::parse(&digits).filter(|c| index.is_valid(c)) {
            return PrefixMatch { code: Some(code), level: HierarchyLevel::Exact };
        }
    }

    for len in PREFIX_LEVELS {
        if digits.len() < len {
            continue;
        }
        if let Some(code) = index.first_with_prefix(&digits[..len]) {
            return PrefixMatch {
                code: Some(code.clone()),
                level: HierarchyLevel::for_prefix_len(len),
            };
        }
    }

    PrefixMatch::none()
}
