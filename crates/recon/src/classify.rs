//! Contract between the engine and an external code classifier.
//!
//! Implementations live outside this crate (HTTP gateways, test doubles).
//! Whatever they return is an unverified proposal: the engine canonicalizes
//! it and checks it against the reference index before it can become a
//! code.

use std::fmt;

use crate::model::ReferenceEntry;
use crate::normalize::normalize_code;

/// Fewest digits a classifier answer may carry to count as an answer.
pub const MIN_PROPOSAL_DIGITS: usize = 6;

#[derive(Debug, Clone)]
pub enum ClassifierError {
    /// Transport failure (connect, timeout, TLS).
    Network(String),
    /// Non-success HTTP status.
    Http { status: u16, message: String },
    /// Response body could not be decoded.
    Parse(String),
    /// Missing credential or other setup problem.
    NotConfigured(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Parse(msg) => write!(f, "cannot parse classifier response: {msg}"),
            Self::NotConfigured(msg) => write!(f, "classifier not configured: {msg}"),
        }
    }
}

impl std::error::Error for ClassifierError {}

/// Text in, code proposal out.
///
/// Calls may be slow and are made one at a time. `Ok(None)` means the
/// classifier declined to answer; an `Err` is reported by the engine and
/// treated the same way for that record only.
pub trait Classifier {
    fn classify(
        &mut self,
        product_name: &str,
        candidates: &[&ReferenceEntry],
    ) -> Result<Option<String>, ClassifierError>;

    /// Short name for logs and the run report.
    fn name(&self) -> &str;
}

/// Turn a free-text classifier reply into a digit proposal.
///
/// Non-digits are stripped. Fewer than [`MIN_PROPOSAL_DIGITS`] digits, or a
/// bare `0` (the "not sure" answer the prompt asks for), is no answer.
pub fn parse_proposal(reply: &str) -> Option<String> {
    let digits = normalize_code(reply.trim());
    if digits == "0" || digits.len() < MIN_PROPOSAL_DIGITS {
        return None;
    }
    Some(digits)
}

/// Classifier used when AI assistance is switched off. Never answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

impl Classifier for Offline {
    fn classify(
        &mut self,
        _product_name: &str,
        _candidates: &[&ReferenceEntry],
    ) -> Result<Option<String>, ClassifierError> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "offline"
    }
}
