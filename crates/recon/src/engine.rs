use crate::classify::{parse_proposal, Classifier};
use crate::config::EngineConfig;
use crate::index::ReferenceIndex;
use crate::matcher::{match_by_prefix, PrefixMode};
use crate::model::{MatchResult, MatchTier, NcmCode, Outcome, ProductRecord, SkipReason};
use crate::normalize::{normalize_code, normalize_text};

/// One evaluation strategy the batch runner can drive.
pub trait Reconcile {
    fn evaluate(&mut self, record: &mut ProductRecord) -> Outcome;

    /// Mode name for logs and the run report.
    fn mode(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Code resolution
// ---------------------------------------------------------------------------

/// Assign a code to `record`, trying in order:
///
/// 1. the existing code, if `(name, code)` is a pair in the reference table;
/// 2. the code whose reference description equals the name;
/// 3. the classifier's proposal, if it is a valid code.
///
/// On success `record.resolved_code` is set. Otherwise it is cleared and the
/// result has tier [`MatchTier::None`]. Only `resolved_code` and `tier` are
/// written, so calling this twice yields the same result for a
/// deterministic classifier.
pub fn resolve(
    record: &mut ProductRecord,
    index: &ReferenceIndex,
    classifier: &mut dyn Classifier,
    config: &EngineConfig,
) -> MatchResult {
    let name = normalize_text(&record.name);
    let existing = record.current_code.trim();

    if let Some(code) = NcmCode::parse(existing) {
        if index.is_valid_pair(&name, &code) {
            return finish(record, MatchResult::matched(code, MatchTier::ExactValid));
        }
    }

    let rejected_code = if existing.is_empty() {
        None
    } else {
        log::info!(
            "row {}: existing code '{}' does not match '{}', discarding",
            record.row,
            existing,
            record.name
        );
        Some(existing.to_string())
    };

    if let Some(code) = index.code_for_description(&name) {
        let mut result = MatchResult::matched(code.clone(), MatchTier::ExactDescription);
        result.rejected_code = rejected_code;
        return finish(record, result);
    }

    let mut result = MatchResult::unresolved();
    result.rejected_code = rejected_code;

    if name.is_empty() {
        return finish(record, result);
    }

    let candidates = index.candidates(&name, config.candidate_tokens, config.max_candidates);
    let proposal = match classifier.classify(&record.name, &candidates) {
        Ok(reply) => reply.as_deref().and_then(parse_proposal),
        Err(e) => {
            log::warn!(
                "row {}: classifier '{}' unavailable: {e}",
                record.row,
                classifier.name()
            );
            None
        }
    };

    if let Some(proposal) = proposal {
        // Guardrail: only codes already in the reference table are accepted.
        match NcmCode::parse(&proposal).filter(|c| index.is_valid(c)) {
            Some(code) => {
                result.code = Some(code);
                result.tier = MatchTier::AiAssisted;
            }
            None => {
                log::info!(
                    "row {}: classifier proposed '{}' for '{}', not in reference table",
                    record.row,
                    proposal,
                    record.name
                );
                result.rejected_proposal = Some(proposal);
            }
        }
    }

    finish(record, result)
}

fn finish(record: &mut ProductRecord, result: MatchResult) -> MatchResult {
    record.resolved_code = result.code.clone();
    record.tier = Some(result.tier);
    match &result.code {
        Some(code) => log::debug!("row {}: {} -> {} ({})", record.row, record.name, code, result.tier),
        None => log::info!("row {}: no code found for '{}'", record.row, record.name),
    }
    result
}

/// Drives [`resolve`] for the batch runner.
pub struct Resolver<'a> {
    index: &'a ReferenceIndex,
    classifier: &'a mut dyn Classifier,
    config: &'a EngineConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(
        index: &'a ReferenceIndex,
        classifier: &'a mut dyn Classifier,
        config: &'a EngineConfig,
    ) -> Self {
        Self { index, classifier, config }
    }
}

impl Reconcile for Resolver<'_> {
    fn evaluate(&mut self, record: &mut ProductRecord) -> Outcome {
        let result = resolve(record, self.index, &mut *self.classifier, self.config);
        if result.is_match() {
            Outcome::Resolved(result)
        } else {
            Outcome::Pending(result)
        }
    }

    fn mode(&self) -> &'static str {
        "resolve"
    }
}

// ---------------------------------------------------------------------------
// Description fill
// ---------------------------------------------------------------------------

/// Fill `record.resolved_description` from the reference label of the
/// record's code, falling back through the code hierarchy.
///
/// Records without a code, or that already carry a description, are skipped.
pub fn describe(record: &mut ProductRecord, index: &ReferenceIndex, mode: PrefixMode) -> Outcome {
    if !record.current_description.trim().is_empty() {
        return Outcome::Skipped(SkipReason::HasDescription);
    }
    if normalize_code(&record.current_code).is_empty() {
        return Outcome::Skipped(SkipReason::NoCode);
    }

    let found = match_by_prefix(&record.current_code, index, mode);
    let tier = found.tier();
    record.tier = Some(tier);

    let label = found.code.as_ref().and_then(|c| index.label(c));
    match (found.code, label) {
        (Some(code), Some(label)) => {
            log::debug!("row {}: code {} -> {} via {}", record.row, record.current_code, code, tier);
            record.resolved_description = Some(label.to_string());
            Outcome::Resolved(MatchResult::matched(code, tier))
        }
        _ => {
            log::info!("row {}: code '{}' not found at any level", record.row, record.current_code);
            record.resolved_description = None;
            Outcome::Pending(MatchResult::unresolved())
        }
    }
}

/// Drives [`describe`] for the batch runner.
pub struct Describer<'a> {
    index: &'a ReferenceIndex,
    mode: PrefixMode,
}

impl<'a> Describer<'a> {
    pub fn new(index: &'a ReferenceIndex, mode: PrefixMode) -> Self {
        Self { index, mode }
    }
}

impl Reconcile for Describer<'_> {
    fn evaluate(&mut self, record: &mut ProductRecord) -> Outcome {
        describe(record, self.index, self.mode)
    }

    fn mode(&self) -> &'static str {
        "describe"
    }
}
