// Property-based tests for the normalizer, the guardrail and prefix fallback.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;

use ncm_recon::classify::{Classifier, ClassifierError};
use ncm_recon::matcher::{match_by_prefix, HierarchyLevel, PrefixMode};
use ncm_recon::normalize::{canonicalize_code, code_key, normalize_code, normalize_text};
use ncm_recon::{resolve, EngineConfig, MatchTier, NcmCode, ProductRecord, ReferenceEntry, ReferenceIndex};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Product-name-like text: Portuguese letters, digits, punctuation, runs of
/// whitespace.
fn arb_text() -> impl Strategy<Value = String> {
    r"[a-zA-Z0-9àáâãçéêíóôõúüÀÁÂÃÇÉÊÍÓÔÕÚÜ ,./\-\t]{0,40}"
}

/// Code cell as typed by a person: 1–12 digits with optional separators.
/// Anything past eight digits is a typo or a trailing suffix.
fn arb_code_cell() -> impl Strategy<Value = String> {
    prop::collection::vec((r"[0-9]", r"[ .\-]?"), 1..=12)
        .prop_map(|parts| parts.into_iter().map(|(d, sep)| format!("{d}{sep}")).collect())
}

fn reference() -> ReferenceIndex {
    ReferenceIndex::build([
        ("01012100", "Cavalos reprodutores de raça pura"),
        ("01019000", "Outros cavalos"),
        ("12030000", "Copra"),
        ("84713012", "Computadores portáteis"),
        ("84719000", "Outras unidades"),
    ])
}

/// Returns the same reply to every question.
struct Fixed(String);

impl Classifier for Fixed {
    fn classify(
        &mut self,
        _product_name: &str,
        _candidates: &[&ReferenceEntry],
    ) -> Result<Option<String>, ClassifierError> {
        Ok(Some(self.0.clone()))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn normalize_text_is_idempotent(s in arb_text()) {
        let once = normalize_text(&s);
        prop_assert_eq!(normalize_text(&once), once.clone());
        prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
        prop_assert!(!once.contains("  "));
    }

    #[test]
    fn canonical_code_has_eight_digits(cell in arb_code_cell()) {
        let digits = normalize_code(&cell);
        let key = canonicalize_code(&digits);
        prop_assert_eq!(key.len(), 8);
        prop_assert!(key.bytes().all(|b| b.is_ascii_digit()));
        if digits.len() <= 8 {
            prop_assert!(key.starts_with(&digits));
        } else {
            prop_assert_eq!(key.as_str(), &digits[..8]);
        }
        prop_assert!(NcmCode::parse(&cell).is_some());
    }

    #[test]
    fn digitless_cell_has_no_code(cell in r"[a-zA-Z .\-/]{0,12}") {
        prop_assert_eq!(code_key(&cell), "");
        prop_assert!(NcmCode::parse(&cell).is_none());
    }
}

// ---------------------------------------------------------------------------
// Guardrail and fallback
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn unlisted_proposal_is_never_assigned(reply in r"[0-9 .]{0,12}|0|[a-z ]{0,8}", name in arb_text()) {
        let index = reference();
        let config = EngineConfig::default();
        let mut record = ProductRecord::new(0, name, "");
        let result = resolve(&mut record, &index, &mut Fixed(reply.clone()), &config);

        match &result.code {
            Some(code) => {
                prop_assert!(index.is_valid(code));
                if result.tier == MatchTier::AiAssisted {
                    let parsed = NcmCode::parse(&reply);
                    prop_assert_eq!(parsed.as_ref(), Some(code));
                }
            }
            None => {
                prop_assert_eq!(record.resolved_code, None);
            }
        }
    }

    #[test]
    fn resolve_twice_gives_same_result(reply in r"[0-9]{0,8}", name in arb_text(), cell in arb_code_cell()) {
        let index = reference();
        let config = EngineConfig::default();
        let mut record = ProductRecord::new(0, name, cell);
        let first = resolve(&mut record, &index, &mut Fixed(reply.clone()), &config);
        let second = resolve(&mut record, &index, &mut Fixed(reply), &config);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prefix_match_shares_prefix_at_its_level(cell in arb_code_cell()) {
        let index = reference();
        let m = match_by_prefix(&cell, &index, PrefixMode::Canonical);
        let key = code_key(&cell);
        let len = match m.level {
            HierarchyLevel::Exact => 8,
            HierarchyLevel::Subheading => 6,
            HierarchyLevel::Heading => 4,
            HierarchyLevel::Chapter => 2,
            HierarchyLevel::None => {
                prop_assert!(m.code.is_none());
                return Ok(());
            }
        };
        let code = m.code.unwrap();
        prop_assert!(index.is_valid(&code));
        prop_assert_eq!(code.prefix(len), &key[..len]);
        // No finer level would have matched.
        for finer in [8usize, 6, 4, 2].into_iter().filter(|l| *l > len) {
            prop_assert!(index.codes().iter().all(|c| c.prefix(finer) != &key[..finer]));
        }
    }
}
