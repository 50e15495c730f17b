use std::collections::VecDeque;

use ncm_recon::classify::{Classifier, ClassifierError};
use ncm_recon::{
    BatchRunner, CancelToken, Describer, EngineConfig, MatchTier, NcmCode, ProductRecord,
    ReconError, RecordSink, ReferenceEntry, ReferenceIndex, Resolver,
};

fn horses() -> ReferenceIndex {
    ReferenceIndex::build([
        ("01012100", "LIVE HORSES PUREBRED"),
        ("01019000", "LIVE HORSES OTHER"),
    ])
}

fn code(s: &str) -> NcmCode {
    NcmCode::parse(s).unwrap()
}

/// Replays canned replies in order, then declines.
struct Canned {
    replies: VecDeque<&'static str>,
    calls: Vec<String>,
}

impl Canned {
    fn new(replies: &[&'static str]) -> Self {
        Self { replies: replies.iter().copied().collect(), calls: Vec::new() }
    }
}

impl Classifier for Canned {
    fn classify(
        &mut self,
        product_name: &str,
        _candidates: &[&ReferenceEntry],
    ) -> Result<Option<String>, ClassifierError> {
        self.calls.push(product_name.to_string());
        Ok(self.replies.pop_front().map(str::to_string))
    }

    fn name(&self) -> &str {
        "canned"
    }
}

/// Keeps every checkpoint snapshot in memory.
#[derive(Default)]
struct Snapshots {
    checkpoints: Vec<Vec<ProductRecord>>,
    pending: Vec<ProductRecord>,
}

impl RecordSink for Snapshots {
    fn checkpoint(&mut self, records: &[ProductRecord]) -> Result<(), ReconError> {
        self.checkpoints.push(records.to_vec());
        Ok(())
    }

    fn pending(&mut self, records: &[ProductRecord]) -> Result<(), ReconError> {
        self.pending = records.to_vec();
        Ok(())
    }
}

// -------------------------------------------------------------------------
// End to end
// -------------------------------------------------------------------------

#[test]
fn horses_resolve_by_description_widget_stays_pending() {
    let index = horses();
    let config = EngineConfig::default();
    let mut classifier = Canned::new(&["99999999"]);
    let mut records = vec![
        ProductRecord::new(0, "Live Horses Purebred", ""),
        ProductRecord::new(1, "Unknown Widget", ""),
    ];
    let mut sink = Snapshots::default();

    let summary = {
        let mut resolver = Resolver::new(&index, &mut classifier, &config);
        BatchRunner::new(config.checkpoint_every)
            .run(&mut records, &mut resolver, &mut sink)
            .unwrap()
    };

    assert_eq!(records[0].resolved_code, Some(code("01012100")));
    assert_eq!(records[0].tier, Some(MatchTier::ExactDescription));
    assert_eq!(records[1].resolved_code, None);
    assert_eq!(records[1].tier, Some(MatchTier::None));

    assert_eq!(summary.resolved, 1);
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.rejected_proposals, 1);
    assert_eq!(summary.tier_counts.get("EXACT_DESCRIPTION"), Some(&1));

    // Only the widget reached the classifier.
    assert_eq!(classifier.calls, vec!["Unknown Widget".to_string()]);
    assert_eq!(sink.pending.len(), 1);
    assert_eq!(sink.pending[0].name, "Unknown Widget");
}

#[test]
fn valid_code_under_wrong_name_is_not_trusted() {
    let index = horses();
    let config = EngineConfig::default();
    let mut classifier = Canned::new(&["0"]);
    // 01012100 is a real code, but not the code for this name.
    let mut records = vec![ProductRecord::new(0, "Pony", "0101.21.00")];
    let mut sink = Snapshots::default();

    let summary = {
        let mut resolver = Resolver::new(&index, &mut classifier, &config);
        BatchRunner::new(10).run(&mut records, &mut resolver, &mut sink).unwrap()
    };

    assert_eq!(records[0].resolved_code, None);
    assert_eq!(summary.rejected_codes, 1);
    assert_eq!(classifier.calls.len(), 1);
}

#[test]
fn classifier_answer_accepted_only_when_listed() {
    let index = horses();
    let config = EngineConfig::default();
    let mut classifier = Canned::new(&["0101.90.00", "01012199", ""]);
    let mut records = vec![
        ProductRecord::new(0, "Horses for riding", ""),
        ProductRecord::new(1, "Horses for racing", ""),
        ProductRecord::new(2, "Horses for show", ""),
    ];
    let mut sink = Snapshots::default();

    {
        let mut resolver = Resolver::new(&index, &mut classifier, &config);
        BatchRunner::new(10).run(&mut records, &mut resolver, &mut sink).unwrap();
    }

    assert_eq!(records[0].resolved_code, Some(code("01019000")));
    assert_eq!(records[0].tier, Some(MatchTier::AiAssisted));
    assert_eq!(records[1].resolved_code, None);
    assert_eq!(records[2].resolved_code, None);
}

// -------------------------------------------------------------------------
// Checkpointing
// -------------------------------------------------------------------------

#[test]
fn first_checkpoint_holds_exactly_first_k_records() {
    let index = horses();
    let config = EngineConfig { checkpoint_every: 3, ..Default::default() };
    let mut classifier = Canned::new(&[]);
    let mut records: Vec<ProductRecord> = (0..7)
        .map(|i| ProductRecord::new(i, "Live Horses Other", ""))
        .collect();
    let mut sink = Snapshots::default();

    {
        let mut resolver = Resolver::new(&index, &mut classifier, &config);
        BatchRunner::new(config.checkpoint_every)
            .run(&mut records, &mut resolver, &mut sink)
            .unwrap();
    }

    // Checkpoints after 3 and 6, plus the final write.
    assert_eq!(sink.checkpoints.len(), 3);

    // A crash while evaluating record 4 would leave this snapshot behind.
    let first = &sink.checkpoints[0];
    assert_eq!(first.len(), 7);
    for rec in &first[..3] {
        assert_eq!(rec.resolved_code, Some(code("01019000")));
    }
    for rec in &first[3..] {
        assert_eq!(rec.resolved_code, None);
        assert_eq!(rec.tier, None);
    }

    let last = sink.checkpoints.last().unwrap();
    assert!(last.iter().all(|r| r.resolved_code.is_some()));
}

#[test]
fn resumed_run_skips_checkpointed_records() {
    let index = horses();
    let config = EngineConfig::default();
    let mut classifier = Canned::new(&[]);
    let mut records = vec![
        ProductRecord::new(0, "Unknown Widget", ""),
        ProductRecord::new(1, "Live Horses Other", ""),
    ];
    records[0].resolved_code = Some(code("01012100"));
    let mut sink = Snapshots::default();

    let summary = {
        let mut resolver = Resolver::new(&index, &mut classifier, &config);
        BatchRunner::new(10).run(&mut records, &mut resolver, &mut sink).unwrap()
    };

    assert_eq!(summary.carried_over, 1);
    assert_eq!(summary.resolved, 1);
    assert!(classifier.calls.is_empty());
    assert_eq!(records[0].resolved_code, Some(code("01012100")));
}

#[test]
fn cancellation_keeps_completed_work() {
    struct CancelAfter {
        remaining: usize,
        token: CancelToken,
    }

    impl RecordSink for CancelAfter {
        fn checkpoint(&mut self, _records: &[ProductRecord]) -> Result<(), ReconError> {
            if self.remaining == 0 {
                return Ok(());
            }
            self.remaining -= 1;
            if self.remaining == 0 {
                self.token.cancel();
            }
            Ok(())
        }

        fn pending(&mut self, _records: &[ProductRecord]) -> Result<(), ReconError> {
            panic!("pending list must not be written on interrupt");
        }
    }

    let index = horses();
    let config = EngineConfig::default();
    let mut classifier = Canned::new(&[]);
    let mut records: Vec<ProductRecord> = (0..5)
        .map(|i| ProductRecord::new(i, if i % 2 == 0 { "Live Horses Other" } else { "Gadget" }, ""))
        .collect();
    let token = CancelToken::new();
    let mut sink = CancelAfter { remaining: 2, token: token.clone() };

    let summary = {
        let mut resolver = Resolver::new(&index, &mut classifier, &config);
        BatchRunner::new(1)
            .with_cancel(token)
            .run(&mut records, &mut resolver, &mut sink)
            .unwrap()
    };

    assert!(summary.interrupted);
    assert_eq!(summary.resolved + summary.pending, 2);
    assert_eq!(records[0].resolved_code, Some(code("01019000")));
    assert_eq!(records[2].tier, None);
}

// -------------------------------------------------------------------------
// Describe mode
// -------------------------------------------------------------------------

#[test]
fn describe_fills_from_nearest_ancestor() {
    let index = ReferenceIndex::build([
        ("12030000", "Copra"),
        ("84713012", "Portable notebooks"),
    ]);
    let mut records = vec![
        ProductRecord::new(0, "Copra seed", "12030099"),
        ProductRecord::new(1, "Laptop", "84713012"),
        ProductRecord::new(2, "Already described", "84713012"),
        ProductRecord::new(3, "No code", ""),
        ProductRecord::new(4, "Unknown chapter", "99000000"),
    ];
    records[2].current_description = "Notebook".into();
    let mut sink = Snapshots::default();

    let summary = {
        let mut describer = Describer::new(&index, Default::default());
        BatchRunner::new(100).run(&mut records, &mut describer, &mut sink).unwrap()
    };

    assert_eq!(records[0].resolved_description.as_deref(), Some("Copra"));
    assert_eq!(records[0].tier, Some(MatchTier::Prefix6));
    assert_eq!(records[1].resolved_description.as_deref(), Some("Portable notebooks"));
    assert_eq!(records[1].tier, Some(MatchTier::ExactValid));
    assert_eq!(records[2].resolved_description, None);
    assert_eq!(records[4].resolved_description, None);

    assert_eq!(summary.resolved, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.pending, 1);
    assert_eq!(sink.pending.len(), 1);
    assert_eq!(sink.pending[0].row, 4);
}
