//! `ncm-recon`: NCM product-code reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded reference rows and product records,
//! resolves codes, and hands checkpoints to a caller-supplied sink.
//! No CLI, HTTP or file IO dependencies.

pub mod batch;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod matcher;
pub mod merge;
pub mod model;
pub mod normalize;

pub use batch::{BatchRunner, CancelToken, RecordSink};
pub use classify::{Classifier, ClassifierError, Offline};
pub use config::EngineConfig;
pub use engine::{describe, resolve, Describer, Reconcile, Resolver};
pub use error::ReconError;
pub use index::ReferenceIndex;
pub use matcher::{match_by_prefix, PrefixMode};
pub use merge::{merge_codes, MergeSummary};
pub use model::{MatchResult, MatchTier, NcmCode, Outcome, ProductRecord, ReferenceEntry, RunSummary};
