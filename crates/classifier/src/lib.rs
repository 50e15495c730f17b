//! Classifier gateways for the reconciliation engine.
//!
//! Blocking HTTP only (no Tokio runtime). Every gateway implements
//! [`ncm_recon::Classifier`]; what it returns is still checked against the
//! reference index by the engine.

mod gemini;
mod prompt;
mod throttle;

pub use gemini::{GeminiClassifier, DEFAULT_GEMINI_URL};
pub use prompt::build_prompt;
pub use throttle::Throttle;

use ncm_config::ai::ClassifierStatus;
use ncm_config::{Provider, ResolvedClassifierConfig};
use ncm_recon::{Classifier, ClassifierError, Offline};

/// Build the gateway a resolved config asks for.
///
/// A disabled provider yields [`Offline`]. An enabled provider without a key
/// is an error; the caller decides whether to fall back to offline.
pub fn from_config(config: &ResolvedClassifierConfig) -> Result<Box<dyn Classifier>, ClassifierError> {
    match (config.status, config.provider) {
        (ClassifierStatus::Disabled, _) | (_, Provider::None) => Ok(Box::new(Offline)),
        (ClassifierStatus::MissingKey, _) => Err(ClassifierError::NotConfigured(
            config
                .blocking_reason
                .clone()
                .unwrap_or_else(|| "no API key".to_string()),
        )),
        (ClassifierStatus::Ready, Provider::Gemini) => Ok(Box::new(GeminiClassifier::new(config)?)),
    }
}
