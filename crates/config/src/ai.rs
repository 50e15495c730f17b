// Classifier credentials
//
// API keys are looked up, in order, in:
// 1. System keychain (feature "keychain")
// 2. NCM_<PROVIDER>_KEY environment variable
// 3. API_KEY environment variable
//
// Keys are never read from or written to the run config.

use std::env;
use std::time::Duration;

use crate::settings::{ClassifierSettings, Provider};

/// Service name for keychain storage
#[cfg(feature = "keychain")]
const KEYCHAIN_SERVICE: &str = "ncm";

/// Generic variable accepted as a last resort
const GENERIC_KEY_VAR: &str = "API_KEY";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Keychain,
    Environment,
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

fn env_var_name(provider: &str) -> String {
    format!("NCM_{}_KEY", provider.to_uppercase())
}

#[cfg(feature = "keychain")]
fn keychain_account(provider: &str) -> String {
    format!("classifier/{}", provider.to_lowercase())
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get an API key for the specified provider
pub fn get_api_key(provider: &str) -> KeyLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider)) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup { key: Some(key), source: KeySource::Keychain };
            }
        }
    }

    for name in [env_var_name(provider), GENERIC_KEY_VAR.to_string()] {
        if let Some(key) = non_empty_env(&name) {
            log::debug!("{provider} API key taken from ${name}");
            return KeyLookup { key: Some(key), source: KeySource::Environment };
        }
    }

    KeyLookup { key: None, source: KeySource::None }
}

// ============================================================================
// Resolved classifier configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierStatus {
    /// provider = "none"
    Disabled,
    Ready,
    MissingKey,
}

impl ClassifierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
        }
    }
}

/// Everything the classifier gateway needs for one run, credentials
/// included. Built once at startup and passed to the gateway constructor.
#[derive(Clone)]
pub struct ResolvedClassifierConfig {
    pub provider: Provider,
    pub model: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub key_source: KeySource,
    pub min_delay: Duration,
    pub jitter: Duration,
    pub timeout: Duration,
    pub status: ClassifierStatus,
    /// Human-readable reason when not ready
    pub blocking_reason: Option<String>,
}

// Hand-written so the key never reaches a log line.
impl std::fmt::Debug for ResolvedClassifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedClassifierConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("key_source", &self.key_source)
            .field("min_delay", &self.min_delay)
            .field("jitter", &self.jitter)
            .field("timeout", &self.timeout)
            .field("status", &self.status)
            .finish()
    }
}

impl ResolvedClassifierConfig {
    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        let lookup = if settings.provider.is_enabled() {
            get_api_key(settings.provider.name())
        } else {
            KeyLookup { key: None, source: KeySource::None }
        };
        Self::with_lookup(settings, lookup)
    }

    /// Resolve with an already looked-up key.
    pub fn with_lookup(settings: &ClassifierSettings, lookup: KeyLookup) -> Self {
        let provider = settings.provider;
        let (status, blocking_reason) = if !provider.is_enabled() {
            (ClassifierStatus::Disabled, None)
        } else if lookup.key.is_none() {
            (
                ClassifierStatus::MissingKey,
                Some(format!(
                    "No API key found. Set via keychain, {} or {}",
                    env_var_name(provider.name()),
                    GENERIC_KEY_VAR
                )),
            )
        } else {
            (ClassifierStatus::Ready, None)
        };

        Self {
            provider,
            model: settings.effective_model().to_string(),
            endpoint: settings.endpoint.clone(),
            api_key: lookup.key,
            key_source: lookup.source,
            min_delay: Duration::from_millis(settings.min_delay_ms),
            jitter: Duration::from_millis(settings.jitter_ms),
            timeout: Duration::from_secs(settings.timeout_secs),
            status,
            blocking_reason,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status, ClassifierStatus::Ready)
    }
}
