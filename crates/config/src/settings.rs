// Run configuration
// One TOML file describes a whole reconciliation run: where the reference and
// product tables live, which columns to use, where results go, and how the
// engine and classifier behave.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ncm_recon::EngineConfig;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Column discovery
// ---------------------------------------------------------------------------

/// Header fragments tried, in order, when no column name is configured.
/// Compared against normalized headers (accents stripped, upper-cased).
pub const REFERENCE_CODE_HINTS: &[&str] = &["CODIGO", "COD", "NCM"];
pub const REFERENCE_DESCRIPTION_HINTS: &[&str] = &["DESCRICAO", "DESCR", "NOME"];
pub const PRODUCT_NAME_HINTS: &[&str] = &["NOME", "PRODUTO", "DESCR"];
pub const PRODUCT_CODE_HINTS: &[&str] = &["NCM"];
pub const PRODUCT_DESCRIPTION_HINTS: &[&str] = &["DESCRICAO"];

/// Header names used when a product column must be created.
pub const DEFAULT_CODE_HEADER: &str = "NCM";
pub const DEFAULT_DESCRIPTION_HEADER: &str = "DESCRICAO";

/// How to find one column: an explicit header, or the first header that
/// contains one of the hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRule {
    /// Logical name for error messages ("code", "description", "name").
    pub role: &'static str,
    pub explicit: Option<String>,
    pub hints: &'static [&'static str],
}

impl ColumnRule {
    fn new(role: &'static str, explicit: &Option<String>, hints: &'static [&'static str]) -> Self {
        Self { role, explicit: explicit.clone(), hints }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSource {
    pub file: PathBuf,
    /// Worksheet name for spreadsheet files; first sheet when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_column: Option<String>,
}

impl ReferenceSource {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into(), sheet: None, code_column: None, description_column: None }
    }

    pub fn code_rule(&self) -> ColumnRule {
        ColumnRule::new("code", &self.code_column, REFERENCE_CODE_HINTS)
    }

    pub fn description_rule(&self) -> ColumnRule {
        ColumnRule::new("description", &self.description_column, REFERENCE_DESCRIPTION_HINTS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSource {
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_column: Option<String>,
    /// Existing code column. Created in the output when the table has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_column: Option<String>,
    /// Description column, filled in describe mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_column: Option<String>,
}

impl ProductSource {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            sheet: None,
            name_column: None,
            code_column: None,
            description_column: None,
        }
    }

    pub fn name_rule(&self) -> ColumnRule {
        ColumnRule::new("name", &self.name_column, PRODUCT_NAME_HINTS)
    }

    pub fn code_rule(&self) -> ColumnRule {
        ColumnRule::new("code", &self.code_column, PRODUCT_CODE_HINTS)
    }

    pub fn description_rule(&self) -> ColumnRule {
        ColumnRule::new("description", &self.description_column, PRODUCT_DESCRIPTION_HINTS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Full product table with resolved codes; overwritten at each checkpoint.
    pub resolved: PathBuf,
    /// Records left unresolved.
    pub pending: PathBuf,
    /// JSON run report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<PathBuf>,
}

impl OutputSettings {
    /// Output paths for a config-less run: pending goes next to the resolved
    /// file as `<stem>.pending.<ext>`.
    pub fn for_resolved(resolved: impl Into<PathBuf>) -> Self {
        let resolved = resolved.into();
        let pending = pending_path_for(&resolved);
        Self { resolved, pending, report: None }
    }
}

fn pending_path_for(resolved: &Path) -> PathBuf {
    let stem = resolved
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match resolved.extension() {
        Some(ext) => format!("{stem}.pending.{}", ext.to_string_lossy()),
        None => format!("{stem}.pending"),
    };
    resolved.with_file_name(name)
}

/// External classifier selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// No AI step; unmatched records go straight to pending
    None,
    /// Google Gemini generateContent API
    #[default]
    Gemini,
}

impl Provider {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Provider::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::None => "none",
            Provider::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::None => "",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub provider: Provider,
    /// Empty = provider default
    pub model: String,
    /// API base URL override (proxies, tests)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Minimum spacing between consecutive calls
    pub min_delay_ms: u64,
    /// Extra random delay added on top of `min_delay_ms`
    pub jitter_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: String::new(),
            endpoint: None,
            min_delay_ms: 1200,
            jitter_ms: 300,
            timeout_secs: 30,
        }
    }
}

impl ClassifierSettings {
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub name: String,
    pub reference: ReferenceSource,
    pub products: ProductSource,
    pub output: OutputSettings,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub classifier: ClassifierSettings,
}

const INPUT_EXTENSIONS: &[&str] = &["csv", "tsv", "xlsx", "xlsm", "xls", "ods"];
const OUTPUT_EXTENSIONS: &[&str] = &["csv", "xlsx"];

impl RunConfig {
    /// Config assembled from command-line paths alone.
    pub fn from_paths(reference: PathBuf, products: PathBuf, resolved: PathBuf) -> Self {
        Self {
            name: String::new(),
            reference: ReferenceSource::new(reference),
            products: ProductSource::new(products),
            output: OutputSettings::for_resolved(resolved),
            engine: EngineConfig::default(),
            classifier: ClassifierSettings::default(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file. Relative paths inside it are
    /// taken relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml(&text)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        log::debug!("loaded run config '{}' from {}", config.name, path.display());
        Ok(config)
    }

    /// Make every relative path absolute against `base`.
    pub fn rebase(&mut self, base: &Path) {
        for p in [
            &mut self.reference.file,
            &mut self.products.file,
            &mut self.output.resolved,
            &mut self.output.pending,
        ] {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
        if let Some(report) = self.output.report.as_mut() {
            if report.is_relative() {
                *report = base.join(&*report);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_extension("reference.file", &self.reference.file, INPUT_EXTENSIONS)?;
        check_extension("products.file", &self.products.file, INPUT_EXTENSIONS)?;
        check_extension("output.resolved", &self.output.resolved, OUTPUT_EXTENSIONS)?;
        check_extension("output.pending", &self.output.pending, OUTPUT_EXTENSIONS)?;

        if self.output.resolved == self.output.pending {
            return Err(ConfigError::Validation(format!(
                "output.resolved and output.pending are both '{}'",
                self.output.resolved.display()
            )));
        }
        for out in [&self.output.resolved, &self.output.pending] {
            if *out == self.reference.file {
                return Err(ConfigError::Validation(format!(
                    "output '{}' would overwrite the reference table",
                    out.display()
                )));
            }
        }

        self.engine.validate()?;

        if self.classifier.provider.is_enabled() {
            if self.classifier.effective_model().trim().is_empty() {
                return Err(ConfigError::Validation("classifier.model is empty".into()));
            }
            if self.classifier.timeout_secs == 0 {
                return Err(ConfigError::Validation(
                    "classifier.timeout_secs must be at least 1".into(),
                ));
            }
        }

        Ok(())
    }
}

fn check_extension(field: &str, path: &Path, allowed: &[&str]) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(format!("{field} is empty")));
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if allowed.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{field}: unsupported file type '{}' (expected one of: {})",
            path.display(),
            allowed.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
