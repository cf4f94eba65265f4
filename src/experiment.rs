//! Experiment structural validation.
//!
//! An experiment document owns one embedded framework, a model roster, and
//! an optional corpus descriptor. Framework correctness is delegated to
//! [`crate::framework::validate_framework`]; any framework error is
//! re-raised as an experiment error with the field path prefixed
//! `framework.`. Like the framework validator, this layer is fail-fast:
//! structural violations raise, there is no warning path.

use serde_yaml::Value;

use crate::error::ValidationError;
use crate::framework::{validate_framework, NormalizedFramework};
use crate::value::{entries, get, get_str};

/// A model the experiment may score documents with.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelection {
    /// Roster key (e.g. `primary`, `replication`).
    pub key: String,
    pub model_id: String,
    pub enabled: bool,
}

/// The optional corpus descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusDescriptor {
    pub source_type: Option<String>,
    pub file_path: Option<String>,
}

/// An experiment that passed structural validation.
#[derive(Debug, Clone)]
pub struct NormalizedExperiment {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub framework: NormalizedFramework,
    /// Flagship models in roster order.
    pub models: Vec<ModelSelection>,
    pub corpus: Option<CorpusDescriptor>,
    raw: Value,
}

impl NormalizedExperiment {
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// First enabled model in roster order, if any.
    pub fn primary_model(&self) -> Option<&ModelSelection> {
        self.models.iter().find(|m| m.enabled)
    }

    /// The document with the framework section replaced by its normalized,
    /// anchor-augmented form.
    pub fn to_value(&self) -> Value {
        let mut mapping = self.raw.as_mapping().cloned().unwrap_or_default();
        mapping.insert(Value::String("framework".into()), self.framework.to_value());
        Value::Mapping(mapping)
    }
}

/// Validate an experiment document.
///
/// `path` names the source document in error messages.
pub fn validate_experiment(
    config: &Value,
    path: Option<&str>,
) -> Result<NormalizedExperiment, ValidationError> {
    let label = path.unwrap_or("experiment");

    if !config.is_mapping() {
        return Err(ValidationError::experiment(
            format!("experiment document `{label}` must be a mapping"),
            "",
        ));
    }

    for section in ["experiment_meta", "framework", "models"] {
        if get(config, section).is_none() {
            return Err(ValidationError::experiment(
                format!("missing required section `{section}`"),
                section,
            ));
        }
    }

    let meta = get(config, "experiment_meta").unwrap_or(&Value::Null);
    if !meta.is_mapping() {
        return Err(ValidationError::experiment(
            "`experiment_meta` must be a mapping",
            "experiment_meta",
        ));
    }
    let meta_field = |field: &str| -> Result<String, ValidationError> {
        get_str(meta, field)
            .map(str::to_string)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ValidationError::experiment(
                    format!("`experiment_meta` missing required field `{field}`"),
                    format!("experiment_meta.{field}"),
                )
            })
    };
    let name = meta_field("name")?;
    let display_name = meta_field("display_name")?;
    let version = meta_field("version")?;

    let framework_config = get(config, "framework").unwrap_or(&Value::Null);
    let framework =
        validate_framework(framework_config, Some(&name)).map_err(ValidationError::into_experiment)?;

    let models = validate_models(get(config, "models").unwrap_or(&Value::Null))?;
    let corpus = validate_corpus(config)?;

    Ok(NormalizedExperiment {
        name,
        display_name,
        version,
        framework,
        models,
        corpus,
        raw: config.clone(),
    })
}

fn validate_models(models: &Value) -> Result<Vec<ModelSelection>, ValidationError> {
    if !models.is_mapping() {
        return Err(ValidationError::experiment(
            "`models` must be a mapping",
            "models",
        ));
    }

    let Some(flagship) = get(models, "flagship_models") else {
        return Ok(Vec::new());
    };
    if !flagship.is_mapping() {
        return Err(ValidationError::experiment(
            "`models.flagship_models` must be a mapping",
            "models.flagship_models",
        ));
    }

    let mut roster = Vec::new();
    for (key, definition) in entries(flagship) {
        let path = format!("models.flagship_models.{key}");
        let model_id = get_str(definition, "model_id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ValidationError::experiment(
                    format!("model entry `{key}` is missing `model_id`"),
                    format!("{path}.model_id"),
                )
            })?;
        let enabled = get(definition, "enabled")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        roster.push(ModelSelection {
            key: key.to_string(),
            model_id: model_id.to_string(),
            enabled,
        });
    }
    Ok(roster)
}

fn validate_corpus(config: &Value) -> Result<Option<CorpusDescriptor>, ValidationError> {
    let Some(corpus) = get(config, "corpus") else {
        return Ok(None);
    };
    if !corpus.is_mapping() {
        return Err(ValidationError::experiment(
            "`corpus` must be a mapping",
            "corpus",
        ));
    }

    let source_type = get_str(corpus, "source_type").map(str::to_string);
    let file_path = get_str(corpus, "file_path").map(str::to_string);

    if source_type.as_deref() == Some("directory_collection") && file_path.is_none() {
        return Err(ValidationError::experiment(
            "corpus with `source_type: directory_collection` requires `file_path`",
            "corpus.file_path",
        ));
    }

    Ok(Some(CorpusDescriptor {
        source_type,
        file_path,
    }))
}
