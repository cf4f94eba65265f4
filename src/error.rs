//! Fail-fast validation errors.
//!
//! The framework and experiment validators are all-or-nothing admission
//! control: any structural violation raises one of these immediately. The
//! metrics layer deliberately does NOT use this type — it reports problems
//! through `errors`/`warnings` fields on its result structs and keeps going.

use thiserror::Error;

/// A structural violation found while validating a framework or experiment.
///
/// Carries the dotted path of the offending field and, where useful, the
/// name of the entity (axis, anchor, component) being validated.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("framework validation failed at `{field_path}`: {message}")]
    Framework {
        message: String,
        entity: Option<String>,
        field_path: String,
    },

    #[error("experiment validation failed at `{field_path}`: {message}")]
    Experiment {
        message: String,
        entity: Option<String>,
        field_path: String,
    },
}

impl ValidationError {
    pub fn framework(message: impl Into<String>, field_path: impl Into<String>) -> Self {
        Self::Framework {
            message: message.into(),
            entity: None,
            field_path: field_path.into(),
        }
    }

    pub fn framework_entity(
        message: impl Into<String>,
        entity: impl Into<String>,
        field_path: impl Into<String>,
    ) -> Self {
        Self::Framework {
            message: message.into(),
            entity: Some(entity.into()),
            field_path: field_path.into(),
        }
    }

    pub fn experiment(message: impl Into<String>, field_path: impl Into<String>) -> Self {
        Self::Experiment {
            message: message.into(),
            entity: None,
            field_path: field_path.into(),
        }
    }

    /// Wrap a framework error raised while validating an experiment's
    /// embedded framework. The message is preserved verbatim; the field
    /// path gains a `framework.` prefix so callers see where in the
    /// experiment document the violation sits.
    pub fn into_experiment(self) -> Self {
        match self {
            Self::Framework {
                message,
                entity,
                field_path,
            } => Self::Experiment {
                message,
                entity,
                field_path: format!("framework.{field_path}"),
            },
            other => other,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Framework { message, .. } | Self::Experiment { message, .. } => message,
        }
    }

    pub fn field_path(&self) -> &str {
        match self {
            Self::Framework { field_path, .. } | Self::Experiment { field_path, .. } => field_path,
        }
    }

    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::Framework { entity, .. } | Self::Experiment { entity, .. } => entity.as_deref(),
        }
    }

    /// Short kind tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Framework { .. } => "framework_validation_error",
            Self::Experiment { .. } => "experiment_validation_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_experiment_prefixes_field_path_and_keeps_message() {
        let err = ValidationError::framework_entity("3 anchors found", "coercion", "axes.coercion");
        let wrapped = err.into_experiment();
        assert_eq!(wrapped.kind(), "experiment_validation_error");
        assert_eq!(wrapped.field_path(), "framework.axes.coercion");
        assert_eq!(wrapped.message(), "3 anchors found");
        assert_eq!(wrapped.entity(), Some("coercion"));
    }

    #[test]
    fn experiment_error_is_not_double_wrapped() {
        let err = ValidationError::experiment("missing models", "models");
        let wrapped = err.into_experiment();
        assert_eq!(wrapped.field_path(), "models");
    }
}
