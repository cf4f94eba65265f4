//! Fail-soft compliance re-checks over the component registry.
//!
//! These re-validate, at report severity, conditions the fail-fast gate in
//! [`crate::framework`] already enforces fatally. The experiment runner uses
//! them as a secondary compliance report for logging and telemetry, and they
//! are deliberately usable on frameworks that already failed strict
//! validation — nothing here raises, results carry `errors`/`warnings`
//! arrays instead.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_yaml::Value;

use crate::value::{entries, get};

/// Registry completeness and reference integrity.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryReport {
    pub valid: bool,
    /// `|referenced anchor IDs| / |declared components|`, 0 when no
    /// components are declared.
    pub registry_completeness: f64,
    /// Declared components no axis references.
    pub orphaned_components: Vec<String>,
    /// Axis references that resolve to no declared component.
    pub missing_references: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Per-axis polar constraint outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AxisCheck {
    pub axis: String,
    pub anchor_count: usize,
    pub satisfied: bool,
}

/// Polar constraint compliance across all axes.
#[derive(Debug, Clone, Serialize)]
pub struct PolarReport {
    pub polar_constraint_satisfied: bool,
    pub axes_validations: Vec<AxisCheck>,
    pub violations: Vec<String>,
    pub errors: Vec<String>,
}

/// Composite of the registry and polar re-checks.
#[derive(Debug, Clone, Serialize)]
pub struct HybridArchitectureReport {
    pub framework_valid: bool,
    pub registry: RegistryReport,
    pub polar: PolarReport,
}

/// Check registry completeness: every axis reference resolves (error-level)
/// and every declared component is referenced (warning-level).
pub fn validate_component_registry(framework: &Value) -> RegistryReport {
    let mut report = RegistryReport {
        valid: false,
        registry_completeness: 0.0,
        orphaned_components: Vec::new(),
        missing_references: Vec::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    if !framework.is_mapping() {
        report.errors.push("framework is not a mapping".into());
        return report;
    }

    let declared: BTreeSet<String> = get(framework, "components")
        .into_iter()
        .flat_map(entries)
        .map(|(id, _)| id.to_string())
        .collect();

    let referenced: BTreeSet<String> = get(framework, "axes")
        .into_iter()
        .flat_map(entries)
        .filter_map(|(_, axis)| match get(axis, "anchor_ids") {
            Some(Value::Sequence(ids)) => Some(ids),
            _ => None,
        })
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    report.registry_completeness = if declared.is_empty() {
        0.0
    } else {
        referenced.len() as f64 / declared.len() as f64
    };

    report.orphaned_components = declared.difference(&referenced).cloned().collect();
    report.missing_references = referenced.difference(&declared).cloned().collect();

    for orphan in &report.orphaned_components {
        report
            .warnings
            .push(format!("component `{orphan}` is not referenced by any axis"));
    }
    for missing in &report.missing_references {
        report.errors.push(format!(
            "axis reference `{missing}` does not resolve to a declared component"
        ));
    }

    report.valid = report.errors.is_empty();
    report
}

/// Re-check the polar constraint per axis at report severity.
pub fn validate_polar_constraint(framework: &Value) -> PolarReport {
    let mut report = PolarReport {
        polar_constraint_satisfied: true,
        axes_validations: Vec::new(),
        violations: Vec::new(),
        errors: Vec::new(),
    };

    if !framework.is_mapping() {
        report.polar_constraint_satisfied = false;
        report.errors.push("framework is not a mapping".into());
        return report;
    }

    let Some(axes) = get(framework, "axes") else {
        // No axes section: vacuously satisfied. The fail-fast gate decides
        // whether an axis-less framework is admissible at all.
        return report;
    };

    for (axis_name, definition) in entries(axes) {
        if !definition.is_mapping() {
            report.polar_constraint_satisfied = false;
            report
                .errors
                .push(format!("axis `{axis_name}` definition is not a mapping"));
            report.axes_validations.push(AxisCheck {
                axis: axis_name.to_string(),
                anchor_count: 0,
                satisfied: false,
            });
            continue;
        }

        let anchor_count = match get(definition, "anchor_ids") {
            Some(Value::Sequence(ids)) => ids.len(),
            Some(_) => 0,
            None => entries(definition)
                .filter(|(_, v)| v.is_mapping() && get(v, "name").is_some())
                .count(),
        };

        let satisfied = anchor_count == 2;
        if !satisfied {
            report.polar_constraint_satisfied = false;
            report.violations.push(format!(
                "axis `{axis_name}` has {anchor_count} anchors (exactly 2 required)"
            ));
        }
        report.axes_validations.push(AxisCheck {
            axis: axis_name.to_string(),
            anchor_count,
            satisfied,
        });
    }

    report
}

/// Composite hybrid-architecture compliance report.
pub fn validate_hybrid_architecture(framework: &Value) -> HybridArchitectureReport {
    let registry = validate_component_registry(framework);
    let polar = validate_polar_constraint(framework);
    HybridArchitectureReport {
        framework_valid: registry.valid && polar.polar_constraint_satisfied,
        registry,
        polar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn complete_registry_is_valid() {
        let framework = yaml(
            r#"
components:
  x: { type: anchor }
  y: { type: anchor }
axes:
  main: { anchor_ids: [x, y] }
"#,
        );
        let report = validate_component_registry(&framework);
        assert!(report.valid);
        assert!((report.registry_completeness - 1.0).abs() < 1e-12);
        assert!(report.orphaned_components.is_empty());
        assert!(report.missing_references.is_empty());
    }

    #[test]
    fn orphans_warn_but_do_not_invalidate() {
        let framework = yaml(
            r#"
components:
  x: { type: anchor }
  y: { type: anchor }
  unused: { type: anchor }
axes:
  main: { anchor_ids: [x, y] }
"#,
        );
        let report = validate_component_registry(&framework);
        assert!(report.valid);
        assert_eq!(report.orphaned_components, vec!["unused".to_string()]);
        assert_eq!(report.warnings.len(), 1);
        assert!((report.registry_completeness - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn missing_references_are_errors() {
        let framework = yaml(
            r#"
components:
  x: { type: anchor }
axes:
  main: { anchor_ids: [x, ghost] }
"#,
        );
        let report = validate_component_registry(&framework);
        assert!(!report.valid);
        assert_eq!(report.missing_references, vec!["ghost".to_string()]);
        assert!(report.errors[0].contains("ghost"));
    }

    #[test]
    fn polar_recheck_reports_without_raising() {
        let framework = yaml(
            r#"
axes:
  good: { anchor_ids: [a, b] }
  bad: { anchor_ids: [a, b, c] }
"#,
        );
        let report = validate_polar_constraint(&framework);
        assert!(!report.polar_constraint_satisfied);
        assert_eq!(report.axes_validations.len(), 2);
        assert!(report.axes_validations[0].satisfied);
        assert_eq!(report.axes_validations[1].anchor_count, 3);
        assert_eq!(report.violations.len(), 1);
    }

    #[test]
    fn polar_recheck_counts_legacy_embedded_anchors() {
        let framework = yaml(
            r#"
axes:
  tone:
    pos: { name: hopeful }
    neg: { name: fearful }
"#,
        );
        let report = validate_polar_constraint(&framework);
        assert!(report.polar_constraint_satisfied);
        assert_eq!(report.axes_validations[0].anchor_count, 2);
    }

    #[test]
    fn recheck_tolerates_garbage_input() {
        let report = validate_hybrid_architecture(&yaml("- not\n- a\n- framework\n"));
        assert!(!report.framework_valid);
        assert!(!report.registry.errors.is_empty());
        assert!(!report.polar.errors.is_empty());
    }

    #[test]
    fn composite_requires_both_checks() {
        let framework = yaml(
            r#"
components:
  x: { type: anchor }
  y: { type: anchor }
axes:
  main: { anchor_ids: [x, y, x] }
"#,
        );
        let report = validate_hybrid_architecture(&framework);
        assert!(report.registry.valid);
        assert!(!report.polar.polar_constraint_satisfied);
        assert!(!report.framework_valid);
    }
}
