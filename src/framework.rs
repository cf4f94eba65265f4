//! Framework structural validation (Framework Spec v3.2).
//!
//! `validate_framework` is the fail-fast admission gate: required fields,
//! strict version check, at least one positioning section, anchor
//! extraction across all four section kinds, and the polar constraint
//! (every axis resolves to exactly two anchors). Any violation raises
//! [`ValidationError`] immediately — there is no warning path at this layer.
//!
//! Anchor extraction and the polar constraint are deliberately separate
//! passes. Extraction is lenient (it unions whatever anchors it can find,
//! last-wins on name collisions); the polar pass re-walks `axes` and is the
//! sole enforcement point of the bipolar-scale premise.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value;

use crate::error::ValidationError;
use crate::value::{as_number, entries, get, get_str};

/// Framework spec versions this validator admits. Strict by design:
/// legacy v2/v3.0 documents must be migrated, not silently accepted.
pub const ACCEPTED_VERSIONS: &[&str] = &["v3.2", "3.2"];

const POSITIONING_SECTIONS: &[&str] = &["anchors", "axes", "arcs", "components"];
const ADVANCED_SECTIONS: &[&str] = &["competitive_relationships", "temporal_analysis"];

// =============================================================================
// Models
// =============================================================================

/// A single scorable pole. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anchor {
    /// Identity of the anchor: its `name`, or its `component_id` when the
    /// anchor is defined purely by registry reference.
    pub identifier: String,
    /// Angular position on the map, degrees in `[0, 360)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    /// Registry linkage, when the anchor came from (or points into) the
    /// component registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
}

/// A bipolar dimension: exactly two anchors, in document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisSpec {
    pub name: String,
    /// `[positive pole, negative pole]` — coordinate projection subtracts
    /// the second pole's score from the first.
    pub anchor_ids: [String; 2],
}

/// A framework that passed structural validation.
///
/// Holds the raw document mapping so it can be handed back to collaborators
/// augmented with the derived `_extracted_anchors` / `_anchor_count` fields.
#[derive(Debug, Clone)]
pub struct NormalizedFramework {
    pub name: String,
    pub version: String,
    /// De-duplicated anchor map keyed by final anchor name. Merge order is
    /// components → anchors → axes → arcs, last-wins.
    pub anchors: BTreeMap<String, Anchor>,
    pub axes: Vec<AxisSpec>,
    raw: Value,
}

impl NormalizedFramework {
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// The validated document as it arrived.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The document augmented with `_extracted_anchors` and `_anchor_count`,
    /// the shape downstream consumers (reports, runner telemetry) receive.
    pub fn to_value(&self) -> Value {
        let mut mapping = self.raw.as_mapping().cloned().unwrap_or_default();
        if let Ok(anchors) = serde_yaml::to_value(&self.anchors) {
            mapping.insert(Value::String("_extracted_anchors".into()), anchors);
        }
        mapping.insert(
            Value::String("_anchor_count".into()),
            Value::Number(self.anchors.len().into()),
        );
        Value::Mapping(mapping)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validate a framework document against spec v3.2.
///
/// `name_hint` is used in error messages when the document itself has no
/// usable name (e.g. the file stem of the source document).
pub fn validate_framework(
    config: &Value,
    name_hint: Option<&str>,
) -> Result<NormalizedFramework, ValidationError> {
    let label = name_hint.unwrap_or("framework");

    if !config.is_mapping() {
        return Err(ValidationError::framework_entity(
            "framework document must be a mapping",
            label,
            "",
        ));
    }

    // Required fields, then version, then positioning sections — in that
    // order, failing on the first violation.
    let name = get_str(config, "name")
        .map(str::to_string)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            ValidationError::framework_entity("missing required field `name`", label, "name")
        })?;

    let version = get_str(config, "version")
        .map(str::to_string)
        .ok_or_else(|| {
            ValidationError::framework_entity("missing required field `version`", &name, "version")
        })?;

    if !ACCEPTED_VERSIONS.contains(&version.as_str()) {
        return Err(ValidationError::framework_entity(
            format!("unsupported framework version `{version}` (accepted: v3.2, 3.2)"),
            &name,
            "version",
        ));
    }

    if !POSITIONING_SECTIONS.iter().any(|s| get(config, s).is_some()) {
        return Err(ValidationError::framework_entity(
            "framework must define at least one of `anchors`, `axes`, `arcs`, `components`",
            &name,
            "",
        ));
    }

    // Anchor extraction: union of the four section extractors, merged
    // last-wins by final anchor name. The precedence order is part of the
    // contract — do not reorder.
    let mut anchors: BTreeMap<String, Anchor> = BTreeMap::new();
    extract_component_anchors(config, &mut anchors)?;
    extract_direct_anchors(config, &mut anchors)?;
    extract_axis_anchors(config, &mut anchors)?;
    extract_arc_anchors(config, &mut anchors)?;

    if anchors.is_empty() {
        return Err(ValidationError::framework_entity(
            "no anchors could be resolved from any positioning section",
            &name,
            "",
        ));
    }

    // Polar constraint: a separate, strict walk of `axes`. NOT skipped even
    // when extraction already produced a plausible anchor count — extraction
    // is lenient and this is the sole enforcement point.
    let mut axes = check_polar_constraint(config)?;

    // Axis poles may reference registry component IDs while the anchor map
    // is keyed by final extracted name. Rewrite each pole to that name when
    // the reference resolves, so downstream score lookups share one keyspace.
    for axis in &mut axes {
        for pole in &mut axis.anchor_ids {
            if anchors.contains_key(pole.as_str()) {
                continue;
            }
            if let Some(anchor) = anchors
                .values()
                .find(|a| a.component_id.as_deref() == Some(pole.as_str()))
            {
                pole.clone_from(&anchor.identifier);
            }
        }
    }

    for section in ADVANCED_SECTIONS {
        if let Some(value) = get(config, section) {
            if !value.is_mapping() {
                return Err(ValidationError::framework_entity(
                    format!("advanced section `{section}` must be a mapping"),
                    &name,
                    *section,
                ));
            }
        }
    }

    Ok(NormalizedFramework {
        name,
        version,
        anchors,
        axes,
        raw: config.clone(),
    })
}

// =============================================================================
// Anchor extraction
// =============================================================================

fn extract_component_anchors(
    config: &Value,
    out: &mut BTreeMap<String, Anchor>,
) -> Result<(), ValidationError> {
    let Some(components) = get(config, "components") else {
        return Ok(());
    };

    for (component_id, definition) in entries(components) {
        let path = format!("components.{component_id}");
        if !definition.is_mapping() {
            return Err(ValidationError::framework_entity(
                "component definition must be a mapping",
                component_id,
                path,
            ));
        }
        // Only `type: anchor` entries contribute; other component kinds
        // (arcs, derived metrics) live in the registry but are not poles.
        if get_str(definition, "type") != Some("anchor") {
            continue;
        }

        let name = match get_str(definition, "name") {
            Some(n) if !n.is_empty() => n.to_string(),
            Some(_) => {
                return Err(ValidationError::framework_entity(
                    "anchor `name` must be a non-empty string",
                    component_id,
                    format!("{path}.name"),
                ))
            }
            None => component_id.to_string(),
        };

        let angle = parse_angle(definition, &name, &path)?;
        out.insert(
            name.clone(),
            Anchor {
                identifier: name,
                angle,
                component_id: Some(component_id.to_string()),
            },
        );
    }
    Ok(())
}

fn extract_direct_anchors(
    config: &Value,
    out: &mut BTreeMap<String, Anchor>,
) -> Result<(), ValidationError> {
    let Some(anchors) = get(config, "anchors") else {
        return Ok(());
    };

    match anchors {
        Value::Mapping(_) => {
            for (name, definition) in entries(anchors) {
                let path = format!("anchors.{name}");
                if name.is_empty() {
                    return Err(ValidationError::framework(
                        "anchor name must be a non-empty string",
                        "anchors",
                    ));
                }
                let anchor = anchor_from_definition(Some(name), definition, &path)?;
                out.insert(anchor.identifier.clone(), anchor);
            }
        }
        Value::Sequence(items) => {
            for (index, definition) in items.iter().enumerate() {
                let path = format!("anchors[{index}]");
                let anchor = anchor_from_definition(None, definition, &path)?;
                out.insert(anchor.identifier.clone(), anchor);
            }
        }
        _ => {
            return Err(ValidationError::framework(
                "`anchors` must be a mapping or a sequence",
                "anchors",
            ))
        }
    }
    Ok(())
}

fn extract_axis_anchors(
    config: &Value,
    out: &mut BTreeMap<String, Anchor>,
) -> Result<(), ValidationError> {
    let Some(axes) = get(config, "axes") else {
        return Ok(());
    };

    for (axis_name, definition) in entries(axes) {
        // Hybrid axes reference the registry by ID; nothing to extract here.
        if get(definition, "anchor_ids").is_some() {
            continue;
        }
        // Legacy axes embed anchors under arbitrary organizational
        // sub-labels; a sub-value is an anchor iff it is a mapping with a
        // `name` key. The anchor is filed under its own name.
        for (sub_label, sub_value) in entries(definition) {
            if sub_value.is_mapping() && get(sub_value, "name").is_some() {
                let path = format!("axes.{axis_name}.{sub_label}");
                let anchor = anchor_from_definition(None, sub_value, &path)?;
                out.insert(anchor.identifier.clone(), anchor);
            }
        }
    }
    Ok(())
}

fn extract_arc_anchors(
    config: &Value,
    out: &mut BTreeMap<String, Anchor>,
) -> Result<(), ValidationError> {
    let Some(arcs) = get(config, "arcs") else {
        return Ok(());
    };

    for (arc_name, definition) in entries(arcs) {
        let Some(arc_anchors) = get(definition, "anchors") else {
            continue;
        };
        match arc_anchors {
            Value::Mapping(_) => {
                for (name, sub) in entries(arc_anchors) {
                    let path = format!("arcs.{arc_name}.anchors.{name}");
                    let anchor = anchor_from_definition(Some(name), sub, &path)?;
                    out.insert(anchor.identifier.clone(), anchor);
                }
            }
            Value::Sequence(items) => {
                for (index, sub) in items.iter().enumerate() {
                    let path = format!("arcs.{arc_name}.anchors[{index}]");
                    let anchor = anchor_from_definition(None, sub, &path)?;
                    out.insert(anchor.identifier.clone(), anchor);
                }
            }
            _ => {
                return Err(ValidationError::framework_entity(
                    "arc `anchors` must be a mapping or a sequence",
                    arc_name,
                    format!("arcs.{arc_name}.anchors"),
                ))
            }
        }
    }
    Ok(())
}

/// Build an anchor from a definition mapping (or bare null for key-only
/// mapping entries). Identity is `name`, falling back to `component_id`.
fn anchor_from_definition(
    key_name: Option<&str>,
    definition: &Value,
    path: &str,
) -> Result<Anchor, ValidationError> {
    if definition.is_null() {
        // A bare `anchor_name:` entry in a mapping-form anchors section.
        let name = key_name.ok_or_else(|| {
            ValidationError::framework("anchor must define `name` or `component_id`", path)
        })?;
        return Ok(Anchor {
            identifier: name.to_string(),
            angle: None,
            component_id: None,
        });
    }

    if !definition.is_mapping() {
        return Err(ValidationError::framework(
            "anchor definition must be a mapping",
            path,
        ));
    }

    let explicit_name = match get(definition, "name") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(_) => {
            return Err(ValidationError::framework(
                "anchor `name` must be a non-empty string",
                format!("{path}.name"),
            ))
        }
        None => None,
    };

    let component_id = match get(definition, "component_id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(_) => {
            return Err(ValidationError::framework(
                "anchor `component_id` must be a non-empty string",
                format!("{path}.component_id"),
            ))
        }
        None => None,
    };

    let identifier = explicit_name
        .or_else(|| key_name.map(str::to_string))
        .or_else(|| component_id.clone())
        .ok_or_else(|| {
            ValidationError::framework("anchor must define `name` or `component_id`", path)
        })?;

    let angle = parse_angle(definition, &identifier, path)?;

    Ok(Anchor {
        identifier,
        angle,
        component_id,
    })
}

fn parse_angle(
    definition: &Value,
    entity: &str,
    path: &str,
) -> Result<Option<f64>, ValidationError> {
    let Some(raw) = get(definition, "angle") else {
        return Ok(None);
    };
    let angle = as_number(raw).ok_or_else(|| {
        ValidationError::framework_entity(
            "anchor `angle` must be a number",
            entity,
            format!("{path}.angle"),
        )
    })?;
    if !(0.0..360.0).contains(&angle) {
        return Err(ValidationError::framework_entity(
            format!("anchor `angle` must be in [0, 360), got {angle}"),
            entity,
            format!("{path}.angle"),
        ));
    }
    Ok(Some(angle))
}

// =============================================================================
// Polar constraint
// =============================================================================

/// Strict per-axis check that every axis is a true bipolar scale, returning
/// the resolved axis list in document order.
fn check_polar_constraint(config: &Value) -> Result<Vec<AxisSpec>, ValidationError> {
    let Some(axes) = get(config, "axes") else {
        return Ok(Vec::new());
    };

    if !axes.is_mapping() {
        return Err(ValidationError::framework(
            "`axes` must be a mapping",
            "axes",
        ));
    }

    let mut specs = Vec::new();
    for (axis_name, definition) in entries(axes) {
        let path = format!("axes.{axis_name}");
        if !definition.is_mapping() {
            return Err(ValidationError::framework_entity(
                "axis definition must be a mapping",
                axis_name,
                path,
            ));
        }

        let anchor_ids: Vec<String> = match get(definition, "anchor_ids") {
            Some(Value::Sequence(ids)) => {
                let mut resolved = Vec::with_capacity(ids.len());
                for id in ids {
                    match id.as_str() {
                        Some(s) if !s.is_empty() => resolved.push(s.to_string()),
                        _ => {
                            return Err(ValidationError::framework_entity(
                                "axis `anchor_ids` entries must be non-empty strings",
                                axis_name,
                                format!("{path}.anchor_ids"),
                            ))
                        }
                    }
                }
                resolved
            }
            Some(_) => {
                return Err(ValidationError::framework_entity(
                    "axis `anchor_ids` must be a sequence",
                    axis_name,
                    format!("{path}.anchor_ids"),
                ))
            }
            // Legacy form: embedded anchors under arbitrary sub-labels.
            None => entries(definition)
                .filter(|(_, v)| v.is_mapping() && get(v, "name").is_some())
                .filter_map(|(_, v)| get_str(v, "name").map(str::to_string))
                .collect(),
        };

        if anchor_ids.len() != 2 {
            return Err(ValidationError::framework_entity(
                format!(
                    "POLAR CONSTRAINT VIOLATION: axis `{axis_name}` has {} anchors \
                     (exactly 2 required)",
                    anchor_ids.len()
                ),
                axis_name,
                path,
            ));
        }

        let mut ids = anchor_ids.into_iter();
        specs.push(AxisSpec {
            name: axis_name.to_string(),
            anchor_ids: [
                ids.next().unwrap_or_default(),
                ids.next().unwrap_or_default(),
            ],
        });
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn hybrid_framework_validates_with_two_anchors() {
        let config = yaml(
            r#"
name: populism
version: v3.2
components:
  people_centrism:
    type: anchor
    angle: 0
  elite_hostility:
    type: anchor
    angle: 180
axes:
  populism_axis:
    anchor_ids: [people_centrism, elite_hostility]
"#,
        );
        let framework = validate_framework(&config, None).unwrap();
        assert_eq!(framework.anchor_count(), 2);
        assert_eq!(framework.axes.len(), 1);
        assert_eq!(
            framework.axes[0].anchor_ids,
            ["people_centrism".to_string(), "elite_hostility".to_string()]
        );
    }

    #[test]
    fn three_anchor_axis_violates_polar_constraint() {
        let config = yaml(
            r#"
name: broken
version: v3.2
components:
  x: { type: anchor }
  y: { type: anchor }
  z: { type: anchor }
axes:
  a:
    anchor_ids: [x, y, z]
"#,
        );
        let err = validate_framework(&config, None).unwrap_err();
        assert!(err.message().contains("POLAR CONSTRAINT VIOLATION"));
        assert!(err.message().contains("3 anchors"));
        assert_eq!(err.field_path(), "axes.a");
    }

    #[test]
    fn legacy_embedded_axes_extract_and_satisfy_polar() {
        let config = yaml(
            r#"
name: legacy
version: "3.2"
axes:
  tone:
    positive_pole:
      name: hopeful
      angle: 90
    negative_pole:
      name: fearful
      angle: 270
"#,
        );
        let framework = validate_framework(&config, None).unwrap();
        assert_eq!(framework.anchor_count(), 2);
        assert!(framework.anchors.contains_key("hopeful"));
        assert_eq!(framework.anchors["fearful"].angle, Some(270.0));
        assert_eq!(
            framework.axes[0].anchor_ids,
            ["hopeful".to_string(), "fearful".to_string()]
        );
    }

    #[test]
    fn legacy_axis_with_one_embedded_anchor_fails() {
        let config = yaml(
            r#"
name: lopsided
version: v3.2
axes:
  tone:
    only_pole:
      name: hopeful
    notes: not an anchor
"#,
        );
        let err = validate_framework(&config, None).unwrap_err();
        assert!(err.message().contains("POLAR CONSTRAINT VIOLATION"));
        assert!(err.message().contains("1 anchors"));
    }

    #[test]
    fn axis_poles_referencing_component_ids_resolve_to_anchor_names() {
        let config = yaml(
            r#"
name: populism
version: v3.2
components:
  pc_anchor:
    type: anchor
    name: people_centrism
    angle: 0
  eh_anchor:
    type: anchor
    name: elite_hostility
    angle: 180
axes:
  populism_axis:
    anchor_ids: [pc_anchor, eh_anchor]
"#,
        );
        let framework = validate_framework(&config, None).unwrap();
        assert_eq!(
            framework.axes[0].anchor_ids,
            ["people_centrism".to_string(), "elite_hostility".to_string()]
        );
        assert!(framework.anchors.contains_key("people_centrism"));
        assert_eq!(
            framework.anchors["people_centrism"].component_id.as_deref(),
            Some("pc_anchor")
        );
    }

    #[test]
    fn unresolvable_axis_poles_are_left_untouched() {
        let config = yaml(
            r#"
name: dangling
version: v3.2
components:
  unity: { type: anchor }
axes:
  main:
    anchor_ids: [unity, phantom]
"#,
        );
        let framework = validate_framework(&config, None).unwrap();
        assert_eq!(
            framework.axes[0].anchor_ids,
            ["unity".to_string(), "phantom".to_string()]
        );
    }

    #[test]
    fn rejects_unsupported_version() {
        let config = yaml("name: old\nversion: v3.1\nanchors:\n  a: {angle: 10}\n");
        let err = validate_framework(&config, None).unwrap_err();
        assert_eq!(err.field_path(), "version");
        assert!(err.message().contains("v3.1"));
    }

    #[test]
    fn rejects_missing_positioning_sections() {
        let config = yaml("name: hollow\nversion: v3.2\ndescription: nothing positional\n");
        let err = validate_framework(&config, None).unwrap_err();
        assert!(err.message().contains("at least one of"));
    }

    #[test]
    fn rejects_non_mapping_input() {
        let err = validate_framework(&yaml("- a\n- b\n"), Some("listy")).unwrap_err();
        assert_eq!(err.entity(), Some("listy"));
    }

    #[test]
    fn rejects_angle_out_of_range() {
        let config = yaml("name: f\nversion: v3.2\nanchors:\n  a: {angle: 360}\n");
        let err = validate_framework(&config, None).unwrap_err();
        assert!(err.message().contains("[0, 360)"));
    }

    #[test]
    fn rejects_non_numeric_angle() {
        let config = yaml("name: f\nversion: v3.2\nanchors:\n  a: {angle: north}\n");
        let err = validate_framework(&config, None).unwrap_err();
        assert!(err.message().contains("must be a number"));
    }

    #[test]
    fn rejects_anchor_without_identity() {
        let config = yaml("name: f\nversion: v3.2\nanchors:\n  - angle: 10\n");
        let err = validate_framework(&config, None).unwrap_err();
        assert!(err.message().contains("`name` or `component_id`"));
    }

    #[test]
    fn later_sections_overwrite_earlier_anchors() {
        // components defines `unity` at 0°, the direct anchors section
        // redefines it at 45° — last-wins, not an error.
        let config = yaml(
            r#"
name: merged
version: v3.2
components:
  unity: { type: anchor, angle: 0 }
anchors:
  unity: { angle: 45 }
"#,
        );
        let framework = validate_framework(&config, None).unwrap();
        assert_eq!(framework.anchor_count(), 1);
        assert_eq!(framework.anchors["unity"].angle, Some(45.0));
        assert_eq!(framework.anchors["unity"].component_id, None);
    }

    #[test]
    fn non_anchor_components_do_not_contribute() {
        let config = yaml(
            r#"
name: typed
version: v3.2
components:
  unity: { type: anchor }
  trend: { type: derived_metric }
"#,
        );
        let framework = validate_framework(&config, None).unwrap();
        assert_eq!(framework.anchor_count(), 1);
    }

    #[test]
    fn arc_anchors_are_extracted() {
        let config = yaml(
            r#"
name: arced
version: v3.2
arcs:
  sweep:
    anchors:
      dawn: { angle: 30 }
      dusk: { angle: 210 }
"#,
        );
        let framework = validate_framework(&config, None).unwrap();
        assert_eq!(framework.anchor_count(), 2);
        assert_eq!(framework.anchors["dawn"].angle, Some(30.0));
    }

    #[test]
    fn advanced_sections_must_be_mappings() {
        let config = yaml(
            "name: f\nversion: v3.2\nanchors:\n  a: {}\ntemporal_analysis: [not, a, map]\n",
        );
        let err = validate_framework(&config, None).unwrap_err();
        assert_eq!(err.field_path(), "temporal_analysis");
    }

    #[test]
    fn revalidating_normalized_output_is_idempotent() {
        let config = yaml(
            r#"
name: stable
version: v3.2
components:
  x: { type: anchor, angle: 10 }
  y: { type: anchor, angle: 190 }
axes:
  main:
    anchor_ids: [x, y]
"#,
        );
        let first = validate_framework(&config, None).unwrap();
        let second = validate_framework(&first.to_value(), None).unwrap();
        assert_eq!(first.anchors, second.anchors);
        assert_eq!(first.axes, second.axes);
    }
}
