//! Plan schema checks.
//!
//! A plan is untrusted planner output. It has to match
//! `schema/plan.schema.json` before it is deserialised, and every violation
//! names the plan field it concerns, e.g. `uniprot_ids[3]`.

use jsonschema::Validator;
use lazy_static::lazy_static;
use serde_json::Value;
use std::fmt;

const PLAN_SCHEMA: &str = include_str!("../../../../schema/plan.schema.json");

lazy_static! {
    static ref PLAN_VALIDATOR: Result<Validator, String> =
        serde_json::from_str::<Value>(PLAN_SCHEMA)
            .map_err(|e| format!("plan schema is not valid JSON: {}", e))
            .and_then(|schema| {
                jsonschema::validator_for(&schema)
                    .map_err(|e| format!("plan schema does not compile: {}", e))
            });
}

/// One way in which a plan fails the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Offending field, `plan` when the document as a whole is at fault.
    pub field: String,
    pub message: String,
}

impl SchemaViolation {
    fn whole_plan(message: impl Into<String>) -> Self {
        Self {
            field: "plan".to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// `/uniprot_ids/3` -> `uniprot_ids[3]`, `` -> `plan`.
fn field_name(pointer: &str) -> String {
    let mut field = String::new();
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        if segment.bytes().all(|b| b.is_ascii_digit()) {
            field.push('[');
            field.push_str(segment);
            field.push(']');
        } else {
            if !field.is_empty() {
                field.push('.');
            }
            field.push_str(segment);
        }
    }
    if field.is_empty() {
        "plan".to_string()
    } else {
        field
    }
}

/// Check a plan document against the embedded schema.
pub fn validate_plan_schema(plan: &Value) -> Result<(), Vec<SchemaViolation>> {
    let validator = PLAN_VALIDATOR
        .as_ref()
        .map_err(|e| vec![SchemaViolation::whole_plan(e.clone())])?;

    let violations: Vec<SchemaViolation> = validator
        .iter_errors(plan)
        .map(|e| SchemaViolation {
            field: field_name(&e.instance_path.to_string()),
            message: e.to_string(),
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(plan: Value) -> Vec<String> {
        validate_plan_schema(&plan)
            .unwrap_err()
            .into_iter()
            .map(|v| v.field)
            .collect()
    }

    #[test]
    fn test_complete_plan_passes() {
        let plan = json!({
            "uniprot_ids": ["Q8I3H7"],
            "analysis_type": "drug_target",
            "focus_areas": ["druggability"],
            "requires_full_pipeline": true,
            "reasoning": "single target"
        });
        assert!(validate_plan_schema(&plan).is_ok());
    }

    #[test]
    fn test_missing_ids_blame_the_plan() {
        let violations = validate_plan_schema(&json!({ "requires_full_pipeline": true })).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "plan");
        assert!(violations[0].message.contains("uniprot_ids"));
    }

    #[test]
    fn test_wrong_types_name_their_fields() {
        let mut found = fields(json!({
            "uniprot_ids": "Q8I3H7",
            "requires_full_pipeline": "yes"
        }));
        found.sort();
        assert_eq!(found, vec!["requires_full_pipeline", "uniprot_ids"]);
    }

    #[test]
    fn test_bad_list_entry_names_its_index() {
        let long_id = "Q".repeat(33);
        let violations = validate_plan_schema(&json!({ "uniprot_ids": ["P69905", long_id] })).unwrap_err();
        assert_eq!(violations[0].field, "uniprot_ids[1]");
        assert!(violations[0].to_string().starts_with("uniprot_ids[1]: "));
    }

    #[test]
    fn test_unknown_analysis_type_fails() {
        assert_eq!(
            fields(json!({ "uniprot_ids": [], "analysis_type": "vibes" })),
            vec!["analysis_type"]
        );
    }

    #[test]
    fn test_planner_extras_are_tolerated() {
        let plan = json!({ "uniprot_ids": [], "error": "Failed to parse plan" });
        assert!(validate_plan_schema(&plan).is_ok());
    }

    #[test]
    fn test_field_name_rendering() {
        assert_eq!(field_name(""), "plan");
        assert_eq!(field_name("/focus_areas/0"), "focus_areas[0]");
        assert_eq!(field_name("/reasoning"), "reasoning");
    }
}
