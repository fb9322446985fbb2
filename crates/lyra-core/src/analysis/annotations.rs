//! UniProt entry annotations used to cross-check reasoning.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_GO_TERMS: usize = 10;
const MAX_FEATURES_SCANNED: usize = 10;
const FEATURE_TYPES: [&str; 4] = ["Domain", "Binding site", "Active site", "Region"];

/// Annotations extracted from a UniProtKB JSON entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniProtAnnotations {
    pub uniprot_id: String,
    pub protein_name: String,
    pub organism: String,
    pub function: String,
    pub subcellular_location: Vec<String>,
    /// `GO:xxxxxxx: term` strings.
    pub go_terms: Vec<String>,
    /// `Type (start-end): description` strings.
    pub features: Vec<String>,
    pub disease_associations: Vec<String>,
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn array_at<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn comments_of<'a>(entry: &'a Value, kind: &'a str) -> impl Iterator<Item = &'a Value> {
    array_at(entry, "comments")
        .iter()
        .filter(move |c| c.get("commentType").and_then(Value::as_str) == Some(kind))
}

/// Renders a location bound, which may be a number or missing.
fn bound(feature: &Value, pointer: &str) -> String {
    match feature.pointer(pointer) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => "?".to_string(),
    }
}

impl UniProtAnnotations {
    pub fn from_entry(uniprot_id: &str, entry: &Value) -> Self {
        let function = comments_of(entry, "FUNCTION")
            .find_map(|c| c.pointer("/texts/0/value").and_then(Value::as_str))
            .unwrap_or("No function annotation available")
            .to_string();

        let mut subcellular_location: Vec<String> = comments_of(entry, "SUBCELLULAR LOCATION")
            .flat_map(|c| array_at(c, "subcellularLocations"))
            .filter_map(|loc| str_at(loc, "/location/value"))
            .map(str::to_string)
            .collect();
        if subcellular_location.is_empty() {
            subcellular_location.push("Unknown".to_string());
        }

        let go_terms = array_at(entry, "uniProtKBCrossReferences")
            .iter()
            .filter(|r| r.get("database").and_then(Value::as_str) == Some("GO"))
            .filter_map(|r| {
                let id = r.get("id").and_then(Value::as_str).unwrap_or("");
                array_at(r, "properties")
                    .iter()
                    .find(|p| p.get("key").and_then(Value::as_str) == Some("GoTerm"))
                    .and_then(|p| p.get("value").and_then(Value::as_str))
                    .filter(|term| !term.is_empty())
                    .map(|term| format!("{}: {}", id, term))
            })
            .take(MAX_GO_TERMS)
            .collect();

        let features = array_at(entry, "features")
            .iter()
            .take(MAX_FEATURES_SCANNED)
            .filter_map(|f| {
                let kind = f.get("type").and_then(Value::as_str)?;
                if !FEATURE_TYPES.contains(&kind) {
                    return None;
                }
                let description = f.get("description").and_then(Value::as_str).unwrap_or("");
                Some(format!(
                    "{} ({}-{}): {}",
                    kind,
                    bound(f, "/location/start/value"),
                    bound(f, "/location/end/value"),
                    description
                ))
            })
            .collect();

        let disease_associations = comments_of(entry, "DISEASE")
            .filter_map(|c| str_at(c, "/disease/diseaseId"))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            uniprot_id: uniprot_id.to_string(),
            protein_name: str_at(entry, "/proteinDescription/recommendedName/fullName/value")
                .unwrap_or("Unknown")
                .to_string(),
            organism: str_at(entry, "/organism/scientificName")
                .unwrap_or("Unknown")
                .to_string(),
            function,
            subcellular_location,
            go_terms,
            features,
            disease_associations,
        }
    }

    /// Context block handed to the critique prompt.
    pub fn to_context(&self) -> String {
        let diseases = if self.disease_associations.is_empty() {
            "None listed".to_string()
        } else {
            self.disease_associations.join(", ")
        };
        let first_five = |items: &[String]| {
            items.iter().take(5).cloned().collect::<Vec<_>>().join("; ")
        };
        format!(
            "UNIPROT ANNOTATIONS:\n\
             - Protein name: {}\n\
             - Function: {}\n\
             - Subcellular location: {}\n\
             - GO terms: {}\n\
             - Known features: {}\n\
             - Disease associations: {}\n",
            self.protein_name,
            self.function,
            self.subcellular_location.join(", "),
            first_five(&self.go_terms),
            first_five(&self.features),
            diseases
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> Value {
        json!({
            "primaryAccession": "P04637",
            "proteinDescription": {"recommendedName": {"fullName": {"value": "Cellular tumor antigen p53"}}},
            "organism": {"scientificName": "Homo sapiens"},
            "comments": [
                {"commentType": "FUNCTION", "texts": [{"value": "Acts as a tumor suppressor."}]},
                {"commentType": "SUBCELLULAR LOCATION", "subcellularLocations": [
                    {"location": {"value": "Cytoplasm"}},
                    {"location": {"value": "Nucleus"}}
                ]},
                {"commentType": "DISEASE", "disease": {"diseaseId": "Li-Fraumeni syndrome"}}
            ],
            "uniProtKBCrossReferences": [
                {"database": "GO", "id": "GO:0005634", "properties": [{"key": "GoTerm", "value": "C:nucleus"}]},
                {"database": "PDB", "id": "1TUP"}
            ],
            "features": [
                {"type": "Domain", "description": "p53 DNA-binding", "location": {"start": {"value": 94}, "end": {"value": 292}}},
                {"type": "Chain", "description": "p53"},
                {"type": "Binding site", "description": "Zn", "location": {"start": {"value": 176}}}
            ]
        })
    }

    #[test]
    fn test_extracts_annotations() {
        let annotations = UniProtAnnotations::from_entry("P04637", &entry());
        assert_eq!(annotations.protein_name, "Cellular tumor antigen p53");
        assert_eq!(annotations.function, "Acts as a tumor suppressor.");
        assert_eq!(annotations.subcellular_location, vec!["Cytoplasm", "Nucleus"]);
        assert_eq!(annotations.go_terms, vec!["GO:0005634: C:nucleus"]);
        assert_eq!(
            annotations.features,
            vec!["Domain (94-292): p53 DNA-binding", "Binding site (176-?): Zn"]
        );
        assert_eq!(annotations.disease_associations, vec!["Li-Fraumeni syndrome"]);
    }

    #[test]
    fn test_empty_entry_defaults() {
        let annotations = UniProtAnnotations::from_entry("Q8I3H7", &json!({}));
        assert_eq!(annotations.protein_name, "Unknown");
        assert_eq!(annotations.function, "No function annotation available");
        assert_eq!(annotations.subcellular_location, vec!["Unknown"]);
        assert!(annotations.to_context().contains("Disease associations: None listed"));
    }
}
