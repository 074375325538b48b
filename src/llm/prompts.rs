//! Prompt text and response schemas for model-backed extraction.

use serde_json::{json, Map, Value};

use crate::models::HoldingsRecord;

pub const SYSTEM_PROMPT: &str = "You are an expert at reading SEC Form 13F information tables. \
Extract every holding row exactly as filed. Do not invent rows, do not merge rows, \
and skip header, subtotal and total lines. Numbers must be plain integers without \
separators. Use an empty string for missing text fields and 0 for missing numbers.";

/// User prompt wrapping one text chunk.
pub fn extraction_prompt(chunk: &str) -> String {
    format!(
        "Extract the holdings from the following 13F information table text. \
Return an object with a single key \"result\" holding one entry per row.\n\n\
Field guide:\n\
- name_of_issuer, title_of_class, cusip, figi: text as printed\n\
- value: market value column as an integer, in the units the table uses\n\
- shares_or_principal_amount: share or principal count\n\
- shares_or_principal_type: SH or PRN\n\
- put_call: PUT, CALL or empty\n\
- investment_discretion: SOLE, DFND or OTR\n\
- other_manager: other manager numbers as printed\n\
- voting_sole, voting_shared, voting_none: voting authority columns\n\n\
TEXT:\n{}",
        chunk
    )
}

fn is_numeric(field: &str) -> bool {
    HoldingsRecord::NUMERIC_FIELDS.contains(&field)
}

/// JSON Schema for OpenAI structured outputs (`strict` mode).
pub fn openai_schema() -> Value {
    let mut properties = Map::new();
    for field in HoldingsRecord::FIELDS {
        let ty = if is_numeric(field) { "integer" } else { "string" };
        properties.insert(field.to_string(), json!({ "type": ty }));
    }

    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["result"],
        "properties": {
            "result": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": HoldingsRecord::FIELDS,
                    "properties": properties,
                }
            }
        }
    })
}

/// Response schema in Gemini's OpenAPI subset.
pub fn gemini_schema() -> Value {
    let mut properties = Map::new();
    for field in HoldingsRecord::FIELDS {
        let ty = if is_numeric(field) { "INTEGER" } else { "STRING" };
        properties.insert(field.to_string(), json!({ "type": ty }));
    }

    json!({
        "type": "OBJECT",
        "required": ["result"],
        "properties": {
            "result": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "required": HoldingsRecord::FIELDS,
                    "propertyOrdering": HoldingsRecord::FIELDS,
                    "properties": properties,
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_schema_is_strict() {
        let schema = openai_schema();
        let items = &schema["properties"]["result"]["items"];
        assert_eq!(items["additionalProperties"], json!(false));
        assert_eq!(items["required"].as_array().unwrap().len(), 13);
        assert_eq!(items["properties"]["value"]["type"], "integer");
        assert_eq!(items["properties"]["cusip"]["type"], "string");
    }

    #[test]
    fn test_gemini_schema_types() {
        let schema = gemini_schema();
        let items = &schema["properties"]["result"]["items"];
        assert_eq!(items["properties"]["voting_none"]["type"], "INTEGER");
        assert_eq!(items["properties"]["put_call"]["type"], "STRING");
    }

    #[test]
    fn test_prompt_embeds_chunk() {
        let prompt = extraction_prompt("APPLE INC | 037833100");
        assert!(prompt.ends_with("APPLE INC | 037833100"));
    }
}
