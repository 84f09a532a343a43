//! JSON Schema 2020-12定義モジュール。
//!
//! モデルゲートウェイから返る生成応答との契約をJSON Schemaで定義し、
//! 実行時に検証を行います。スキーマ違反は呼び出し失敗として扱われます。

pub(crate) mod ranking;
pub(crate) mod vision;

use jsonschema::Draft;
use serde_json::Value;

/// スキーマ検証結果。
#[derive(Debug)]
pub(crate) struct ValidationResult {
    pub(crate) valid: bool,
    pub(crate) errors: Vec<String>,
}

impl ValidationResult {
    pub(crate) fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub(crate) fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// JSON Schemaでデータを検証する。
pub(crate) fn validate_json(schema_json: &Value, instance: &Value) -> ValidationResult {
    match jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema_json)
    {
        Ok(validator) => {
            let errors: Vec<String> = validator
                .iter_errors(instance)
                .map(|error| error.to_string())
                .collect();
            if errors.is_empty() {
                ValidationResult::valid()
            } else {
                ValidationResult::invalid(errors)
            }
        }
        Err(error) => ValidationResult::invalid(vec![format!("schema compilation error: {error}")]),
    }
}

/// 生成応答テキストをJSONオブジェクトとしてパースする。
/// コードフェンス付きで返ってくるモデル出力も許容する。
pub(crate) fn parse_response_object(payload: &str) -> Option<Value> {
    let trimmed = payload.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map_or(trimmed, |rest| rest.trim_end_matches("```"));

    serde_json::from_str::<Value>(stripped.trim())
        .ok()
        .filter(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_json_accepts_valid_data() {
        let schema = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "price": { "type": "number" }
            },
            "required": ["name"]
        });

        let instance = json!({ "name": "Spring Rolls", "price": 6.5 });

        let result = validate_json(&schema, &instance);
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn validate_json_rejects_missing_required_field() {
        let schema = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        });

        let result = validate_json(&schema, &json!({ "price": 6.5 }));
        assert!(!result.valid);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn parse_response_object_strips_code_fences() {
        let payload = "```json\n{\"is_menu\": true, \"confidence\": 0.9, \"reason\": \"ok\"}\n```";
        let value = parse_response_object(payload).expect("fenced JSON should parse");
        assert_eq!(value["is_menu"], json!(true));
    }

    #[test]
    fn parse_response_object_rejects_non_object() {
        assert!(parse_response_object("[1, 2, 3]").is_none());
        assert!(parse_response_object("not json at all").is_none());
    }
}
