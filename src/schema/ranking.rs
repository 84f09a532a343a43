//! 予算制約付きランキング応答のJSON Schema定義。
//!
//! スキーマ違反はランキング呼び出しのハード失敗として扱い、
//! 決定的な貪欲フォールバックに切り替える。

use once_cell::sync::Lazy;
use serde_json::{Value, json};

/// ランキング応答のJSON Schema。
pub(crate) static RANKING_RESPONSE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Budget Ranking Response",
        "type": "object",
        "properties": {
            "picks": {
                "type": "array",
                "items": { "$ref": "#/$defs/pick" },
                "maxItems": 50
            },
            "filtered_out": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "minLength": 1, "maxLength": 200 },
                        "reason": { "type": "string", "maxLength": 500 }
                    },
                    "required": ["name", "reason"]
                },
                "maxItems": 200
            },
            "est_total": { "type": "number", "minimum": 0 },
            "notes": { "type": "string", "maxLength": 2000 },
            "relaxed_hard": { "type": "boolean" },
            "calorie_relaxed": { "type": "boolean" }
        },
        "required": ["picks", "filtered_out", "est_total", "notes"],
        "$defs": {
            "pick": {
                "type": "object",
                "properties": {
                    "name": { "type": "string", "minLength": 1, "maxLength": 200 },
                    "quantity": { "type": "integer", "minimum": 1, "maximum": 20 },
                    "reason": { "type": "string", "maxLength": 500 }
                },
                "required": ["name", "quantity"]
            }
        }
    })
});

/// バックフィル応答のJSON Schema。追加ピックの列挙のみを許す。
pub(crate) static BACKFILL_RESPONSE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Backfill Response",
        "type": "object",
        "properties": {
            "picks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "minLength": 1, "maxLength": 200 },
                        "quantity": { "type": "integer", "minimum": 1, "maximum": 20 },
                        "reason": { "type": "string", "maxLength": 500 }
                    },
                    "required": ["name", "quantity"]
                },
                "maxItems": 20
            }
        },
        "required": ["picks"]
    })
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate_json;

    #[test]
    fn ranking_schema_accepts_complete_response() {
        let instance = json!({
            "picks": [{ "name": "Fried Rice", "quantity": 1, "reason": "filling" }],
            "filtered_out": [{ "name": "Kung Pao Chicken", "reason": "over budget" }],
            "est_total": 11.0,
            "notes": "kept under budget"
        });
        assert!(validate_json(&RANKING_RESPONSE_SCHEMA, &instance).valid);
    }

    #[test]
    fn ranking_schema_rejects_zero_quantity() {
        let instance = json!({
            "picks": [{ "name": "Fried Rice", "quantity": 0 }],
            "filtered_out": [],
            "est_total": 0.0,
            "notes": ""
        });
        assert!(!validate_json(&RANKING_RESPONSE_SCHEMA, &instance).valid);
    }

    #[test]
    fn ranking_schema_rejects_missing_notes() {
        let instance = json!({
            "picks": [],
            "filtered_out": [],
            "est_total": 0.0
        });
        assert!(!validate_json(&RANKING_RESPONSE_SCHEMA, &instance).valid);
    }
}
