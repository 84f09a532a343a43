//! 視覚系の生成呼び出し（写真判定・メニュー抽出・ガード検証）のJSON Schema定義。

use once_cell::sync::Lazy;
use serde_json::{Value, json};

/// 写真がメニューかどうかを判定する visual judge 応答のJSON Schema。
pub(crate) static JUDGE_RESPONSE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Menu Photo Judge Response",
        "type": "object",
        "properties": {
            "is_menu": {
                "type": "boolean",
                "description": "Whether the photo shows a restaurant menu"
            },
            "confidence": {
                "type": "number",
                "minimum": 0,
                "maximum": 1
            },
            "reason": {
                "type": "string",
                "maxLength": 500
            }
        },
        "required": ["is_menu", "confidence"]
    })
});

/// メニュー抽出応答のJSON Schema。
pub(crate) static MENU_RESPONSE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Menu Extraction Response",
        "type": "object",
        "properties": {
            "currency": {
                "type": "string",
                "minLength": 1,
                "maxLength": 8
            },
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "minLength": 1, "maxLength": 200 },
                        "description": { "type": "string", "maxLength": 1000 },
                        "price": { "type": "number" },
                        "category": { "type": "string", "maxLength": 100 },
                        "estimated_calories": { "type": "integer", "minimum": 0 }
                    },
                    "required": ["name", "price"]
                },
                "maxItems": 200
            }
        },
        "required": ["currency", "items"]
    })
});

/// ハード制約ガード応答のJSON Schema。違反アイテムの列挙のみを許す。
pub(crate) static GUARD_RESPONSE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "Hard Constraint Guard Response",
        "type": "object",
        "properties": {
            "violations": {
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
            }
        },
        "required": ["violations"]
    })
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate_json;

    #[test]
    fn judge_schema_accepts_minimal_verdict() {
        let instance = json!({ "is_menu": true, "confidence": 0.82 });
        assert!(validate_json(&JUDGE_RESPONSE_SCHEMA, &instance).valid);
    }

    #[test]
    fn judge_schema_rejects_out_of_range_confidence() {
        let instance = json!({ "is_menu": true, "confidence": 1.4 });
        assert!(!validate_json(&JUDGE_RESPONSE_SCHEMA, &instance).valid);
    }

    #[test]
    fn menu_schema_requires_price() {
        let instance = json!({
            "currency": "USD",
            "items": [{ "name": "Fried Rice" }]
        });
        assert!(!validate_json(&MENU_RESPONSE_SCHEMA, &instance).valid);
    }

    #[test]
    fn guard_schema_accepts_empty_violations() {
        let instance = json!({ "violations": [] });
        assert!(validate_json(&GUARD_RESPONSE_SCHEMA, &instance).valid);
    }
}
