//! Menu extraction from the chosen photo.
//!
//! The extractor never errors past this boundary: every failure tier
//! substitutes the fixed fallback menu and records which tier failed, so the
//! pipeline always proceeds with a non-empty item set.

use serde::Deserialize;
use serde_json::from_value;
use tracing::{debug, warn};

use crate::clients::{GenerateRequest, GenerativeService, ImagePayload};
use crate::pipeline::types::{MenuInfo, MenuItem};
use crate::schema::{parse_response_object, validate_json, vision::MENU_RESPONSE_SCHEMA};
use crate::util::degrade::{DegradeReason, Recovered};

/// これ未満のバイト列は写真として扱わない。
const MIN_PHOTO_BYTES: usize = 64;

#[derive(Debug, Deserialize)]
struct RawMenu {
    currency: String,
    items: Vec<RawMenuItem>,
}

#[derive(Debug, Deserialize)]
struct RawMenuItem {
    name: String,
    #[serde(default)]
    description: Option<String>,
    price: f64,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    estimated_calories: Option<u32>,
}

/// 抽出不能時に使う固定フォールバックメニュー。
#[must_use]
pub fn fallback_menu() -> MenuInfo {
    let generic = |name: &str, price: f64| MenuItem {
        name: name.to_string(),
        description: None,
        price,
        category: None,
        estimated_calories: None,
    };
    MenuInfo {
        currency: "USD".to_string(),
        items: vec![
            generic("House Special", 12.0),
            generic("Soup of the Day", 6.0),
            generic("Seasonal Vegetables", 8.0),
        ],
    }
}

/// 写真から構造化メニューを抽出する。
///
/// 4段のフォールバック階層を持つ: 入力が空 → 生成失敗/空応答 →
/// スキーマ違反 → 有効アイテムゼロ。いずれの場合もフォールバックメニューで
/// 劣化継続し、エラーは返さない。
pub async fn extract(
    generative: &dyn GenerativeService,
    generative_enabled: bool,
    bytes: &[u8],
    mime_type: &str,
) -> Recovered<MenuInfo> {
    let attempt = try_extract(generative, generative_enabled, bytes, mime_type).await;
    if let Err(reason) = attempt {
        warn!(%reason, "menu extraction degraded to fallback menu");
    }
    Recovered::from_attempt(attempt, fallback_menu)
}

async fn try_extract(
    generative: &dyn GenerativeService,
    generative_enabled: bool,
    bytes: &[u8],
    mime_type: &str,
) -> Result<MenuInfo, DegradeReason> {
    if bytes.len() < MIN_PHOTO_BYTES {
        return Err(DegradeReason::EmptyInput);
    }
    if !generative_enabled {
        return Err(DegradeReason::CallFailed);
    }

    let request = GenerateRequest::json(EXTRACTION_PROMPT)
        .with_image(ImagePayload::from_bytes(bytes, mime_type));

    let text = generative
        .generate(request)
        .await
        .map_err(|_| DegradeReason::CallFailed)?;

    if text.trim().is_empty() {
        return Err(DegradeReason::EmptyResponse);
    }

    let payload = parse_response_object(&text).ok_or(DegradeReason::UnparsableResponse)?;

    let validation = validate_json(&MENU_RESPONSE_SCHEMA, &payload);
    if !validation.valid {
        warn!(
            errors = ?validation.errors,
            "menu extraction response failed JSON Schema validation"
        );
        return Err(DegradeReason::UnparsableResponse);
    }

    let raw: RawMenu = from_value(payload).map_err(|_| DegradeReason::UnparsableResponse)?;

    // 価格の付かないアイテムは有効性判定の前に落とす。
    let items: Vec<MenuItem> = raw
        .items
        .into_iter()
        .filter(|item| item.price > 0.0)
        .map(|item| MenuItem {
            name: item.name,
            description: item.description,
            price: item.price,
            category: item.category,
            estimated_calories: item.estimated_calories,
        })
        .collect();

    if items.is_empty() {
        return Err(DegradeReason::NoValidItems);
    }

    debug!(item_count = items.len(), currency = %raw.currency, "menu extracted");

    Ok(MenuInfo {
        currency: raw.currency,
        items,
    })
}

const EXTRACTION_PROMPT: &str = "Extract every dish from this restaurant menu photo. Respond \
with a JSON object: {\"currency\": string, \"items\": [{\"name\": string, \"description\": \
string (optional), \"price\": number, \"category\": string (optional), \"estimated_calories\": \
integer (optional)}]}. Use the currency symbol printed on the menu; prices must be plain \
numbers. Skip decorative text and section headers. Respond with JSON only.";

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;

    struct OneShot(Result<String>);

    #[async_trait]
    impl GenerativeService for OneShot {
        async fn generate(&self, _request: GenerateRequest) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(error) => Err(anyhow!("{error}")),
            }
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn photo_bytes() -> Vec<u8> {
        vec![0xFFu8; 256]
    }

    #[tokio::test]
    async fn tiny_input_degrades_without_calling_generative() {
        let service = OneShot(Err(anyhow!("must not be called")));
        let result = extract(&service, true, &[0u8; 10], "image/jpeg").await;

        assert_eq!(result.reason(), Some(DegradeReason::EmptyInput));
        assert_eq!(result.value().items.len(), 3);
    }

    #[tokio::test]
    async fn call_failure_degrades_to_fallback() {
        let service = OneShot(Err(anyhow!("gateway down")));
        let result = extract(&service, true, &photo_bytes(), "image/jpeg").await;

        assert_eq!(result.reason(), Some(DegradeReason::CallFailed));
        assert!(!result.value().items.is_empty());
    }

    #[tokio::test]
    async fn empty_response_degrades() {
        let service = OneShot(Ok("   ".to_string()));
        let result = extract(&service, true, &photo_bytes(), "image/jpeg").await;

        assert_eq!(result.reason(), Some(DegradeReason::EmptyResponse));
    }

    #[tokio::test]
    async fn schema_violation_degrades() {
        let service = OneShot(Ok(r#"{"items": [{"name": "x", "price": 1.0}]}"#.to_string()));
        let result = extract(&service, true, &photo_bytes(), "image/jpeg").await;

        assert_eq!(result.reason(), Some(DegradeReason::UnparsableResponse));
    }

    #[tokio::test]
    async fn zero_priced_items_are_dropped_and_empty_menu_degrades() {
        let service = OneShot(Ok(
            r#"{"currency": "USD", "items": [{"name": "Water", "price": 0.0}]}"#.to_string(),
        ));
        let result = extract(&service, true, &photo_bytes(), "image/jpeg").await;

        assert_eq!(result.reason(), Some(DegradeReason::NoValidItems));
    }

    #[tokio::test]
    async fn valid_menu_passes_through() {
        let service = OneShot(Ok(r#"{
            "currency": "USD",
            "items": [
                {"name": "Spring Rolls", "price": 6.5},
                {"name": "Free Sample", "price": 0.0},
                {"name": "Fried Rice", "description": "wok-fried", "price": 11.0}
            ]
        }"#
        .to_string()));
        let result = extract(&service, true, &photo_bytes(), "image/jpeg").await;

        assert!(!result.is_degraded());
        let menu = result.value();
        assert_eq!(menu.items.len(), 2);
        assert_eq!(menu.items[0].name, "Spring Rolls");
    }

    #[tokio::test]
    async fn disabled_generative_path_uses_fallback() {
        let service = OneShot(Err(anyhow!("must not be called")));
        let result = extract(&service, false, &photo_bytes(), "image/jpeg").await;

        assert_eq!(result.reason(), Some(DegradeReason::CallFailed));
        assert_eq!(result.value(), &fallback_menu());
    }
}
