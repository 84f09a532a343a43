use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;

/// エラーメッセージの最大長
pub(crate) const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

/// エラーメッセージを要約して切り詰める。
pub(crate) fn truncate_error_message(msg: &str) -> String {
    let char_count = msg.chars().count();
    if char_count <= MAX_ERROR_MESSAGE_LENGTH {
        return msg.to_string();
    }
    let truncated: String = msg.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect();
    format!("{truncated}... (truncated, {char_count} chars)")
}

/// 応答フォーマット指定。パイプラインの契約検証はJSONオブジェクトモードを要求する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

/// プロンプトに添付する画像ペイロード。
#[derive(Debug, Clone, Serialize)]
pub struct ImagePayload {
    pub data_b64: String,
    pub mime_type: String,
}

impl ImagePayload {
    #[must_use]
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data_b64: STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }
}

/// 生成リクエスト。
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
    pub response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerateRequest {
    #[must_use]
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            response_format: ResponseFormat::JsonObject,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.image = Some(image);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_messages() {
        assert_eq!(truncate_error_message("boom"), "boom");
    }

    #[test]
    fn truncate_cuts_long_messages() {
        let long = "y".repeat(2000);
        let cut = truncate_error_message(&long);
        assert!(cut.len() < 600);
        assert!(cut.contains("truncated"));
    }

    #[test]
    fn image_payload_encodes_base64() {
        let payload = ImagePayload::from_bytes(b"abc", "image/jpeg");
        assert_eq!(payload.data_b64, "YWJj");
        assert_eq!(payload.mime_type, "image/jpeg");
    }
}
