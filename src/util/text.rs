//! テキスト整形ユーティリティ。

/// 説明文を最大 `max_chars` 文字に切り詰める（文字単位、バイト境界を壊さない）。
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}…")
}
