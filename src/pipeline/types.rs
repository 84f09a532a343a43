//! Domain types flowing through the recommendation funnel.

use serde::{Deserialize, Serialize};

/// レコメンド1回分のリクエストで生成され、選定後に破棄される写真候補。
/// 永続化されない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoCandidate {
    pub id: String,
    pub width_px: u32,
    pub height_px: u32,
    #[serde(default)]
    pub attribution: Vec<String>,
    pub source_url: String,
    /// OCR 前処理が有効な場合のみ供給される生テキスト。
    #[serde(default)]
    pub ocr_text: Option<String>,
}

/// ヒューリスティックスコアの内訳。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreComponents {
    pub base: i32,
    pub aspect: i32,
    pub attribution: i32,
    pub ocr_price: i32,
    pub ocr_keyword: i32,
}

impl ScoreComponents {
    #[must_use]
    pub fn sum(&self) -> i32 {
        self.base + self.aspect + self.attribution + self.ocr_price + self.ocr_keyword
    }
}

/// 写真候補のメニューらしさスコア。`total` は [0, 100] にクランプされる。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoScore {
    pub candidate_id: String,
    pub total: u8,
    pub components: ScoreComponents,
}

/// スコア付きの写真候補（ファンネルの shortlist 用）。
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub candidate: PhotoCandidate,
    pub score: PhotoScore,
}

/// 抽出済みの単一料理。`price > 0` のもののみ抽出段を通過する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_calories: Option<u32>,
}

impl MenuItem {
    /// ハードフィルタが走査する正規化済みテキスト（名前 + 説明、小文字）。
    #[must_use]
    pub fn filter_text(&self) -> String {
        let description = self.description.as_deref().unwrap_or("");
        format!("{} {description}", self.name).to_lowercase()
    }
}

/// 構造化済みメニュー。抽出が有効アイテムを1件も残せなかった場合は
/// 固定のフォールバックメニューに差し替えられ、空のまま先へは進まない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuInfo {
    pub currency: String,
    pub items: Vec<MenuItem>,
}

/// リクエスト毎に1度だけタグから導出される制約集合。以後は不変。
/// `hard_core` と `soft` は互いに素。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintSet {
    pub hard_core: Vec<String>,
    /// 動的除外の正規化済み食材キー（例: `mushroom`）。
    pub negative_keys: Vec<String>,
    pub soft: Vec<String>,
}

impl ConstraintSet {
    #[must_use]
    pub fn has_hard_constraints(&self) -> bool {
        !self.hard_core.is_empty() || !self.negative_keys.is_empty()
    }
}

/// 推薦プラン中の1料理。`subtotal` は常にローカルで再計算され、
/// ランキング応答の値は信用しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishPick {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub subtotal: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_calories: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// ハードフィルタ／ランキングで除外された料理の記録。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredOutItem {
    pub name: String,
    pub reason: String,
}

/// ガード検証のフェーズ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPhase {
    /// ランキング前のプール検証。
    Guard,
    /// ランキング後のピック検証。
    Final,
}

/// ガードが除外した料理の監査記録。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardViolation {
    pub name: String,
    pub reason: String,
    pub phase: GuardPhase,
}

/// プランの出自。生成ランキングか決定的フォールバックか。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Generative,
    GreedyFallback,
}

/// 最終的な推薦プラン。
///
/// 不変条件: `total == sum(picks.subtotal)`、
/// `within_budget == (total <= budget)`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPlan {
    pub picks: Vec<DishPick>,
    pub filtered_out: Vec<FilteredOutItem>,
    pub total: f64,
    pub within_budget: bool,
    pub rationale: String,
    pub guard_violations: Vec<GuardViolation>,
    pub source: PlanSource,
}

/// 写真ファンネルの判定結果サマリ（API 応答用）。
#[derive(Debug, Clone, Serialize)]
pub struct PhotoDecision {
    pub candidate_id: String,
    pub decision: &'static str,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_text_lowercases_name_and_description() {
        let item = MenuItem {
            name: "Kung Pao Chicken".to_string(),
            description: Some("Spicy SICHUAN classic".to_string()),
            price: 13.5,
            category: None,
            estimated_calories: None,
        };
        assert_eq!(item.filter_text(), "kung pao chicken spicy sichuan classic");
    }

    #[test]
    fn score_components_sum_matches_fields() {
        let components = ScoreComponents {
            base: 30,
            aspect: 20,
            attribution: 15,
            ocr_price: 10,
            ocr_keyword: 5,
        };
        assert_eq!(components.sum(), 80);
    }
}
