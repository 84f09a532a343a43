//! Heuristic menu-likelihood scoring for photo candidates.
//!
//! Pure and deterministic: no IO, no generative calls. The funnel escalates
//! to the visual judge only when this score is inconclusive.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::pipeline::types::{PhotoCandidate, PhotoScore, ScoreComponents};

/// 価格らしいパターン（$12.50 / 12.00 など）。
static PRICE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[$€£¥]\s*\d+(?:\.\d{1,2})?)|(?:\b\d+\.\d{2}\b)")
        .unwrap_or_else(|_| unreachable!("price pattern is a valid regex"))
});

/// 帰属テキストに現れると加点される飲食関連キーワード。
const ATTRIBUTION_KEYWORDS: &[&str] = &[
    "menu", "dish", "food", "restaurant", "dining", "cuisine", "plate", "菜单", "菜單",
];

/// OCRテキストに現れると加点されるメニュー語彙。
const MENU_KEYWORDS: &[&str] = &[
    "menu",
    "appetizer",
    "appetizers",
    "entree",
    "entrée",
    "starters",
    "mains",
    "dessert",
    "beverages",
    "菜单",
    "菜單",
    "前菜",
];

/// OCR価格ヒットが加点対象になる最小件数。
const MIN_PRICE_HITS: usize = 3;

/// 候補写真のメニューらしさを採点する。合計は [0, 100] にクランプされる。
#[must_use]
pub fn score(candidate: &PhotoCandidate) -> PhotoScore {
    let area = u64::from(candidate.width_px) * u64::from(candidate.height_px);
    let base = if area > 1_000_000 {
        30
    } else if area > 500_000 {
        20
    } else if area > 200_000 {
        10
    } else {
        0
    };

    let aspect = if candidate.height_px == 0 {
        0
    } else {
        let ratio = f64::from(candidate.width_px) / f64::from(candidate.height_px);
        if ratio < 1.2 {
            20
        } else if ratio > 2.0 {
            -10
        } else {
            0
        }
    };

    let attribution_text = candidate.attribution.join(" ").to_lowercase();
    let attribution = if ATTRIBUTION_KEYWORDS
        .iter()
        .any(|keyword| attribution_text.contains(keyword))
    {
        15
    } else {
        0
    };

    let (ocr_price, ocr_keyword) = match candidate.ocr_text.as_deref() {
        Some(ocr) => {
            let lowered = ocr.to_lowercase();
            let price_hits = PRICE_PATTERN.find_iter(&lowered).count();
            let price = if price_hits >= MIN_PRICE_HITS { 10 } else { 0 };
            let keyword = if MENU_KEYWORDS.iter().any(|k| lowered.contains(k)) {
                5
            } else {
                0
            };
            (price, keyword)
        }
        None => (0, 0),
    };

    let components = ScoreComponents {
        base,
        aspect,
        attribution,
        ocr_price,
        ocr_keyword,
    };

    let total = u8::try_from(components.sum().clamp(0, 100)).unwrap_or(0);

    PhotoScore {
        candidate_id: candidate.id.clone(),
        total,
        components,
    }
}
