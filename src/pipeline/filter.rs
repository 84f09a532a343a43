//! Deterministic hard-constraint filter.
//!
//! Removal decisions here carry safety implications (allergens, religious
//! restrictions), so this stage never delegates to a generative step. Checks
//! run in a fixed order and the first violation wins; an item is removed for
//! its first violation, not all of them.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::pipeline::constraints::{all_synonym_terms, synonyms_for};
use crate::pipeline::types::{ConstraintSet, MenuInfo, MenuItem};

/// ハードフィルタで除外された料理の記録。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovedItem {
    pub name: String,
    pub reason: String,
    pub tag: String,
}

/// フィルタ結果。
#[derive(Debug, Clone)]
pub struct HardFilterOutcome {
    pub allowed: Vec<MenuItem>,
    pub removed: Vec<RemovedItem>,
}

const VEGAN_INDICATORS: &[&str] = &["vegan", "plant-based", "plant based", "纯素", "全素"];
const VEGETARIAN_INDICATORS: &[&str] = &["vegetarian", "veggie", "素食", "素菜"];
const GLUTEN_FREE_INDICATORS: &[&str] = &["gluten-free", "gluten free", "glutenfree", "无麸质"];

/// ビーガン違反となる動物性食材。
const NON_VEGAN_TERMS: &[&str] = &[
    "beef", "pork", "chicken", "lamb", "duck", "bacon", "ham", "sausage", "fish", "salmon",
    "tuna", "shrimp", "prawn", "crab", "lobster", "anchovy", "oyster", "squid", "cheese",
    "butter", "cream", "milk", "yogurt", "egg", "honey", "gelatin", "牛肉", "猪肉", "鸡",
    "鸭", "鱼", "虾", "蟹", "奶", "蛋",
];

/// ベジタリアン違反となる肉・海鮮。
const MEAT_SEAFOOD_TERMS: &[&str] = &[
    "beef", "pork", "chicken", "lamb", "duck", "bacon", "ham", "sausage", "meatball", "fish",
    "salmon", "tuna", "shrimp", "prawn", "crab", "lobster", "anchovy", "oyster", "squid",
    "octopus", "牛肉", "猪肉", "鸡", "鸭", "鱼", "虾", "蟹",
];

/// グルテンを含む食材・料理語。
const GLUTEN_TERMS: &[&str] = &[
    "wheat", "flour", "bread", "noodle", "noodles", "pasta", "ramen", "udon", "dumpling",
    "wonton", "tortilla", "bun", "soy sauce", "breaded", "battered", "tempura", "面", "麵",
    "饺子", "馄饨", "馒头",
];

/// ハラール違反食材。
const NON_HALAL_TERMS: &[&str] = &[
    "pork", "bacon", "ham", "lard", "alcohol", "wine", "beer", "sake", "猪肉", "叉烧",
];

/// コーシャ違反食材。
const NON_KOSHER_TERMS: &[&str] = &[
    "pork", "bacon", "ham", "lard", "shrimp", "prawn", "crab", "lobster", "oyster", "squid",
    "octopus", "猪肉", "虾", "蟹",
];

/// ペスカタリアン違反となる陸上肉。
const LAND_MEAT_TERMS: &[&str] = &[
    "beef", "pork", "chicken", "lamb", "duck", "bacon", "ham", "sausage", "meatball", "牛肉",
    "猪肉", "鸡", "鸭",
];

/// 乳製品語。
const DAIRY_TERMS: &[&str] = &[
    "milk", "cheese", "butter", "cream", "yogurt", "牛奶", "奶油", "芝士",
];

/// ナッツ語。
const NUT_TERMS: &[&str] = &[
    "peanut", "almond", "cashew", "walnut", "pecan", "pistachio", "hazelnut", "花生", "杏仁",
    "腰果",
];

/// 既知のASCII語に対するワード境界パターン。起動時に一括コンパイルする。
static BOUNDARY_PATTERNS: Lazy<FxHashMap<&'static str, Regex>> = Lazy::new(|| {
    let static_lists = [
        NON_VEGAN_TERMS,
        MEAT_SEAFOOD_TERMS,
        GLUTEN_TERMS,
        NON_HALAL_TERMS,
        NON_KOSHER_TERMS,
        LAND_MEAT_TERMS,
        DAIRY_TERMS,
        NUT_TERMS,
    ];
    static_lists
        .into_iter()
        .flat_map(|list| list.iter().copied())
        .chain(all_synonym_terms())
        .filter(|term| term.is_ascii())
        .map(|term| (term, boundary_pattern(term)))
        .collect()
});

fn boundary_pattern(term: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(term)))
        .unwrap_or_else(|_| unreachable!("escaped literals always compile"))
}

/// ハードコア検査の固定順序。タグの入力順には依存しない。
const HARD_CHECK_ORDER: &[&str] = &[
    "vegan",
    "vegetarian",
    "glutenfree",
    "halal",
    "kosher",
    "pescatarian",
    "dairyfree",
    "nutfree",
];

/// ハード制約に違反する料理を決定的に除去する。
#[must_use]
pub fn apply(menu: &MenuInfo, constraints: &ConstraintSet) -> HardFilterOutcome {
    let mut allowed = Vec::with_capacity(menu.items.len());
    let mut removed = Vec::new();

    for item in &menu.items {
        match first_violation(item, constraints) {
            Some(violation) => removed.push(violation),
            None => allowed.push(item.clone()),
        }
    }

    HardFilterOutcome { allowed, removed }
}

/// 単一ピック（バックフィル候補）を再検査する。違反理由を返す。
#[must_use]
pub fn violates(item: &MenuItem, constraints: &ConstraintSet) -> Option<RemovedItem> {
    first_violation(item, constraints)
}

fn first_violation(item: &MenuItem, constraints: &ConstraintSet) -> Option<RemovedItem> {
    let text = item.filter_text();

    // 1. 動的除外キー（同義語単位のワード境界照合）
    for key in &constraints.negative_keys {
        for synonym in synonyms_for(key) {
            if term_matches(&text, &synonym) {
                return Some(RemovedItem {
                    name: item.name.clone(),
                    reason: format!("contains excluded ingredient \"{synonym}\""),
                    tag: format!("no-{key}"),
                });
            }
        }
    }

    // 2以降は固定順のハードコア検査。明示的な表示があれば該当検査を飛ばす。
    for tag in HARD_CHECK_ORDER.iter().copied() {
        if !constraints.hard_core.iter().any(|h| h.as_str() == tag) {
            continue;
        }
        let violation = match tag {
            "vegan" if !has_indicator(&text, VEGAN_INDICATORS) => {
                match_any(&text, NON_VEGAN_TERMS)
            }
            "vegetarian"
                if !has_indicator(&text, VEGAN_INDICATORS)
                    && !has_indicator(&text, VEGETARIAN_INDICATORS) =>
            {
                match_any(&text, MEAT_SEAFOOD_TERMS)
            }
            "glutenfree" if !has_indicator(&text, GLUTEN_FREE_INDICATORS) => {
                match_any(&text, GLUTEN_TERMS)
            }
            "halal" => match_any(&text, NON_HALAL_TERMS),
            "kosher" => match_any(&text, NON_KOSHER_TERMS),
            "pescatarian" => match_any(&text, LAND_MEAT_TERMS),
            "dairyfree" => match_any(&text, DAIRY_TERMS),
            "nutfree" => match_any(&text, NUT_TERMS),
            _ => None,
        };

        if let Some(term) = violation {
            return Some(RemovedItem {
                name: item.name.clone(),
                reason: format!("contains \"{term}\""),
                tag: tag.to_string(),
            });
        }
    }

    None
}

fn has_indicator(text: &str, indicators: &[&str]) -> bool {
    indicators.iter().any(|indicator| text.contains(indicator))
}

fn match_any(text: &str, terms: &[&str]) -> Option<String> {
    terms
        .iter()
        .find(|term| term_matches(text, term))
        .map(|term| (*term).to_string())
}

/// ASCII語はワード境界で、CJK語は部分一致で照合する。
fn term_matches(text: &str, term: &str) -> bool {
    if term.is_ascii() {
        match BOUNDARY_PATTERNS.get(term) {
            Some(pattern) => pattern.is_match(text),
            // テーブル外の語は未知の動的除外キーだけ
            None => boundary_pattern(term).is_match(text),
        }
    } else {
        text.contains(term)
    }
}
