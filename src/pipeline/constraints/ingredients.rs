//! 食材シノニムテーブル。
//!
//! 動的除外キー（例: `noMushroom`）を正規化された食材名に解決し、
//! ハードフィルタが走査する同義語リストを提供する。手作業でキュレーション
//! された英語・中国語中心の語彙であり、網羅性はデータ品質リスクとして扱う。

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// 正規食材名 → 同義語リスト。
static SYNONYMS: Lazy<FxHashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let entries: &[(&str, &[&str])] = &[
        (
            "mushroom",
            &["mushroom", "mushrooms", "shiitake", "portobello", "enoki", "hongos", "fungi", "蘑菇", "香菇"],
        ),
        ("peanut", &["peanut", "peanuts", "groundnut", "花生"]),
        (
            "shrimp",
            &["shrimp", "shrimps", "prawn", "prawns", "虾", "蝦"],
        ),
        ("pork", &["pork", "bacon", "ham", "char siu", "猪肉", "叉烧"]),
        ("beef", &["beef", "brisket", "牛肉"]),
        ("chicken", &["chicken", "鸡", "鸡肉", "雞"]),
        ("cilantro", &["cilantro", "coriander", "香菜"]),
        (
            "onion",
            &["onion", "onions", "scallion", "scallions", "shallot", "洋葱", "葱"],
        ),
        ("garlic", &["garlic", "蒜", "大蒜"]),
        (
            "dairy",
            &["milk", "cheese", "butter", "cream", "yogurt", "牛奶", "奶油", "芝士"],
        ),
        ("egg", &["egg", "eggs", "蛋", "鸡蛋"]),
        (
            "nut",
            &["peanut", "almond", "cashew", "walnut", "pecan", "pistachio", "hazelnut", "坚果", "花生", "杏仁", "腰果"],
        ),
        (
            "gluten",
            &["wheat", "flour", "bread", "noodle", "noodles", "pasta", "ramen", "udon", "dumpling", "wonton", "面", "麵", "饺子", "馄饨"],
        ),
    ];
    entries.iter().copied().collect()
});

/// 同義語 → 正規食材名の逆引き。
static CANONICAL: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    for (canonical, synonyms) in &*SYNONYMS {
        map.insert(*canonical, *canonical);
        for synonym in *synonyms {
            // 最初に登録された正規名を優先する（peanut は nut より peanut へ）。
            map.entry(*synonym).or_insert(*canonical);
        }
    }
    map
});

/// 任意の食材語を正規食材名に解決する。
#[must_use]
pub(crate) fn canonical_ingredient(term: &str) -> Option<&'static str> {
    CANONICAL.get(term.trim().to_lowercase().as_str()).copied()
}

/// テーブル中の全語（正規名と同義語）。フィルタのパターン事前コンパイルに使う。
pub(crate) fn all_terms() -> impl Iterator<Item = &'static str> {
    SYNONYMS
        .iter()
        .flat_map(|(canonical, synonyms)| std::iter::once(*canonical).chain(synonyms.iter().copied()))
}

/// 正規食材名に対する同義語リスト。未知の食材は語そのものだけを返す。
#[must_use]
pub(crate) fn synonyms_for(canonical: &str) -> Vec<String> {
    SYNONYMS.get(canonical).map_or_else(
        || vec![canonical.to_string()],
        |list| list.iter().map(|s| (*s).to_string()).collect(),
    )
}
