//! Free-text dietary tag classification.
//!
//! Incoming tags split into three disjoint sets: a fixed hard-core
//! vocabulary, dynamic negative-ingredient keys resolved through the synonym
//! table, and soft preferences that only influence ranking. Classification is
//! a tagged-variant decision per tag, never runtime type inspection.

pub(crate) mod ingredients;

pub(crate) use ingredients::{all_terms as all_synonym_terms, synonyms_for};

use crate::pipeline::types::ConstraintSet;

/// 単一タグの分類結果。
#[derive(Debug, Clone, PartialEq, Eq)]
enum TagClass {
    HardCore(&'static str),
    Negative(String),
    Soft(String),
}

/// 固定のハードコア語彙。正規名と別名のペア。
const HARD_CORE_ALIASES: &[(&str, &[&str])] = &[
    ("vegan", &["vegan", "plantbased", "纯素", "全素"]),
    ("vegetarian", &["vegetarian", "veggie", "素食", "素"]),
    ("glutenfree", &["glutenfree", "无麸质", "nogluten"]),
    ("halal", &["halal", "清真"]),
    ("kosher", &["kosher"]),
    ("pescatarian", &["pescatarian", "pescetarian"]),
    ("dairyfree", &["dairyfree", "lactosefree", "nodairy"]),
    ("nutfree", &["nutfree", "nonut", "nonuts"]),
];

/// タグ列を制約集合へ分割する。`hard_core ∩ soft == ∅` を保証する。
#[must_use]
pub fn split(tags: &[String]) -> ConstraintSet {
    let mut set = ConstraintSet::default();

    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }

        match classify(trimmed) {
            TagClass::HardCore(canonical) => {
                if !set.hard_core.iter().any(|existing| existing == canonical) {
                    set.hard_core.push(canonical.to_string());
                }
            }
            TagClass::Negative(ingredient) => {
                if !set.negative_keys.contains(&ingredient) {
                    set.negative_keys.push(ingredient);
                }
            }
            TagClass::Soft(preference) => {
                if !set.soft.contains(&preference) {
                    set.soft.push(preference);
                }
            }
        }
    }

    set
}

fn classify(tag: &str) -> TagClass {
    if let Some(canonical) = match_hard_core(tag) {
        return TagClass::HardCore(canonical);
    }
    if let Some(ingredient) = match_negative(tag) {
        return TagClass::Negative(ingredient);
    }
    TagClass::Soft(tag.to_lowercase())
}

/// ハイフン・空白・アンダースコアを除去した小文字形で別名照合する。
fn match_hard_core(tag: &str) -> Option<&'static str> {
    let squashed: String = tag
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect();

    HARD_CORE_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&squashed.as_str()))
        .map(|(canonical, _)| *canonical)
}

/// `no<Ingredient>` / `avoid-<ingredient>` / `<ingredient>-free` 形式を解決する。
fn match_negative(tag: &str) -> Option<String> {
    let stem = negative_stem(tag)?;
    let stem = stem.trim().to_lowercase();
    if stem.is_empty() {
        return None;
    }
    // シノニムテーブルで正規化。未知の食材でも単一語キーとして成立させる。
    Some(
        ingredients::canonical_ingredient(&stem)
            .map_or(stem, ToString::to_string),
    )
}

fn negative_stem(tag: &str) -> Option<&str> {
    // camelCase: noMushroom
    if let Some(rest) = tag.strip_prefix("no") {
        if rest.chars().next().is_some_and(char::is_uppercase) {
            return Some(rest);
        }
    }
    for prefix in ["no-", "no_", "no ", "avoid-", "avoid_", "avoid "] {
        if let Some(rest) = tag.strip_prefix(prefix) {
            return Some(rest);
        }
    }
    for suffix in ["-free", "_free", " free"] {
        if let Some(rest) = tag.strip_suffix(suffix) {
            return Some(rest);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tags(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[rstest]
    #[case("vegan", "vegan")]
    #[case("Plant-Based", "vegan")]
    #[case("gluten free", "glutenfree")]
    #[case("GLUTEN-FREE", "glutenfree")]
    #[case("素食", "vegetarian")]
    #[case("清真", "halal")]
    fn hard_core_aliases_normalize(#[case] raw: &str, #[case] canonical: &str) {
        let set = split(&tags(&[raw]));
        assert_eq!(set.hard_core, vec![canonical.to_string()]);
        assert!(set.negative_keys.is_empty());
        assert!(set.soft.is_empty());
    }

    #[rstest]
    #[case("noMushroom", "mushroom")]
    #[case("no-hongos", "mushroom")]
    #[case("avoid-prawns", "shrimp")]
    #[case("mushroom-free", "mushroom")]
    #[case("noDurian", "durian")] // unknown ingredient still becomes a key
    fn negative_patterns_resolve_through_synonyms(#[case] raw: &str, #[case] key: &str) {
        let set = split(&tags(&[raw]));
        assert_eq!(set.negative_keys, vec![key.to_string()]);
    }

    #[test]
    fn dairy_free_is_hard_core_not_negative() {
        let set = split(&tags(&["dairy-free"]));
        assert_eq!(set.hard_core, vec!["dairyfree".to_string()]);
        assert!(set.negative_keys.is_empty());
    }

    #[test]
    fn unrecognized_tags_become_soft_preferences() {
        let set = split(&tags(&["spicy", "Low Carb", "noodles lover"]));
        assert_eq!(
            set.soft,
            vec![
                "spicy".to_string(),
                "low carb".to_string(),
                "noodles lover".to_string()
            ]
        );
        assert!(set.hard_core.is_empty());
    }

    #[test]
    fn hard_core_and_soft_are_disjoint() {
        let set = split(&tags(&["vegan", "vegan", "spicy", "spicy"]));
        assert_eq!(set.hard_core, vec!["vegan".to_string()]);
        assert_eq!(set.soft, vec!["spicy".to_string()]);
        assert!(set.hard_core.iter().all(|h| !set.soft.contains(h)));
    }

    #[test]
    fn blank_tags_are_ignored() {
        let set = split(&tags(&["", "   "]));
        assert_eq!(set, ConstraintSet::default());
    }

    #[test]
    fn noodles_is_not_a_negative_key() {
        // "no" プレフィクスは camelCase か区切り文字を要求する
        let set = split(&tags(&["noodles"]));
        assert_eq!(set.soft, vec!["noodles".to_string()]);
    }
}
