//! Single-slot recommendation cache.
//!
//! Holds at most one entry: the most recent completed run. A new store
//! unconditionally replaces the previous entry (last write wins). Lookups
//! distinguish a full hit (same photo, budget, tags, calorie ceiling) from a
//! menu-only hit (same photo, different knobs), which lets the pipeline skip
//! the expensive extraction call while re-running selection.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use xxhash_rust::xxh3::xxh3_64;

use crate::pipeline::types::{MenuInfo, RecommendationPlan};

const BUDGET_EPSILON: f64 = 1e-9;

/// リクエスト入力の署名。写真・予算・タグ・カロリー上限を個別に持ち、
/// 部分一致（写真のみ一致）を判定できるようにする。
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSignature {
    image_signature: u64,
    budget: f64,
    tags_signature: u64,
    calories_signature: u64,
}

impl RequestSignature {
    #[must_use]
    pub fn new(
        image_bytes: &[u8],
        budget: f64,
        tags: &[String],
        max_calories_per_person: Option<u32>,
    ) -> Self {
        // タグは順序・大小文字の揺れで署名が変わらないよう正規化する
        let mut normalized: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
        normalized.sort();
        let tags_joined = normalized.join("\n");

        let calories_text = max_calories_per_person
            .map_or_else(|| "none".to_string(), |c| c.to_string());

        Self {
            image_signature: xxh3_64(image_bytes),
            budget,
            tags_signature: xxh3_64(tags_joined.as_bytes()),
            calories_signature: xxh3_64(calories_text.as_bytes()),
        }
    }

    fn same_image(&self, other: &Self) -> bool {
        self.image_signature == other.image_signature
    }

    fn same_knobs(&self, other: &Self) -> bool {
        (self.budget - other.budget).abs() < BUDGET_EPSILON
            && self.tags_signature == other.tags_signature
            && self.calories_signature == other.calories_signature
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    signature: RequestSignature,
    menu_info: MenuInfo,
    plan: RecommendationPlan,
    stored_at: DateTime<Utc>,
}

/// キャッシュ照会の結果。
#[derive(Debug, Clone)]
pub enum CacheHit {
    /// 全入力一致。プランをそのまま返してよい。
    Full(MenuInfo, RecommendationPlan),
    /// 写真のみ一致。抽出を飛ばし、選定をやり直す。
    MenuOnly(MenuInfo),
    Miss,
}

/// 直近1件のみを保持する推薦キャッシュ。
#[derive(Debug, Default)]
pub struct RecommendationCache {
    slot: RwLock<Option<CacheEntry>>,
}

impl RecommendationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lookup(&self, signature: &RequestSignature) -> CacheHit {
        let slot = self.slot.read().await;
        let Some(entry) = slot.as_ref() else {
            return CacheHit::Miss;
        };
        if !entry.signature.same_image(signature) {
            return CacheHit::Miss;
        }
        if entry.signature.same_knobs(signature) {
            CacheHit::Full(entry.menu_info.clone(), entry.plan.clone())
        } else {
            CacheHit::MenuOnly(entry.menu_info.clone())
        }
    }

    pub async fn store(
        &self,
        signature: RequestSignature,
        menu_info: MenuInfo,
        plan: RecommendationPlan,
    ) {
        let mut slot = self.slot.write().await;
        *slot = Some(CacheEntry {
            signature,
            menu_info,
            plan,
            stored_at: Utc::now(),
        });
    }

    /// 直近エントリの格納時刻。ヘルス応答の診断用。
    pub async fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.slot.read().await.as_ref().map(|entry| entry.stored_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{MenuItem, PlanSource};

    fn menu() -> MenuInfo {
        MenuInfo {
            currency: "USD".to_string(),
            items: vec![MenuItem {
                name: "Fried Rice".to_string(),
                description: None,
                price: 11.0,
                category: None,
                estimated_calories: None,
            }],
        }
    }

    fn plan() -> RecommendationPlan {
        RecommendationPlan {
            picks: Vec::new(),
            filtered_out: Vec::new(),
            total: 0.0,
            within_budget: true,
            rationale: "test".to_string(),
            guard_violations: Vec::new(),
            source: PlanSource::GreedyFallback,
        }
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn identical_inputs_are_a_full_hit() {
        let cache = RecommendationCache::new();
        let signature = RequestSignature::new(b"photo", 20.0, &tags(&["vegetarian"]), None);
        cache.store(signature.clone(), menu(), plan()).await;

        let hit = cache
            .lookup(&RequestSignature::new(
                b"photo",
                20.0,
                &tags(&["vegetarian"]),
                None,
            ))
            .await;

        assert!(matches!(hit, CacheHit::Full(_, _)));
    }

    #[tokio::test]
    async fn budget_change_downgrades_to_menu_only() {
        let cache = RecommendationCache::new();
        cache
            .store(
                RequestSignature::new(b"photo", 20.0, &tags(&["vegetarian"]), None),
                menu(),
                plan(),
            )
            .await;

        let hit = cache
            .lookup(&RequestSignature::new(
                b"photo",
                30.0,
                &tags(&["vegetarian"]),
                None,
            ))
            .await;

        match hit {
            CacheHit::MenuOnly(cached_menu) => assert_eq!(cached_menu, menu()),
            other => panic!("expected MenuOnly, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tag_order_and_case_do_not_affect_the_signature() {
        let a = RequestSignature::new(b"photo", 20.0, &tags(&["Vegan", "noMushroom"]), None);
        let b = RequestSignature::new(b"photo", 20.0, &tags(&["nomushroom", "vegan"]), None);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_image_is_a_miss() {
        let cache = RecommendationCache::new();
        cache
            .store(
                RequestSignature::new(b"photo-a", 20.0, &[], None),
                menu(),
                plan(),
            )
            .await;

        let hit = cache
            .lookup(&RequestSignature::new(b"photo-b", 20.0, &[], None))
            .await;

        assert!(matches!(hit, CacheHit::Miss));
    }

    #[tokio::test]
    async fn new_store_supersedes_the_previous_entry() {
        let cache = RecommendationCache::new();
        cache
            .store(
                RequestSignature::new(b"photo-a", 20.0, &[], None),
                menu(),
                plan(),
            )
            .await;
        cache
            .store(
                RequestSignature::new(b"photo-b", 20.0, &[], None),
                menu(),
                plan(),
            )
            .await;

        let old = cache
            .lookup(&RequestSignature::new(b"photo-a", 20.0, &[], None))
            .await;
        let new = cache
            .lookup(&RequestSignature::new(b"photo-b", 20.0, &[], None))
            .await;

        assert!(matches!(old, CacheHit::Miss));
        assert!(matches!(new, CacheHit::Full(_, _)));
    }

    #[tokio::test]
    async fn calorie_ceiling_change_downgrades_to_menu_only() {
        let cache = RecommendationCache::new();
        cache
            .store(
                RequestSignature::new(b"photo", 20.0, &[], Some(800)),
                menu(),
                plan(),
            )
            .await;

        let hit = cache
            .lookup(&RequestSignature::new(b"photo", 20.0, &[], None))
            .await;

        assert!(matches!(hit, CacheHit::MenuOnly(_)));
    }
}
