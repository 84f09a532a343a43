//! Generative ranking with a strict response contract.

use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::from_value;
use tracing::{debug, warn};

use crate::clients::{GenerateRequest, GenerativeService};
use crate::pipeline::types::{DishPick, FilteredOutItem, MenuItem, PlanSource};
use crate::schema::{parse_response_object, ranking::RANKING_RESPONSE_SCHEMA, validate_json};

use super::{BatchSettings, RankedSelection, SelectionContext, prompt};

#[derive(Debug, Deserialize)]
struct RawRanking {
    picks: Vec<RawPick>,
    filtered_out: Vec<FilteredOutItem>,
    #[allow(dead_code)]
    est_total: f64,
    notes: String,
    #[serde(default)]
    relaxed_hard: Option<bool>,
    #[serde(default)]
    calorie_relaxed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPick {
    pub(crate) name: String,
    pub(crate) quantity: u32,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

/// 応答の生ピックをメニューアイテムに解決する。
///
/// 金額は応答から一切信用せず、メニュー価格で小計を再計算する。
/// メニューに存在しない名前のピックは警告の上で捨てる。
pub(crate) fn resolve_picks(raw_picks: Vec<RawPick>, items: &[MenuItem]) -> Vec<DishPick> {
    let mut picks = Vec::with_capacity(raw_picks.len());
    for raw in raw_picks {
        let Some(item) = items
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(&raw.name))
        else {
            warn!(pick = %raw.name, "ranking response picked an unknown dish, dropping");
            continue;
        };
        let quantity = raw.quantity.max(1);
        picks.push(DishPick {
            name: item.name.clone(),
            quantity,
            unit_price: item.price,
            subtotal: f64::from(quantity) * item.price,
            // 数量はスキーマ検証後でも応答由来なので、掛け算は飽和で行う
            estimated_calories: item.estimated_calories.map(|c| c.saturating_mul(quantity)),
            reason: raw.reason,
        });
    }
    picks
}

/// 単一のランキング呼び出し。スキーマ違反はこの呼び出しのハード失敗。
async fn rank_once(
    service: &dyn GenerativeService,
    ctx: &SelectionContext<'_>,
    items: &[MenuItem],
) -> Result<RankedSelection> {
    let text = service
        .generate(GenerateRequest::json(prompt::ranking_prompt(ctx, items)))
        .await?;

    let payload =
        parse_response_object(&text).ok_or_else(|| anyhow!("ranking response is not JSON"))?;

    let validation = validate_json(&RANKING_RESPONSE_SCHEMA, &payload);
    if !validation.valid {
        return Err(anyhow!(
            "ranking response validation failed: {:?}",
            validation.errors
        ));
    }

    let raw: RawRanking = from_value(payload)?;

    let mut notes = raw.notes;
    if raw.relaxed_hard == Some(true) {
        // ハード制約の緩和申告は受け入れない。ガード段が拾うが、痕跡は残す。
        notes.push_str(" [ranking reported relaxed hard constraints]");
    }
    if raw.calorie_relaxed == Some(true) {
        notes.push_str(" [calorie ceiling relaxed]");
    }

    Ok(RankedSelection {
        picks: resolve_picks(raw.picks, items),
        filtered_out: raw.filtered_out,
        notes,
        source: PlanSource::Generative,
    })
}

/// メニューが大きい場合はバッチ分割してランキングする。
///
/// 各バッチは互いに独立で並行に実行され、全バッチ完了後にピックの和集合を
/// 上限件数まで残し、最終パスで再ランキングする。プロンプトサイズを抑えつつ
/// カバレッジを保つ。
pub(crate) async fn rank_with_batches(
    service: &dyn GenerativeService,
    batches: BatchSettings,
    ctx: &SelectionContext<'_>,
) -> Result<RankedSelection> {
    if ctx.items.len() <= batches.chunk_size {
        return rank_once(service, ctx, ctx.items).await;
    }

    let chunk_results = futures::future::join_all(
        ctx.items
            .chunks(batches.chunk_size)
            .map(|chunk| rank_once(service, ctx, chunk)),
    )
    .await;

    let mut pool: Vec<MenuItem> = Vec::new();
    let mut failed_batches = 0usize;
    for result in chunk_results {
        match result {
            Ok(selection) => {
                for pick in selection.picks {
                    if pool.len() >= batches.union_cap {
                        break;
                    }
                    let already_pooled = pool
                        .iter()
                        .any(|item| item.name.eq_ignore_ascii_case(&pick.name));
                    if already_pooled {
                        continue;
                    }
                    if let Some(item) = ctx
                        .items
                        .iter()
                        .find(|item| item.name.eq_ignore_ascii_case(&pick.name))
                    {
                        pool.push(item.clone());
                    }
                }
            }
            Err(error) => {
                failed_batches += 1;
                warn!(?error, "ranking batch failed, skipping its items");
            }
        }
    }

    if pool.is_empty() {
        return Err(anyhow!(
            "all ranking batches failed or produced no picks ({failed_batches} failures)"
        ));
    }

    debug!(
        pool_size = pool.len(),
        failed_batches, "re-ranking union of batch picks"
    );
    rank_once(service, ctx, &pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::pipeline::types::ConstraintSet;

    struct ScriptedRanker {
        responses: Mutex<Vec<Result<String>>>,
    }

    impl ScriptedRanker {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl GenerativeService for ScriptedRanker {
        async fn generate(&self, _request: GenerateRequest) -> Result<String> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(anyhow!("no scripted response left"));
            }
            responses.remove(0)
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn item(name: &str, price: f64) -> MenuItem {
        MenuItem {
            name: name.to_string(),
            description: None,
            price,
            category: None,
            estimated_calories: Some(400),
        }
    }

    fn valid_response(picked: &str) -> String {
        format!(
            r#"{{"picks": [{{"name": "{picked}", "quantity": 2, "reason": "good value"}}],
                "filtered_out": [], "est_total": 99.0, "notes": "ok"}}"#
        )
    }

    #[tokio::test]
    async fn rank_recomputes_subtotals_from_menu_prices() {
        let items = vec![item("Fried Rice", 11.0)];
        let constraints = ConstraintSet::default();
        let ctx = SelectionContext {
            items: &items,
            budget: 30.0,
            constraints: &constraints,
            max_calories_per_person: None,
            note: None,
        };
        let service = ScriptedRanker::new(vec![Ok(valid_response("Fried Rice"))]);

        let selection = rank_once(&service, &ctx, &items).await.expect("ranks");

        assert_eq!(selection.picks.len(), 1);
        let pick = &selection.picks[0];
        assert_eq!(pick.quantity, 2);
        assert!((pick.subtotal - 22.0).abs() < 1e-9); // est_total 99.0 は無視される
        assert_eq!(pick.estimated_calories, Some(800));
        assert_eq!(selection.source, PlanSource::Generative);
    }

    #[test]
    fn resolve_picks_saturates_oversized_calorie_totals() {
        let mut platter = item("Mega Platter", 10.0);
        platter.estimated_calories = Some(300_000_000);
        let raw = vec![RawPick {
            name: "Mega Platter".to_string(),
            quantity: 20,
            reason: None,
        }];

        let picks = resolve_picks(raw, &[platter]);

        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].estimated_calories, Some(u32::MAX));
        assert!((picks[0].subtotal - 200.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_pick_names_are_dropped() {
        let items = vec![item("Fried Rice", 11.0)];
        let constraints = ConstraintSet::default();
        let ctx = SelectionContext {
            items: &items,
            budget: 30.0,
            constraints: &constraints,
            max_calories_per_person: None,
            note: None,
        };
        let service = ScriptedRanker::new(vec![Ok(valid_response("Phantom Dish"))]);

        let selection = rank_once(&service, &ctx, &items).await.expect("ranks");
        assert!(selection.picks.is_empty());
    }

    #[tokio::test]
    async fn schema_violation_is_a_hard_failure() {
        let items = vec![item("Fried Rice", 11.0)];
        let constraints = ConstraintSet::default();
        let ctx = SelectionContext {
            items: &items,
            budget: 30.0,
            constraints: &constraints,
            max_calories_per_person: None,
            note: None,
        };
        // notes 欠落はスキーマ違反
        let service = ScriptedRanker::new(vec![Ok(
            r#"{"picks": [], "filtered_out": [], "est_total": 0.0}"#.to_string(),
        )]);

        let error = rank_once(&service, &ctx, &items)
            .await
            .expect_err("must fail");
        assert!(error.to_string().contains("validation failed"));
    }

    #[tokio::test]
    async fn batches_union_survives_one_failed_chunk() {
        let items: Vec<MenuItem> = (0..4)
            .map(|i| item(&format!("Dish {i}"), 5.0 + f64::from(i)))
            .collect();
        let constraints = ConstraintSet::default();
        let ctx = SelectionContext {
            items: &items,
            budget: 30.0,
            constraints: &constraints,
            max_calories_per_person: None,
            note: None,
        };
        // chunk size 2 → 2 batches + final pass
        let service = ScriptedRanker::new(vec![
            Ok(valid_response("Dish 0")),
            Err(anyhow!("batch blew up")),
            Ok(valid_response("Dish 0")),
        ]);

        let selection = rank_with_batches(
            &service,
            BatchSettings {
                chunk_size: 2,
                union_cap: 24,
            },
            &ctx,
        )
        .await
        .expect("union pass succeeds");

        assert_eq!(selection.picks.len(), 1);
        assert_eq!(selection.picks[0].name, "Dish 0");
    }

    #[tokio::test]
    async fn all_batches_failing_is_an_error() {
        let items: Vec<MenuItem> = (0..4)
            .map(|i| item(&format!("Dish {i}"), 5.0))
            .collect();
        let constraints = ConstraintSet::default();
        let ctx = SelectionContext {
            items: &items,
            budget: 30.0,
            constraints: &constraints,
            max_calories_per_person: None,
            note: None,
        };
        let service = ScriptedRanker::new(vec![
            Err(anyhow!("down")),
            Err(anyhow!("down")),
        ]);

        let error = rank_with_batches(
            &service,
            BatchSettings {
                chunk_size: 2,
                union_cap: 24,
            },
            &ctx,
        )
        .await
        .expect_err("must fail");
        assert!(error.to_string().contains("batches failed"));
    }
}
