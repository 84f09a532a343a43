//! Budget-constrained dish selection.
//!
//! The primary path is a generative ranking call under a strict response
//! contract; any failure (transport, empty payload, schema violation) drops
//! to the deterministic greedy fallback, which is budget-safe and needs no
//! external dependency.

pub(crate) mod greedy;
pub(crate) mod prompt;
pub(crate) mod rank;

use tracing::warn;

use crate::clients::GenerativeService;
use crate::pipeline::types::{ConstraintSet, DishPick, FilteredOutItem, MenuItem, PlanSource};

/// 選定段への入力スナップショット。
#[derive(Debug, Clone, Copy)]
pub(crate) struct SelectionContext<'a> {
    pub(crate) items: &'a [MenuItem],
    pub(crate) budget: f64,
    pub(crate) constraints: &'a ConstraintSet,
    pub(crate) max_calories_per_person: Option<u32>,
    pub(crate) note: Option<&'a str>,
}

/// 選定結果。合計値はここでは持たない（完了段で常に再計算する）。
#[derive(Debug, Clone)]
pub(crate) struct RankedSelection {
    pub(crate) picks: Vec<DishPick>,
    pub(crate) filtered_out: Vec<FilteredOutItem>,
    pub(crate) notes: String,
    pub(crate) source: PlanSource,
}

/// バッチ分割の設定。
#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchSettings {
    pub(crate) chunk_size: usize,
    pub(crate) union_cap: usize,
}

/// 料理の組み合わせを選ぶ。生成パスが使えなければ貪欲フォールバック。
pub(crate) async fn choose(
    generative: Option<&dyn GenerativeService>,
    batches: BatchSettings,
    ctx: &SelectionContext<'_>,
) -> RankedSelection {
    if let Some(service) = generative {
        match rank::rank_with_batches(service, batches, ctx).await {
            Ok(selection) => return selection,
            Err(error) => {
                warn!(?error, "generative ranking failed, using greedy fallback");
            }
        }
    }
    greedy::greedy_selection(ctx)
}
