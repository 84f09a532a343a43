//! Deterministic budget-safe fallback selection.

use crate::pipeline::types::{DishPick, FilteredOutItem, PlanSource};

use super::{RankedSelection, SelectionContext};

const EPS: f64 = 1e-9;

/// メニュー順に走査し、予算とカロリー上限を超えない料理を1品ずつ採る。
///
/// 予算超過を返さないことが保証される保守的な選定。生成パス無効時と
/// ランキング失敗時の双方で使われる。
pub(crate) fn greedy_selection(ctx: &SelectionContext<'_>) -> RankedSelection {
    let mut picks: Vec<DishPick> = Vec::new();
    let mut filtered_out: Vec<FilteredOutItem> = Vec::new();
    let mut running_total = 0.0_f64;
    let mut running_calories: u64 = 0;

    for item in ctx.items {
        if item.price <= 0.0 {
            continue;
        }
        if running_total + item.price > ctx.budget + EPS {
            filtered_out.push(FilteredOutItem {
                name: item.name.clone(),
                reason: "would exceed the remaining budget".to_string(),
            });
            continue;
        }
        if let (Some(ceiling), Some(calories)) =
            (ctx.max_calories_per_person, item.estimated_calories)
        {
            if running_calories + u64::from(calories) > u64::from(ceiling) {
                filtered_out.push(FilteredOutItem {
                    name: item.name.clone(),
                    reason: "would exceed the calorie ceiling".to_string(),
                });
                continue;
            }
            running_calories += u64::from(calories);
        }

        running_total += item.price;
        picks.push(DishPick {
            name: item.name.clone(),
            quantity: 1,
            unit_price: item.price,
            subtotal: item.price,
            estimated_calories: item.estimated_calories,
            reason: None,
        });
    }

    let notes = if picks.is_empty() {
        "no dish fits within the budget".to_string()
    } else {
        "deterministic in-order selection within budget".to_string()
    };

    RankedSelection {
        picks,
        filtered_out,
        notes,
        source: PlanSource::GreedyFallback,
    }
}
