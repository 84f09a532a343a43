//! Constraint guard and backfill.
//!
//! A plan moves through four states: ranked, guard-checked, final-validated,
//! complete. The guard pass screens the candidate pool before ranking, the
//! final pass re-screens the actual picks, and backfill tries to reuse budget
//! freed up by removals. Guard failures degrade to "no violations" so the
//! deterministic filter remains the safety floor.

use serde::Deserialize;
use serde_json::from_value;
use tracing::warn;

use crate::clients::{GenerateRequest, GenerativeService};
use crate::pipeline::filter;
use crate::pipeline::select::{prompt, rank};
use crate::pipeline::types::{
    ConstraintSet, DishPick, FilteredOutItem, GuardPhase, GuardViolation, MenuItem, PlanSource,
    RecommendationPlan,
};
use crate::schema::{
    parse_response_object,
    ranking::BACKFILL_RESPONSE_SCHEMA,
    validate_json,
    vision::GUARD_RESPONSE_SCHEMA,
};

const EPS: f64 = 1e-9;

const GUARD_PROMPT_HEADER: &str = "You are auditing dishes against dietary constraints. \
For each dish below, report it ONLY if it violates one of the constraints. \
Respond with a JSON object: {\"violations\": [{\"name\": string, \"reason\": string}]}. \
Use exact dish names. An empty violations array means everything passes. \
Respond with JSON only.\n";

#[derive(Debug, Deserialize)]
struct RawGuardReport {
    violations: Vec<RawViolation>,
}

#[derive(Debug, Deserialize)]
struct RawViolation {
    name: String,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct RawBackfill {
    picks: Vec<rank::RawPick>,
}

/// ガード段の違反を候補プールへ適用する。違反名はメニュー名との大小無視一致。
pub(crate) fn apply_guard(items: &[MenuItem], violations: &[GuardViolation]) -> Vec<MenuItem> {
    items
        .iter()
        .filter(|item| {
            !violations
                .iter()
                .any(|v| v.name.eq_ignore_ascii_case(&item.name))
        })
        .cloned()
        .collect()
}

/// 最終検証の違反を確定ピックへ適用する。
pub(crate) fn apply_final(picks: &[DishPick], violations: &[GuardViolation]) -> Vec<DishPick> {
    picks
        .iter()
        .filter(|pick| {
            !violations
                .iter()
                .any(|v| v.name.eq_ignore_ascii_case(&pick.name))
        })
        .cloned()
        .collect()
}

/// バックフィルで得た追加ピックを予算内に収まる範囲でマージする。
pub(crate) fn merge_backfill(
    picks: Vec<DishPick>,
    extras: Vec<DishPick>,
    budget: f64,
) -> Vec<DishPick> {
    let mut merged = picks;
    let mut total: f64 = merged.iter().map(|p| p.subtotal).sum();
    for extra in extras {
        let duplicate = merged
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(&extra.name));
        if duplicate {
            continue;
        }
        if total + extra.subtotal > budget + EPS {
            continue;
        }
        total += extra.subtotal;
        merged.push(extra);
    }
    merged
}

/// 完了段への入力一式。
pub(crate) struct PlanParts {
    pub(crate) picks: Vec<DishPick>,
    pub(crate) filtered_out: Vec<FilteredOutItem>,
    pub(crate) hard_removed: Vec<filter::RemovedItem>,
    pub(crate) guard_violations: Vec<GuardViolation>,
    pub(crate) notes: String,
    pub(crate) source: PlanSource,
}

/// 完了段。合計と予算判定はここで常に再計算する。
///
/// ピックが空で、かつ全候補の単価が予算を超えている（予算が実行不能な）
/// 場合のみ `within_budget` を false とする。空ピックそのものは予算内扱い。
pub(crate) fn complete(parts: PlanParts, pool: &[MenuItem], budget: f64) -> RecommendationPlan {
    let PlanParts {
        picks,
        mut filtered_out,
        hard_removed,
        guard_violations,
        notes,
        source,
    } = parts;

    for removed in hard_removed {
        filtered_out.push(FilteredOutItem {
            name: removed.name,
            reason: format!("{}: {}", removed.tag, removed.reason),
        });
    }

    let total: f64 = picks.iter().map(|p| p.subtotal).sum();
    let budget_infeasible =
        picks.is_empty() && !pool.is_empty() && pool.iter().all(|item| item.price > budget + EPS);
    let within_budget = total <= budget + EPS && !budget_infeasible;

    let rationale = if notes.is_empty() {
        if picks.is_empty() {
            "no dish satisfies the constraints within the budget".to_string()
        } else {
            "selected within budget and constraints".to_string()
        }
    } else {
        notes
    };

    RecommendationPlan {
        picks,
        filtered_out,
        total,
        within_budget,
        rationale,
        guard_violations,
        source,
    }
}

/// ランキング前に候補プール全体をガード検査する。
///
/// 呼び出し失敗・不正応答は「違反なし」へ退化させる。決定的フィルタが
/// 既に走っているため、ここの欠落は安全性を損なわない。
pub(crate) async fn check_pool(
    service: &dyn GenerativeService,
    items: &[MenuItem],
    constraints: &ConstraintSet,
) -> Vec<GuardViolation> {
    run_guard(service, items, constraints, GuardPhase::Guard).await
}

/// 確定ピックを最終検証する。対象をピック名に絞った同じ検査。
pub(crate) async fn check_picks(
    service: &dyn GenerativeService,
    picks: &[DishPick],
    pool: &[MenuItem],
    constraints: &ConstraintSet,
) -> Vec<GuardViolation> {
    let picked: Vec<MenuItem> = pool
        .iter()
        .filter(|item| {
            picks
                .iter()
                .any(|pick| pick.name.eq_ignore_ascii_case(&item.name))
        })
        .cloned()
        .collect();
    if picked.is_empty() {
        return Vec::new();
    }
    run_guard(service, &picked, constraints, GuardPhase::Final).await
}

async fn run_guard(
    service: &dyn GenerativeService,
    items: &[MenuItem],
    constraints: &ConstraintSet,
    phase: GuardPhase,
) -> Vec<GuardViolation> {
    let mut text = String::from(GUARD_PROMPT_HEADER);
    text.push_str(&format!(
        "Hard constraints: {:?}. Excluded ingredients: {:?}.\n",
        constraints.hard_core, constraints.negative_keys
    ));
    text.push_str("Dishes (JSON): ");
    text.push_str(&prompt::slim_items(items).to_string());

    let response = match service.generate(GenerateRequest::json(text)).await {
        Ok(response) => response,
        Err(error) => {
            warn!(?error, ?phase, "guard call failed, assuming no violations");
            return Vec::new();
        }
    };

    let Some(payload) = parse_response_object(&response) else {
        warn!(?phase, "guard response is not JSON, assuming no violations");
        return Vec::new();
    };
    let validation = validate_json(&GUARD_RESPONSE_SCHEMA, &payload);
    if !validation.valid {
        warn!(
            ?phase,
            errors = ?validation.errors,
            "guard response failed validation, assuming no violations"
        );
        return Vec::new();
    }
    let Ok(report) = from_value::<RawGuardReport>(payload) else {
        return Vec::new();
    };

    report
        .violations
        .into_iter()
        .filter(|v| {
            // 実在しない料理名の違反報告は捨てる
            items.iter().any(|item| item.name.eq_ignore_ascii_case(&v.name))
        })
        .map(|v| GuardViolation {
            name: v.name,
            reason: v.reason,
            phase,
        })
        .collect()
}

/// 除去で浮いた予算を使う追加提案。
///
/// プロンプトに載せる候補は、既存ピックと違反判定済みの品を除いた残りに
/// 絞る。提案された各品は採用前に決定的フィルタで再検査し、通らない品は
/// 黙って捨てる。呼び出し失敗は空の追加として扱う。
pub(crate) async fn backfill(
    service: &dyn GenerativeService,
    pool: &[MenuItem],
    constraints: &ConstraintSet,
    remaining_budget: f64,
    excluded_names: &[String],
) -> Vec<DishPick> {
    if remaining_budget <= EPS {
        return Vec::new();
    }

    let candidates: Vec<MenuItem> = pool
        .iter()
        .filter(|item| {
            !excluded_names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&item.name))
        })
        .cloned()
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    let text = prompt::backfill_prompt(&candidates, remaining_budget, excluded_names);
    let response = match service.generate(GenerateRequest::json(text)).await {
        Ok(response) => response,
        Err(error) => {
            warn!(?error, "backfill call failed, skipping");
            return Vec::new();
        }
    };

    let Some(payload) = parse_response_object(&response) else {
        return Vec::new();
    };
    let validation = validate_json(&BACKFILL_RESPONSE_SCHEMA, &payload);
    if !validation.valid {
        warn!(errors = ?validation.errors, "backfill response failed validation, skipping");
        return Vec::new();
    }
    let Ok(raw) = from_value::<RawBackfill>(payload) else {
        return Vec::new();
    };

    rank::resolve_picks(raw.picks, &candidates)
        .into_iter()
        .filter(|pick| {
            let Some(item) = candidates
                .iter()
                .find(|item| item.name.eq_ignore_ascii_case(&pick.name))
            else {
                return false;
            };
            filter::violates(item, constraints).is_none()
        })
        .collect()
}
