//! Prompt construction for the ranking calls.

use serde_json::{Value, json};

use crate::pipeline::types::MenuItem;
use crate::util::text::truncate_chars;

use super::SelectionContext;

/// 説明文をプロンプトに載せる際の最大文字数。
const MAX_DESCRIPTION_CHARS: usize = 120;

/// ランキング呼び出しへ渡すスリム化アイテム表現。
pub(crate) fn slim_items(items: &[MenuItem]) -> Value {
    let slim: Vec<Value> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let mut entry = json!({
                "id": index,
                "name": item.name,
                "price": item.price,
            });
            if let Some(description) = &item.description {
                entry["description"] = json!(truncate_chars(description, MAX_DESCRIPTION_CHARS));
            }
            if let Some(calories) = item.estimated_calories {
                entry["estimated_calories"] = json!(calories);
            }
            entry
        })
        .collect();
    Value::Array(slim)
}

/// ランキングプロンプトを構築する。ハード制約は多重防御として再掲する。
pub(crate) fn ranking_prompt(ctx: &SelectionContext<'_>, items: &[MenuItem]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are selecting dishes for a diner from the menu below. Stay within the budget. ",
    );
    prompt.push_str(&format!("Budget: {:.2}.\n", ctx.budget));

    if ctx.constraints.has_hard_constraints() {
        prompt.push_str(&format!(
            "Hard dietary constraints (must never be violated): {:?}. ",
            ctx.constraints.hard_core
        ));
        if !ctx.constraints.negative_keys.is_empty() {
            prompt.push_str(&format!(
                "Excluded ingredients: {:?}. ",
                ctx.constraints.negative_keys
            ));
        }
        prompt.push('\n');
    }
    if !ctx.constraints.soft.is_empty() {
        prompt.push_str(&format!(
            "Soft preferences (may be relaxed): {:?}.\n",
            ctx.constraints.soft
        ));
    }
    if let Some(ceiling) = ctx.max_calories_per_person {
        prompt.push_str(&format!(
            "Keep total estimated calories at or under {ceiling} per person.\n"
        ));
    }
    if let Some(note) = ctx.note {
        prompt.push_str(&format!("Diner note: {}\n", truncate_chars(note, 200)));
    }

    prompt.push_str("Menu items (JSON): ");
    prompt.push_str(&slim_items(items).to_string());
    prompt.push_str(
        "\nRespond with a JSON object: {\"picks\": [{\"name\": string, \"quantity\": integer \
>= 1, \"reason\": string}], \"filtered_out\": [{\"name\": string, \"reason\": string}], \
\"est_total\": number, \"notes\": string, \"relaxed_hard\": boolean (optional), \
\"calorie_relaxed\": boolean (optional)}. Use exact item names from the menu. Respond with \
JSON only.",
    );

    prompt
}

/// バックフィル用の短いプロンプト。既存ピックと違反判定済みの品は
/// プールから落とした上で、名前でも明示的に除外する。
pub(crate) fn backfill_prompt(
    pool: &[MenuItem],
    remaining_budget: f64,
    excluded_names: &[String],
) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "Select additional dishes from the pool below to use the remaining budget of {remaining_budget:.2}. "
    ));
    if !excluded_names.is_empty() {
        prompt.push_str(&format!(
            "Never pick any of these already selected or rejected dishes: {excluded_names:?}. "
        ));
    }
    prompt.push_str("Pool (JSON): ");
    prompt.push_str(&slim_items(pool).to_string());
    prompt.push_str(
        "\nRespond with a JSON object: {\"picks\": [{\"name\": string, \"quantity\": integer \
>= 1, \"reason\": string}]}. Use exact item names. Respond with JSON only.",
    );
    prompt
}
