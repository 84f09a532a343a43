//! Two-stage photo selection funnel.
//!
//! Stage 1 accepts on heuristic score alone. Stage 2 escalates the top-K
//! candidates to the generative visual judge, sequentially with early exit to
//! keep generative-call volume minimal. Neither accepting is a valid terminal
//! state: the caller receives a ranked shortlist for manual disambiguation.

use serde::Deserialize;
use serde_json::from_value;
use tracing::{debug, warn};

use crate::clients::{GenerateRequest, GenerativeService, ImagePayload, PhotoFetcher};
use crate::config::Config;
use crate::pipeline::photo::score;
use crate::pipeline::types::{PhotoCandidate, PhotoScore, ScoredCandidate};
use crate::schema::{parse_response_object, validate_json, vision::JUDGE_RESPONSE_SCHEMA};

/// ファンネルの終端状態。
#[derive(Debug, Clone)]
pub enum PhotoSelection {
    /// ヒューリスティックのみで受理。生成呼び出しは発生していない。
    Heuristic {
        candidate: PhotoCandidate,
        score: PhotoScore,
        confidence: f64,
    },
    /// visual judge が受理。
    Judged {
        candidate: PhotoCandidate,
        confidence: f64,
        reason: String,
    },
    /// どちらの段も受理しなかった。外部での曖昧性解消に委ねる。
    Undecided { shortlist: Vec<ScoredCandidate> },
}

/// ファンネルの設定値。[`Config`] から導出する。
#[derive(Debug, Clone, Copy)]
pub(crate) struct FunnelSettings {
    pub(crate) heuristic_threshold: u8,
    pub(crate) judge_threshold: f64,
    pub(crate) judge_top_k: usize,
    pub(crate) shortlist_size: usize,
    pub(crate) thumbnail_width: u32,
    pub(crate) generative_enabled: bool,
}

impl FunnelSettings {
    pub(crate) fn from_config(config: &Config) -> Self {
        Self {
            heuristic_threshold: config.photo_heuristic_threshold(),
            judge_threshold: config.photo_judge_threshold(),
            judge_top_k: config.photo_judge_top_k(),
            shortlist_size: config.photo_shortlist_size(),
            thumbnail_width: config.photo_thumbnail_width(),
            generative_enabled: config.generative_enabled(),
        }
    }
}

/// visual judge 応答。
#[derive(Debug, Deserialize)]
struct JudgeVerdict {
    is_menu: bool,
    confidence: f64,
    #[serde(default)]
    reason: Option<String>,
}

impl JudgeVerdict {
    /// 呼び出し失敗時に記録するゼロ確信度の判定。
    fn failed(reason: impl Into<String>) -> Self {
        Self {
            is_menu: false,
            confidence: 0.0,
            reason: Some(reason.into()),
        }
    }
}

/// ヒューリスティックスコアを滑らかな確信度へ写像する。閾値ちょうどで 0.5。
fn heuristic_confidence(total: u8, threshold: u8) -> f64 {
    let margin = (f64::from(total) - f64::from(threshold)) / 10.0;
    1.0 / (1.0 + (-margin).exp())
}

/// メニュー写真を選定する。
pub(crate) async fn select_menu_photo(
    generative: &dyn GenerativeService,
    photos: &dyn PhotoFetcher,
    settings: FunnelSettings,
    candidates: &[PhotoCandidate],
) -> PhotoSelection {
    let mut ranked: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|candidate| ScoredCandidate {
            candidate: candidate.clone(),
            score: score::score(candidate),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total.cmp(&a.score.total));

    if let Some(top) = ranked.first() {
        if top.score.total >= settings.heuristic_threshold {
            debug!(
                candidate_id = %top.candidate.id,
                total = top.score.total,
                "heuristic accept, skipping visual judge"
            );
            return PhotoSelection::Heuristic {
                candidate: top.candidate.clone(),
                score: top.score.clone(),
                confidence: heuristic_confidence(top.score.total, settings.heuristic_threshold),
            };
        }
    }

    if settings.generative_enabled {
        for scored in ranked.iter().take(settings.judge_top_k) {
            let verdict = judge_candidate(generative, photos, settings, &scored.candidate).await;
            debug!(
                candidate_id = %scored.candidate.id,
                is_menu = verdict.is_menu,
                confidence = verdict.confidence,
                "visual judge verdict"
            );
            if verdict.is_menu && verdict.confidence >= settings.judge_threshold {
                return PhotoSelection::Judged {
                    candidate: scored.candidate.clone(),
                    confidence: verdict.confidence,
                    reason: verdict.reason.unwrap_or_default(),
                };
            }
        }
    }

    ranked.truncate(settings.shortlist_size);
    PhotoSelection::Undecided { shortlist: ranked }
}

/// 単一候補を judge にかける。どの失敗もゼロ確信度の判定として吸収する。
async fn judge_candidate(
    generative: &dyn GenerativeService,
    photos: &dyn PhotoFetcher,
    settings: FunnelSettings,
    candidate: &PhotoCandidate,
) -> JudgeVerdict {
    let thumbnail = match photos
        .fetch(candidate, Some(settings.thumbnail_width))
        .await
    {
        Ok(thumbnail) => thumbnail,
        Err(error) => {
            warn!(candidate_id = %candidate.id, ?error, "thumbnail fetch failed");
            return JudgeVerdict::failed("thumbnail fetch failed");
        }
    };

    let request = GenerateRequest::json(JUDGE_PROMPT)
        .with_image(ImagePayload::from_bytes(&thumbnail.bytes, thumbnail.mime_type));

    let text = match generative.generate(request).await {
        Ok(text) => text,
        Err(error) => {
            warn!(candidate_id = %candidate.id, ?error, "visual judge call failed");
            return JudgeVerdict::failed("judge call failed");
        }
    };

    let Some(payload) = parse_response_object(&text) else {
        warn!(candidate_id = %candidate.id, "visual judge returned non-JSON payload");
        return JudgeVerdict::failed("non-JSON judge payload");
    };

    let validation = validate_json(&JUDGE_RESPONSE_SCHEMA, &payload);
    if !validation.valid {
        warn!(
            candidate_id = %candidate.id,
            errors = ?validation.errors,
            "visual judge response failed JSON Schema validation"
        );
        return JudgeVerdict::failed("judge schema violation");
    }

    from_value(payload).unwrap_or_else(|_| JudgeVerdict::failed("judge payload mismatch"))
}

const JUDGE_PROMPT: &str = "You are inspecting a single restaurant photo. Decide whether it \
shows a menu (a printed or displayed list of dishes with names, and usually prices). Respond \
with a JSON object: {\"is_menu\": boolean, \"confidence\": number between 0 and 1, \
\"reason\": short string}. Respond with JSON only.";
