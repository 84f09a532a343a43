use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::pipeline::types::{
    MenuInfo, PhotoCandidate, PhotoDecision, RecommendationPlan, ScoredCandidate,
};
use crate::pipeline::{RecommendOutcome, RecommendRequest};

/// `POST /v1/recommendations` のリクエストボディ。
#[derive(Debug, Deserialize)]
pub(crate) struct RecommendationRequestBody {
    #[serde(default)]
    user_id: Option<String>,
    budget: f64,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    max_calories_per_person: Option<u32>,
    #[serde(default)]
    note: Option<String>,
    photos: Vec<PhotoCandidate>,
}

/// 成功応答。`status` で分岐する。
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum RecommendationResponse {
    Ok {
        request_id: Uuid,
        menu: MenuInfo,
        recommendation: RecommendationPlan,
        cached: bool,
        photo: PhotoDecision,
    },
    NeedsDisambiguation {
        request_id: Uuid,
        shortlist: Vec<ScoredCandidate>,
    },
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

pub(crate) async fn recommend(
    State(state): State<AppState>,
    Json(body): Json<RecommendationRequestBody>,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        budget = body.budget,
        tag_count = body.tags.len(),
        photo_count = body.photos.len(),
        "recommendation requested"
    );

    let request = RecommendRequest {
        user_id: body.user_id,
        candidates: body.photos,
        budget: body.budget,
        tags: body.tags,
        max_calories_per_person: body.max_calories_per_person,
        note: body.note,
    };

    match state.pipeline().recommend(request).await {
        Ok(RecommendOutcome::Plan(outcome)) => {
            info!(
                %request_id,
                cached = outcome.cached,
                picks = outcome.recommendation.picks.len(),
                total = outcome.recommendation.total,
                "recommendation completed"
            );
            (
                StatusCode::OK,
                Json(RecommendationResponse::Ok {
                    request_id,
                    menu: outcome.menu_info,
                    recommendation: outcome.recommendation,
                    cached: outcome.cached,
                    photo: outcome.photo,
                }),
            )
                .into_response()
        }
        Ok(RecommendOutcome::NeedsDisambiguation { shortlist }) => {
            info!(%request_id, shortlist = shortlist.len(), "disambiguation required");
            (
                StatusCode::OK,
                Json(RecommendationResponse::NeedsDisambiguation {
                    request_id,
                    shortlist,
                }),
            )
                .into_response()
        }
        Err(error) => {
            warn!(%request_id, %error, "recommendation rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_serializes_with_status_tag() {
        let response = RecommendationResponse::NeedsDisambiguation {
            request_id: Uuid::nil(),
            shortlist: Vec::new(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "needs_disambiguation");
        assert!(value["shortlist"].as_array().unwrap().is_empty());
    }

    #[test]
    fn request_body_defaults_optional_fields() {
        let body: RecommendationRequestBody = serde_json::from_str(
            r#"{"budget": 20.0, "photos": [{
                "id": "p1", "width_px": 100, "height_px": 100,
                "source_url": "http://photos.local/p1.jpg"
            }]}"#,
        )
        .unwrap();
        assert!(body.tags.is_empty());
        assert!(body.user_id.is_none());
        assert!(body.note.is_none());
        assert!(body.max_calories_per_person.is_none());
    }
}
