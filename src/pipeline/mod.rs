//! Menu recommendation pipeline.
//!
//! One request flows through: photo funnel → menu extraction → constraint
//! split → deterministic hard filter → guard screen → budget-constrained
//! selection → final validation → backfill → completion. Generative stages
//! degrade individually; the deterministic filter and the greedy fallback
//! guarantee a plan comes out the far end whenever a photo was chosen.

pub mod cache;
pub mod constraints;
pub mod extract;
pub mod filter;
pub(crate) mod guard;
pub mod photo;
pub(crate) mod select;
pub mod types;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clients::{GenerativeService, HistoryEntry, HistorySink, PhotoFetcher};
use crate::config::Config;
use crate::pipeline::cache::{CacheHit, RecommendationCache, RequestSignature};
use crate::pipeline::photo::PhotoSelection;
use crate::pipeline::photo::funnel::{self, FunnelSettings};
use crate::pipeline::select::{BatchSettings, SelectionContext};
use crate::pipeline::types::{
    ConstraintSet, GuardViolation, MenuInfo, MenuItem, PhotoCandidate, PhotoDecision,
    RecommendationPlan, ScoredCandidate,
};

const EPS: f64 = 1e-9;

/// リクエスト入力の検証エラー。いずれも呼び出し側の入力不備。
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("budget must be positive, got {0}")]
    InvalidBudget(f64),
    #[error("at least one photo candidate is required")]
    NoPhotoCandidates,
    #[error("the chosen photo could not be fetched or was empty")]
    EmptyPhoto,
}

/// レコメンド1回分の入力。
#[derive(Debug, Clone)]
pub struct RecommendRequest {
    pub user_id: Option<String>,
    pub candidates: Vec<PhotoCandidate>,
    pub budget: f64,
    pub tags: Vec<String>,
    pub max_calories_per_person: Option<u32>,
    pub note: Option<String>,
}

/// パイプラインの終端。プランか、写真の曖昧性解消要求か。
#[derive(Debug)]
pub enum RecommendOutcome {
    Plan(Box<PlanOutcome>),
    NeedsDisambiguation { shortlist: Vec<ScoredCandidate> },
}

/// 完了したプランとその付帯情報。
#[derive(Debug)]
pub struct PlanOutcome {
    pub menu_info: MenuInfo,
    pub recommendation: RecommendationPlan,
    pub cached: bool,
    pub photo: PhotoDecision,
}

/// パイプライン本体。全コンポーネントを束ね、1リクエストを通す。
pub struct Pipeline {
    config: Config,
    generative: Arc<dyn GenerativeService>,
    photos: Arc<dyn PhotoFetcher>,
    history: Arc<dyn HistorySink>,
    cache: Arc<RecommendationCache>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        config: Config,
        generative: Arc<dyn GenerativeService>,
        photos: Arc<dyn PhotoFetcher>,
        history: Arc<dyn HistorySink>,
        cache: Arc<RecommendationCache>,
    ) -> Self {
        Self {
            config,
            generative,
            photos,
            history,
            cache,
        }
    }

    /// 推薦を1件実行する。
    ///
    /// # Errors
    /// 予算が正でない、写真候補が空、選定写真の取得に失敗した場合は
    /// [`RecommendError`] を返す。それ以外の失敗は内部で劣化継続する。
    pub async fn recommend(
        &self,
        request: RecommendRequest,
    ) -> Result<RecommendOutcome, RecommendError> {
        if request.budget <= 0.0 {
            return Err(RecommendError::InvalidBudget(request.budget));
        }
        if request.candidates.is_empty() {
            return Err(RecommendError::NoPhotoCandidates);
        }

        // 1. 写真ファンネル
        let settings = FunnelSettings::from_config(&self.config);
        let selection = funnel::select_menu_photo(
            self.generative.as_ref(),
            self.photos.as_ref(),
            settings,
            &request.candidates,
        )
        .await;

        let (candidate, photo_decision) = match Self::decide_photo(selection) {
            Ok(accepted) => accepted,
            Err(shortlist) => {
                info!(
                    shortlist_len = shortlist.len(),
                    "no candidate passed the funnel, requesting disambiguation"
                );
                return Ok(RecommendOutcome::NeedsDisambiguation { shortlist });
            }
        };

        // 2. 選定写真のフル解像度取得
        let photo = match self.photos.fetch(&candidate, None).await {
            Ok(photo) => photo,
            Err(error) => {
                warn!(candidate_id = %candidate.id, ?error, "full photo fetch failed");
                return Err(RecommendError::EmptyPhoto);
            }
        };
        if photo.bytes.is_empty() {
            return Err(RecommendError::EmptyPhoto);
        }

        // 3. キャッシュ照会
        let signature = RequestSignature::new(
            &photo.bytes,
            request.budget,
            &request.tags,
            request.max_calories_per_person,
        );
        let menu_info = match self.cache.lookup(&signature).await {
            CacheHit::Full(menu_info, plan) => {
                debug!("full cache hit, returning stored plan");
                return Ok(RecommendOutcome::Plan(Box::new(PlanOutcome {
                    menu_info,
                    recommendation: plan,
                    cached: true,
                    photo: photo_decision,
                })));
            }
            CacheHit::MenuOnly(menu_info) => {
                debug!("menu-only cache hit, skipping extraction");
                menu_info
            }
            CacheHit::Miss => {
                let extracted = extract::extract(
                    self.generative.as_ref(),
                    self.config.generative_enabled(),
                    &photo.bytes,
                    &photo.mime_type,
                )
                .await;
                extracted.into_value()
            }
        };

        // 4. 制約分解と決定的ハードフィルタ
        let constraints = constraints::split(&request.tags);
        let outcome = filter::apply(&menu_info, &constraints);
        debug!(
            allowed = outcome.allowed.len(),
            removed = outcome.removed.len(),
            "hard filter applied"
        );

        let plan = self
            .plan_from_pool(&request, &constraints, outcome.allowed, outcome.removed)
            .await;

        self.cache
            .store(signature, menu_info.clone(), plan.clone())
            .await;
        self.record_history(&request, &plan);

        Ok(RecommendOutcome::Plan(Box::new(PlanOutcome {
            menu_info,
            recommendation: plan,
            cached: false,
            photo: photo_decision,
        })))
    }

    /// ファンネルの終端状態を受理候補か shortlist に振り分ける。
    fn decide_photo(
        selection: PhotoSelection,
    ) -> Result<(PhotoCandidate, PhotoDecision), Vec<ScoredCandidate>> {
        match selection {
            PhotoSelection::Heuristic {
                candidate,
                confidence,
                ..
            } => {
                let decision = PhotoDecision {
                    candidate_id: candidate.id.clone(),
                    decision: "heuristic_accept",
                    confidence,
                };
                Ok((candidate, decision))
            }
            PhotoSelection::Judged {
                candidate,
                confidence,
                ..
            } => {
                let decision = PhotoDecision {
                    candidate_id: candidate.id.clone(),
                    decision: "judge_accept",
                    confidence,
                };
                Ok((candidate, decision))
            }
            PhotoSelection::Undecided { shortlist } => Err(shortlist),
        }
    }

    /// フィルタ済みプールからプランを構築する。ガード・選定・最終検証・
    /// バックフィル・完了の各段を順に通す。
    async fn plan_from_pool(
        &self,
        request: &RecommendRequest,
        constraints: &ConstraintSet,
        pool: Vec<MenuItem>,
        hard_removed: Vec<filter::RemovedItem>,
    ) -> RecommendationPlan {
        if pool.is_empty() {
            return guard::complete(
                guard::PlanParts {
                    picks: Vec::new(),
                    filtered_out: Vec::new(),
                    hard_removed,
                    guard_violations: Vec::new(),
                    notes: "every dish violated the dietary constraints".to_string(),
                    source: types::PlanSource::GreedyFallback,
                },
                &pool,
                request.budget,
            );
        }

        let generative_guarding =
            self.config.generative_enabled() && constraints.has_hard_constraints();

        // 5. ランキング前のガード検査
        let mut guard_violations: Vec<GuardViolation> = Vec::new();
        let pool = if generative_guarding {
            let violations =
                guard::check_pool(self.generative.as_ref(), &pool, constraints).await;
            let screened = guard::apply_guard(&pool, &violations);
            guard_violations.extend(violations);
            screened
        } else {
            pool
        };

        if pool.is_empty() {
            return guard::complete(
                guard::PlanParts {
                    picks: Vec::new(),
                    filtered_out: Vec::new(),
                    hard_removed,
                    guard_violations,
                    notes: "the guard screen rejected every remaining dish".to_string(),
                    source: types::PlanSource::GreedyFallback,
                },
                &pool,
                request.budget,
            );
        }

        // 6. 予算制約付き選定
        let ctx = SelectionContext {
            items: &pool,
            budget: request.budget,
            constraints,
            max_calories_per_person: request.max_calories_per_person,
            note: request.note.as_deref(),
        };
        let batches = BatchSettings {
            chunk_size: self.config.rank_chunk_size(),
            union_cap: self.config.rank_union_cap(),
        };
        let generative: Option<&dyn GenerativeService> = if self.config.generative_enabled() {
            Some(self.generative.as_ref())
        } else {
            None
        };
        let selection = select::choose(generative, batches, &ctx).await;

        // 7. 最終検証と、除去で浮いた予算のバックフィル
        let mut picks = selection.picks;
        if generative_guarding && !picks.is_empty() {
            let violations =
                guard::check_picks(self.generative.as_ref(), &picks, &pool, constraints).await;
            if !violations.is_empty() {
                let mut excluded: Vec<String> =
                    violations.iter().map(|v| v.name.clone()).collect();
                picks = guard::apply_final(&picks, &violations);
                guard_violations.extend(violations);
                // バックフィルは未ピック・非違反の残りプールだけを対象にする
                excluded.extend(picks.iter().map(|p| p.name.clone()));

                let spent: f64 = picks.iter().map(|p| p.subtotal).sum();
                let remaining = request.budget - spent;
                let cheapest = pool
                    .iter()
                    .map(|item| item.price)
                    .fold(f64::INFINITY, f64::min);
                if remaining + EPS >= cheapest {
                    let extras = guard::backfill(
                        self.generative.as_ref(),
                        &pool,
                        constraints,
                        remaining,
                        &excluded,
                    )
                    .await;
                    picks = guard::merge_backfill(picks, extras, request.budget);
                }
            }
        }

        // 8. 完了段（合計・予算判定の再計算）
        guard::complete(
            guard::PlanParts {
                picks,
                filtered_out: selection.filtered_out,
                hard_removed,
                guard_violations,
                notes: selection.notes,
                source: selection.source,
            },
            &pool,
            request.budget,
        )
    }

    /// 履歴は fire-and-forget。失敗してもレスポンスには影響しない。
    fn record_history(&self, request: &RecommendRequest, plan: &RecommendationPlan) {
        let entry = HistoryEntry {
            user_id: request.user_id.clone(),
            item_count: plan.picks.len(),
            budget: request.budget,
            note: request.note.clone(),
            outcome: match plan.source {
                types::PlanSource::Generative => "generative",
                types::PlanSource::GreedyFallback => "greedy_fallback",
            },
        };
        let sink = Arc::clone(&self.history);
        tokio::spawn(async move {
            if let Err(error) = sink.record(entry).await {
                warn!(?error, "history sink record failed");
            }
        });
    }
}
