use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ActivityDraft, ActivityId, ActivityPatch, CourseCompletion, EvidenceRef, ReviewDecision, ReviewRequest,
    ReviewerId, SubmissionId, SubmissionRequest,
};
use super::courses::CourseCredit;
use super::engine::{CreditEngine, CreditError};
use super::repository::{CreditStore, RepositoryError};
use crate::workflows::historical::record::LinkFilter;
use crate::workflows::historical::HistoricalImportError;
use crate::workflows::identity::{DirectoryError, IdentityDirectory, PractitionerId, Role};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

const DEFAULT_PAGE: usize = 50;

/// Router builder exposing the credit operations over HTTP.
pub fn credit_router<S, D>(engine: Arc<CreditEngine<S, D>>) -> Router
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/credits/activities",
            post(define_activity_handler::<S, D>).get(list_activities_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/activities/:activity_id",
            patch(update_activity_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/activities/:activity_id/active",
            post(set_active_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/submissions",
            post(submit_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/course-completions",
            post(course_completion_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/review-queue",
            get(pending_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/submissions/:submission_id",
            get(submission_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/submissions/:submission_id/review",
            post(review_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/historical",
            get(historical_records_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/historical/preview",
            post(historical_preview_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/historical/import",
            post(historical_import_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/historical/reconcile",
            post(reconcile_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/practitioners/:practitioner_id/submissions",
            get(practitioner_submissions_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/practitioners/:practitioner_id/totals",
            get(totals_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/practitioners/:practitioner_id/progress",
            get(progress_handler::<S, D>),
        )
        .route(
            "/api/v1/credits/leaderboard",
            get(leaderboard_handler::<S, D>),
        )
        .with_state(engine)
}

/// Caller identity as asserted by the upstream gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: PractitionerId,
    pub role: Role,
}

impl Actor {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };
        Some(Self {
            id: PractitionerId(header(ACTOR_ID_HEADER)?.to_string()),
            role: Role::parse(header(ACTOR_ROLE_HEADER)?)?,
        })
    }

    fn require_admin(&self) -> Result<(), Response> {
        if self.role == Role::Administrator {
            Ok(())
        } else {
            Err(forbidden("administrator role required"))
        }
    }

    fn require_reviewer(&self) -> Result<(), Response> {
        if self.role.can_review() {
            Ok(())
        } else {
            Err(forbidden("reviewer role required"))
        }
    }

    fn require_reader_of(&self, practitioner_id: &PractitionerId) -> Result<(), Response> {
        if self.role.can_review() || &self.id == practitioner_id {
            Ok(())
        } else {
            Err(forbidden("callers may only read their own credit"))
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Actor::from_headers(&parts.headers).ok_or_else(|| {
            let payload = json!({
                "error": format!("missing or invalid `{ACTOR_ID_HEADER}` / `{ACTOR_ROLE_HEADER}` headers"),
            });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        })
    }
}

fn forbidden(message: &str) -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
}

pub(crate) fn credit_error_status(error: &CreditError) -> StatusCode {
    match error {
        CreditError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CreditError::NotFound { .. } | CreditError::Repository(RepositoryError::NotFound) => {
            StatusCode::NOT_FOUND
        }
        CreditError::Conflict(_)
        | CreditError::Repository(RepositoryError::Conflict)
        | CreditError::Directory(DirectoryError::Duplicate(_)) => StatusCode::CONFLICT,
        CreditError::Repository(RepositoryError::Unavailable(_))
        | CreditError::Directory(DirectoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub(crate) fn import_error_status(error: &HistoricalImportError) -> StatusCode {
    match error {
        HistoricalImportError::Schema { .. }
        | HistoricalImportError::Io(_)
        | HistoricalImportError::Csv(_) => StatusCode::BAD_REQUEST,
        HistoricalImportError::Repository(_) | HistoricalImportError::Directory(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn credit_error_response(error: CreditError) -> Response {
    let status = credit_error_status(&error);
    let payload = match &error {
        CreditError::Validation { field, .. } => json!({
            "error": error.to_string(),
            "field": field,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status, Json(payload)).into_response()
}

fn import_error_response(error: HistoricalImportError) -> Response {
    let status = import_error_status(&error);
    let payload = match &error {
        HistoricalImportError::Schema { missing } => json!({
            "error": error.to_string(),
            "missing_columns": missing,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status, Json(payload)).into_response()
}

pub(crate) async fn define_activity_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Json(draft): Json<ActivityDraft>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if let Err(response) = actor.require_admin() {
        return response;
    }
    match engine.catalog().define_activity(draft) {
        Ok(activity) => (StatusCode::CREATED, Json(activity)).into_response(),
        Err(error) => credit_error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListActivitiesQuery {
    #[serde(default)]
    include_inactive: bool,
}

pub(crate) async fn list_activities_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Query(query): Query<ListActivitiesQuery>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    // Retired entries are an administrative concern.
    let include_inactive = query.include_inactive && actor.role == Role::Administrator;
    match engine.catalog().list(include_inactive) {
        Ok(activities) => (StatusCode::OK, Json(activities)).into_response(),
        Err(error) => credit_error_response(error),
    }
}

pub(crate) async fn update_activity_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Path(activity_id): Path<String>,
    Json(patch): Json<ActivityPatch>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if let Err(response) = actor.require_admin() {
        return response;
    }
    match engine
        .catalog()
        .update_activity(&ActivityId(activity_id), patch)
    {
        Ok(activity) => (StatusCode::OK, Json(activity)).into_response(),
        Err(error) => credit_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActivePayload {
    active: bool,
}

pub(crate) async fn set_active_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Path(activity_id): Path<String>,
    Json(payload): Json<ActivePayload>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if let Err(response) = actor.require_admin() {
        return response;
    }
    match engine
        .catalog()
        .set_active(&ActivityId(activity_id), payload.active)
    {
        Ok(activity) => (StatusCode::OK, Json(activity)).into_response(),
        Err(error) => credit_error_response(error),
    }
}

/// Claim body. The practitioner is always the caller.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitPayload {
    activity_id: ActivityId,
    period: i32,
    #[serde(default)]
    note: String,
    #[serde(default)]
    evidence: Option<EvidenceRef>,
    #[serde(default)]
    requested_credits: Option<i64>,
}

pub(crate) async fn submit_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Json(payload): Json<SubmitPayload>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if !actor.role.is_credit_eligible() {
        return forbidden("only practitioners may submit credit claims");
    }
    let request = SubmissionRequest {
        practitioner_id: actor.id,
        activity_id: payload.activity_id,
        period: payload.period,
        note: payload.note,
        evidence: payload.evidence,
        requested_credits: payload.requested_credits,
    };
    match engine.ledger().submit(request) {
        Ok(submission) => (StatusCode::CREATED, Json(submission.view())).into_response(),
        Err(error) => credit_error_response(error),
    }
}

/// Completion notice from the learning platform. Credit is recorded once per period.
pub(crate) async fn course_completion_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Json(completion): Json<CourseCompletion>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if let Err(response) = actor.require_admin() {
        return response;
    }
    match engine.record_course_completion(completion) {
        Ok(credit) => {
            let status = if credit.is_new() {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let payload = json!({
                "already_credited": matches!(credit, CourseCredit::AlreadyCredited(_)),
                "submission": credit.submission().view(),
            });
            (status, Json(payload)).into_response()
        }
        Err(error) => credit_error_response(error),
    }
}

pub(crate) async fn submission_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Path(submission_id): Path<String>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    let submission = match engine.ledger().get(&SubmissionId(submission_id)) {
        Ok(submission) => submission,
        Err(error) => return credit_error_response(error),
    };
    if let Err(response) = actor.require_reader_of(&submission.practitioner_id) {
        return response;
    }
    (StatusCode::OK, Json(submission.view())).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default)]
    limit: Option<usize>,
}

pub(crate) async fn pending_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Query(query): Query<PageQuery>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if let Err(response) = actor.require_reviewer() {
        return response;
    }
    match engine
        .ledger()
        .pending_queue(query.limit.unwrap_or(DEFAULT_PAGE))
    {
        Ok(queue) => {
            let views: Vec<_> = queue.iter().map(|submission| submission.view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => credit_error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewPayload {
    decision: ReviewDecision,
    #[serde(default)]
    note: String,
    #[serde(default)]
    awarded_credits: Option<i64>,
}

pub(crate) async fn review_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Path(submission_id): Path<String>,
    Json(payload): Json<ReviewPayload>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if let Err(response) = actor.require_reviewer() {
        return response;
    }
    let request = ReviewRequest {
        reviewer_id: ReviewerId(actor.id.0),
        decision: payload.decision,
        note: payload.note,
        awarded_credits: payload.awarded_credits,
    };
    match engine
        .reviews()
        .review(&SubmissionId(submission_id), request)
    {
        Ok(submission) => (StatusCode::OK, Json(submission.view())).into_response(),
        Err(error) => credit_error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HistoricalQuery {
    #[serde(default)]
    filter: LinkFilter,
}

pub(crate) async fn historical_records_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Query(query): Query<HistoricalQuery>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if let Err(response) = actor.require_reviewer() {
        return response;
    }
    match engine.historical().records(query.filter) {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => import_error_response(error),
    }
}

pub(crate) async fn historical_preview_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    body: String,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if let Err(response) = actor.require_admin() {
        return response;
    }
    match engine.historical().preview(body.as_bytes()) {
        Ok(preview) => {
            let payload = json!({
                "counts": preview.counts(),
                "preview": preview,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => import_error_response(error),
    }
}

pub(crate) async fn historical_import_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    body: String,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if let Err(response) = actor.require_admin() {
        return response;
    }
    match engine.historical().import_batch(body.as_bytes()) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => import_error_response(error),
    }
}

pub(crate) async fn reconcile_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    if let Err(response) = actor.require_admin() {
        return response;
    }
    match engine.historical().reconcile_unbound() {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => import_error_response(error),
    }
}

pub(crate) async fn practitioner_submissions_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Path(practitioner_id): Path<String>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    let practitioner_id = PractitionerId(practitioner_id);
    if let Err(response) = actor.require_reader_of(&practitioner_id) {
        return response;
    }
    match engine.ledger().submissions_for(&practitioner_id) {
        Ok(submissions) => {
            let views: Vec<_> = submissions
                .iter()
                .map(|submission| submission.view())
                .collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => credit_error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TotalsQuery {
    #[serde(default)]
    period: Option<i32>,
}

pub(crate) async fn totals_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Path(practitioner_id): Path<String>,
    Query(query): Query<TotalsQuery>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    let practitioner_id = PractitionerId(practitioner_id);
    if let Err(response) = actor.require_reader_of(&practitioner_id) {
        return response;
    }
    match engine.reporter().totals_for(&practitioner_id, query.period) {
        Ok(totals) => (StatusCode::OK, Json(totals)).into_response(),
        Err(error) => credit_error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProgressQuery {
    #[serde(default)]
    end_period: Option<i32>,
}

pub(crate) async fn progress_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    actor: Actor,
    Path(practitioner_id): Path<String>,
    Query(query): Query<ProgressQuery>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    let practitioner_id = PractitionerId(practitioner_id);
    if let Err(response) = actor.require_reader_of(&practitioner_id) {
        return response;
    }
    let end_period = query.end_period.unwrap_or_else(|| Utc::now().year());
    match engine
        .reporter()
        .cycle_progress(&practitioner_id, end_period)
    {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(error) => credit_error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LeaderboardQuery {
    #[serde(default)]
    period: Option<i32>,
    #[serde(default)]
    limit: Option<usize>,
}

pub(crate) async fn leaderboard_handler<S, D>(
    State(engine): State<Arc<CreditEngine<S, D>>>,
    _actor: Actor,
    Query(query): Query<LeaderboardQuery>,
) -> Response
where
    S: CreditStore + 'static,
    D: IdentityDirectory + 'static,
{
    match engine
        .reporter()
        .leaderboard(query.period, query.limit.unwrap_or(10))
    {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(error) => credit_error_response(error),
    }
}
