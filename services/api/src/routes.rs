use crate::infra::{AppState, ServiceEngine};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use credit_engine::workflows::credits::{credit_router, Actor};
use credit_engine::workflows::identity::{
    DirectoryError, InMemoryIdentityDirectory, PractitionerIdentity, Role,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_service_routes(
    engine: Arc<ServiceEngine>,
    directory: Arc<InMemoryIdentityDirectory>,
) -> axum::Router {
    credit_router(engine)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/identities",
            axum::routing::post(register_identity_endpoint).get(list_identities_endpoint),
        )
        .layer(Extension(directory))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Stand-in for the external directory feed. Registration triggers reconciliation.
pub(crate) async fn register_identity_endpoint(
    Extension(directory): Extension<Arc<InMemoryIdentityDirectory>>,
    actor: Actor,
    Json(identity): Json<PractitionerIdentity>,
) -> Response {
    if actor.role != Role::Administrator {
        let payload = json!({ "error": "administrator role required" });
        return (StatusCode::FORBIDDEN, Json(payload)).into_response();
    }

    match directory.register(identity.clone()) {
        Ok(()) => (StatusCode::CREATED, Json(identity)).into_response(),
        Err(err @ DirectoryError::Duplicate(_)) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn list_identities_endpoint(
    Extension(directory): Extension<Arc<InMemoryIdentityDirectory>>,
    actor: Actor,
) -> Response {
    if !actor.role.can_review() {
        let payload = json!({ "error": "reviewer role required" });
        return (StatusCode::FORBIDDEN, Json(payload)).into_response();
    }

    match directory.all() {
        Ok(identities) => (StatusCode::OK, Json(identities)).into_response(),
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::build_engine;
    use credit_engine::config::CreditPolicy;
    use credit_engine::workflows::identity::PractitionerId;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;

    fn actor(id: &str, role: Role) -> Actor {
        Actor {
            id: PractitionerId(id.to_string()),
            role,
        }
    }

    fn identity(id: &str) -> PractitionerIdentity {
        PractitionerIdentity {
            id: PractitionerId(id.to_string()),
            name: "Hester".to_string(),
            surname: "Malan".to_string(),
            role: Role::Practitioner,
        }
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };

        let response = readiness_endpoint(Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state
            .readiness
            .store(true, std::sync::atomic::Ordering::Release);
        let response = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn identity_registration_is_admin_only_and_unique() {
        let (_engine, directory) = build_engine(CreditPolicy::default()).expect("engine builds");

        let denied = register_identity_endpoint(
            Extension(directory.clone()),
            actor("prac-1", Role::Practitioner),
            Json(identity("prac-hester")),
        )
        .await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let created = register_identity_endpoint(
            Extension(directory.clone()),
            actor("adm-1", Role::Administrator),
            Json(identity("prac-hester")),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let duplicate = register_identity_endpoint(
            Extension(directory.clone()),
            actor("adm-1", Role::Administrator),
            Json(identity("prac-hester")),
        )
        .await;
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let listed = list_identities_endpoint(
            Extension(directory.clone()),
            actor("rev-1", Role::Reviewer),
        )
        .await;
        assert_eq!(listed.status(), StatusCode::OK);
        assert_eq!(directory.all().expect("directory").len(), 1);
    }
}
