pub mod health;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::state::AppState;
use crate::{briefings, companies, search, settings, speakers, teams, topics, transcripts};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Ingestion (API key)
        .route(
            "/api/webhooks/transcript",
            post(transcripts::handlers::handle_transcript_webhook),
        )
        .route(
            "/api/webhooks/notion",
            post(transcripts::handlers::handle_notion_webhook),
        )
        // Transcripts
        .route("/api/transcripts", get(transcripts::handlers::handle_list))
        .route("/api/transcripts/bulk", post(transcripts::handlers::handle_bulk))
        .route(
            "/api/transcripts/:id",
            get(transcripts::handlers::handle_get).delete(transcripts::handlers::handle_delete),
        )
        .route(
            "/api/transcripts/:id/speakers",
            patch(transcripts::handlers::handle_edit_speaker),
        )
        // Speakers
        .route("/api/speakers", get(speakers::handlers::handle_list))
        .route(
            "/api/speakers/:name",
            get(speakers::handlers::handle_get)
                .put(speakers::handlers::handle_put)
                .patch(speakers::handlers::handle_patch),
        )
        .route(
            "/api/speakers/:name/context",
            get(speakers::handlers::handle_context),
        )
        .route(
            "/api/speakers/:name/enrich",
            post(speakers::handlers::handle_enrich),
        )
        // Topics, companies, search
        .route("/api/topics", get(topics::handlers::handle_list))
        .route("/api/companies", get(companies::handlers::handle_list))
        .route("/api/search", get(search::handlers::handle_search))
        // Briefings
        .route(
            "/api/briefings",
            get(briefings::handlers::handle_list).post(briefings::handlers::handle_generate),
        )
        // Teams
        .route(
            "/api/teams",
            get(teams::handlers::handle_list).post(teams::handlers::handle_create),
        )
        .route("/api/teams/:id/invites", post(teams::handlers::handle_invite))
        .route("/api/invites/:token/accept", post(teams::handlers::handle_accept))
        // Settings
        .route(
            "/api/settings",
            get(settings::handlers::handle_get).put(settings::handlers::handle_put),
        )
        .route(
            "/api/settings/api-keys",
            get(settings::handlers::handle_list_keys).post(settings::handlers::handle_create_key),
        )
        .route(
            "/api/settings/api-keys/:id",
            delete(settings::handlers::handle_delete_key),
        )
        // Batch jobs (admin key)
        .route(
            "/api/admin/enrichment/run",
            post(speakers::handlers::handle_run_batch),
        )
        .route(
            "/api/admin/briefings/run",
            post(briefings::handlers::handle_run_all),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    async fn status_of(request: Request<Body>) -> StatusCode {
        build_router(AppState::for_tests())
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_browser_routes_require_auth() {
        for uri in ["/api/speakers", "/api/transcripts", "/api/topics", "/api/settings"] {
            let req = Request::get(uri).body(Body::empty()).unwrap();
            assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_webhook_requires_api_key() {
        let req = Request::post("/api/webhooks/notion")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"t","content":"c"}"#))
            .unwrap();
        assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_reject_wrong_key() {
        let req = Request::post("/api/admin/enrichment/run")
            .header(header::AUTHORIZATION, "Bearer not-the-key")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(req).await, StatusCode::UNAUTHORIZED);
    }
}
