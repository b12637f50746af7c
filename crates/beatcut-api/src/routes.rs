//! API routes.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{get_output, get_task, health, list_outputs, list_tasks};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks))
        .route("/tasks/:id", get(get_task))
        .route("/outputs", get(list_outputs))
        .route("/outputs/:name", get(get_output))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use beatcut_models::{Task, TaskId, TaskInputs, TaskStatus};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app() -> (TempDir, AppState, Router) {
        let dir = TempDir::new().unwrap();
        let config = ApiConfig {
            root: dir.path().to_path_buf(),
            ..ApiConfig::default()
        };
        let state = AppState::new(config).unwrap();
        let router = create_router(state.clone());
        (dir, state, router)
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    async fn seed(state: &AppState, id: &str, status: TaskStatus) {
        let mut task = Task::new(TaskId::from_string(id), TaskInputs::default());
        task.status = status;
        state.store.save(&task).await.unwrap();
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let (_dir, state, router) = app().await;
        seed(&state, "task_a", TaskStatus::Pending).await;
        std::fs::write(state.store.output_dir().join("task_a_render.mp4"), b"x").unwrap();

        let (status, body) = get_json(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["task_count"], 1);
        assert_eq!(body["output_count"], 1);
    }

    #[tokio::test]
    async fn test_list_tasks_includes_corrupt_entries() {
        let (_dir, state, router) = app().await;
        seed(&state, "task_a", TaskStatus::Completed).await;
        std::fs::write(state.store.tasks_dir().join("task_bad.json"), b"{ trunc").unwrap();

        let (status, body) = get_json(&router, "/tasks").await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["status"], "completed");
        assert_eq!(entries[1]["id"], "task_bad");
        assert_eq!(entries[1]["error"], "corrupt");
    }

    #[tokio::test]
    async fn test_get_task_and_not_found() {
        let (_dir, state, router) = app().await;
        seed(&state, "task_a", TaskStatus::Rendering).await;

        let (status, body) = get_json(&router, "/tasks/task_a").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "task_a");
        assert_eq!(body["status"], "rendering");

        let (status, _) = get_json(&router, "/tasks/task_missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_outputs_metadata_and_content() {
        let (_dir, state, router) = app().await;
        std::fs::write(
            state.store.output_dir().join("task_a_render.mp4"),
            vec![0u8; 128],
        )
        .unwrap();

        let (status, body) = get_json(&router, "/outputs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "task_a_render.mp4");
        assert_eq!(body[0]["size"], 128);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/outputs/task_a_render.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "video/mp4"
        );
    }

    #[tokio::test]
    async fn test_output_name_traversal_rejected() {
        let (_dir, _state, router) = app().await;
        let (status, _) = get_json(&router, "/outputs/..%2Ftasks%2Ftask_a.json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
