use axum::{
    response::IntoResponse,
    routing::{get, on},
    Json, Router,
};
use incidents::database::Database;
use serde_json::json;

pub mod incident;
pub mod itinerary;

use crate::{
    common::{route_not_found, METHOD_FILTER_ALL},
    WebState,
};

pub fn routes<D: Database>(state: WebState<D>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .nest_service("/incident", incident::routes(state.clone()))
        .nest_service("/itinerary", itinerary::routes(state))
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

async fn ping() -> impl IntoResponse {
    Json(json!({
        "message": "pong!"
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::Value;

    use crate::testing::serve;

    #[tokio::test]
    async fn ping_pongs() {
        let server = serve().await;
        let response = server.http.get(server.url("/ping")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "pong!");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let server = serve().await;
        let response = server
            .http
            .get(server.url("/stops/nearby"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["requestedUri"], "/stops/nearby");
    }
}
