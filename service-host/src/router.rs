use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Application routes. `/_readiness` is added by the HTTP service itself since
/// it depends on the stopping token.
pub fn router(service_name: &str) -> Router {
    let index = format!("{service_name}\n");
    Router::new()
        .route(
            "/",
            get(move || {
                let index = index.clone();
                async move { index }
            }),
        )
        .route("/_liveness", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
}
