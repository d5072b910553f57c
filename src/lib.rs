use axum::Router;
use axum::routing::{get, post};
use handlers::Context;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod lifecycle;
pub mod logger;
pub mod ones;
pub mod settings;


/// Builds the HTTP surface of the service.
pub fn router(ctx: Arc<Context>) -> Router {
    let max_concurrent_requests = ctx.config.max_concurrent_requests;
    Router::new()
        .route("/", get(lifecycle::manifest))
        .route("/install_cb", post(lifecycle::install_callback))
        .route("/enabled_cb", post(lifecycle::enabled_callback))
        .route("/settingPage/entries", post(lifecycle::setting_page_entries))
        .route(
            "/settings/watcher-rule",
            get(settings::get_watcher_rule).put(settings::save_watcher_rule),
        )
        .route("/event_cb", post(ones::webhook))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(axum::middleware::from_fn(logger::with_request_id))
                .layer(CatchPanicLayer::new())
                .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests)),
        )
        .with_state(ctx)
}
