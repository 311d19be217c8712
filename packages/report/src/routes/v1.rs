use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/reports", report_routes())
        .nest("/dlq", dlq_routes())
}

fn report_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::report::list_reports))
        .routes(routes!(handlers::report::get_report))
}

fn dlq_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::dlq::list_dlq_messages))
        .routes(routes!(handlers::dlq::get_dlq_stats))
        .routes(routes!(handlers::dlq::get_dlq_message))
        .routes(routes!(handlers::dlq::retry_dlq_message))
        .routes(routes!(handlers::dlq::resolve_dlq_message))
}
