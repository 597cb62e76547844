use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// User administration, nested under `/admin`. The router is wrapped in `auth_middleware`
/// followed by `admin_middleware`, and every handler additionally extracts `AdminUser`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users?search=
        .route("/users", get(handlers::list_users))
        // GET/PUT/DELETE /admin/users/{id}
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // GET /admin/stats
        .route("/stats", get(handlers::get_admin_stats))
}
