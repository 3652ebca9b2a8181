use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::handler::{self, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::healthcheck))
        .route("/lists", get(handler::get_lists).post(handler::create_list))
        .route(
            "/lists/:id",
            get(handler::get_list)
                .put(handler::update_list)
                .delete(handler::delete_list),
        )
        .route("/books", post(handler::add_book))
        .route("/books/:id", delete(handler::delete_book))
}
