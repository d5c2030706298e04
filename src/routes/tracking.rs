//! Email open tracking.
//!
//! The pixel endpoint always answers with the same 1x1 GIF, whatever the
//! token looks like: a broken image in a mail client reveals more than it
//! helps, and the response must not leak whether a token exists.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::repos::email_log_repo;
use crate::state::SharedState;

// 1x1 transparent GIF.
const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

pub fn router() -> Router<SharedState> {
    Router::new().route("/email/track/{file}", get(track_open))
}

async fn track_open(
    State(state): State<SharedState>,
    Path(file): Path<String>,
) -> impl IntoResponse {
    if let Some(token) = file
        .strip_suffix(".png")
        .and_then(|t| Uuid::parse_str(t).ok())
    {
        match email_log_repo::mark_opened(&state.db, token).await {
            Ok(true) => tracing::info!(token = %token, "email open recorded"),
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "open tracking update failed"),
        }
    }

    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store, max-age=0"),
        ],
        PIXEL_GIF,
    )
}
