//! Mints a fresh session guid for a user.
//!
//! Real identity and auth (the bearer check this demo stubs out in
//! `main.rs`) live outside this engine's scope; this endpoint only
//! hands the client something to present to `/ws` or `/poll` next.

use axum::extract::Path;
use axum::response::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct MintedSession {
    guid: String,
}

pub async fn handler(Path(user): Path<String>) -> Json<MintedSession> {
    tracing::info!(%user, "minted session guid");
    Json(MintedSession {
        guid: uuid::Uuid::new_v4().to_string(),
    })
}
