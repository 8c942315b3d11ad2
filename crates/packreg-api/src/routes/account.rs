//! GET /v1/account — who the bearer token identifies.
//!
//! The installer calls this to run its tier check before transferring any
//! content.

use axum::routing::get;
use axum::{Json, Router};
use packreg_core::wire::AccountInfo;

use crate::auth::CallerIdentity;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/account", get(account))
}

async fn account(caller: CallerIdentity) -> Json<AccountInfo> {
    Json(AccountInfo {
        subject: caller.subject,
        tier: caller.tier,
    })
}
