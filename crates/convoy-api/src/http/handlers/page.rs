//! GET / - single-page control panel with Start / Stop buttons and a live
//! status readout. It only talks to the `/api/v1` endpoints.

use axum::response::{Html, IntoResponse};

pub async fn index() -> impl IntoResponse {
    Html(include_str!("../../../static/control.html"))
}
