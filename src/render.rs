use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

/// Everything a view needs besides its name.
#[derive(Debug, Serialize)]
pub struct PageContext {
    pub flashes: Vec<String>,
    /// Must be posted back as the `csrf_token` field of any form on the page.
    pub csrf_token: String,
    pub data: Value,
}

/// Turns a named view and its data into a response.
pub trait Renderer: Send + Sync {
    fn render(&self, view: &str, page: PageContext) -> Response;
}

/// Renders every view as a JSON document: `{ view, flashes, csrf_token, data }`.
pub struct JsonRenderer;

#[derive(Serialize)]
struct JsonPage<'a> {
    view: &'a str,
    #[serde(flatten)]
    page: PageContext,
}

impl Renderer for JsonRenderer {
    fn render(&self, view: &str, page: PageContext) -> Response {
        Json(JsonPage { view, page }).into_response()
    }
}
