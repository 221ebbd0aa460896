//! Static serving of the transcode output tree.

use std::path::Path;

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use hlsladder_transcoder::hls;
use tower_http::services::ServeDir;

/// Router for `/output`: files under `root`, served verbatim with range
/// and conditional request support.
pub fn output_router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(hls_content_type))
}

/// Playlists and segments get the HLS content types regardless of the
/// platform mime table.
async fn hls_content_type(req: Request, next: Next) -> Response {
    let name = req.uri().path().rsplit('/').next().unwrap_or_default();
    let content_type = hls::content_type(name);

    let mut response = next.run(req).await;
    if response.status().is_success() {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}
