use crate::auth::Identity;
use axum::Extension;
use axum::response::Json;

/// Echo the identity the auth layer verified.
pub async fn profile(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}
