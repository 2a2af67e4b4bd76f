use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::services::tip_engine::Session;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The person id issued by the auth provider.
    pub sub: String,
    pub exp: usize,
}

/// Attaches a `Session` to the request when a valid bearer token is present.
/// Absence of a session is not an error here: read paths work signed out,
/// and tip edits answer with a sign-in prompt instead of a 401.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        let decoding_key = DecodingKey::from_secret(state.config.jwt_secret.as_ref());
        match decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256)) {
            Ok(token_data) => {
                request.extensions_mut().insert(Session {
                    person_id: token_data.claims.sub,
                });
            }
            Err(e) => {
                tracing::debug!("ignoring invalid bearer token: {}", e);
            }
        }
    }
    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
}
