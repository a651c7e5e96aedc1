//! Caller identity for GET /key-capsules/{id}
//!
//! TLS terminates in front of this server. The proxy verifies the client
//! certificate and forwards its public key as base64 SPKI DER in a header;
//! the middleware below turns that into a [`ClientIdentity`] request
//! extension. Without a trusted, well-formed header there is no identity.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use cdoc2_crypto::PublicKey;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::ApiError;

/// Public key from the verified client certificate
#[derive(Debug, Clone)]
pub struct ClientIdentity(pub Arc<PublicKey>);

#[derive(Debug, Clone)]
pub struct IdentitySource {
    pub trust_forwarded: bool,
    pub header: String,
}

pub async fn forwarded_identity(
    State(source): State<Arc<IdentitySource>>,
    mut req: Request,
    next: Next,
) -> Response {
    if source.trust_forwarded {
        if let Some(value) = req.headers().get(source.header.as_str()) {
            match decode(value.as_bytes()) {
                Ok(key) => {
                    debug!(algorithm = key.algorithm(), "client identity from forwarded header");
                    req.extensions_mut().insert(ClientIdentity(Arc::new(key)));
                }
                Err(e) => warn!(header = %source.header, "ignoring malformed client identity: {e}"),
            }
        }
    }
    next.run(req).await
}

fn decode(value: &[u8]) -> Result<PublicKey, String> {
    let der = STANDARD
        .decode(value.trim_ascii())
        .map_err(|e| format!("base64: {e}"))?;
    PublicKey::from_spki_der(&der).map_err(|e| e.to_string())
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ClientIdentity>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}
