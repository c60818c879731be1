//! Unverified identity-token decoding and claim extraction
//!
//! Decodes the payload segment of a JWT without verifying its signature and
//! extracts the claims the sign-in results are built from. Signature
//! verification is deliberately out of scope: the tokens come straight from
//! the identity provider and the host application is expected to verify them
//! server-side before trusting any claim.

use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use thiserror::Error;

/// Failures while decoding an identity token payload
///
/// Each variant is distinguishable from "no token returned", which is a
/// provider error, not a parse error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenParseError {
    /// The token did not split into the three dot-separated JWT segments
    #[error("expected 3 dot-separated segments, found {0}")]
    SegmentCount(usize),

    /// The payload segment is not valid base64url
    #[error("payload segment is not valid base64url")]
    Base64,

    /// The decoded payload is not valid UTF-8
    #[error("payload segment is not valid UTF-8")]
    Utf8,

    /// The decoded payload is not a JSON object
    #[error("payload segment is not a JSON object")]
    Json,
}

/// Decode the payload segment of a JWT without verifying the signature
///
/// # Errors
///
/// Returns a [`TokenParseError`] if the token does not have exactly three
/// segments, or the middle segment is not base64url-encoded JSON.
pub fn decode_payload(token: &str) -> Result<Value, TokenParseError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenParseError::SegmentCount(segments.len()));
    }

    let payload = segments[1];
    // Providers emit unpadded base64url; tolerate padded standard base64 too
    let bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| general_purpose::STANDARD.decode(payload))
        .map_err(|_| TokenParseError::Base64)?;

    let text = String::from_utf8(bytes).map_err(|_| TokenParseError::Utf8)?;
    let value: Value = serde_json::from_str(&text).map_err(|_| TokenParseError::Json)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(TokenParseError::Json)
    }
}

/// Claims decoded from an identity token payload
#[derive(Debug, Clone)]
pub struct Claims(Value);

impl Claims {
    /// Decode the claims of an identity token
    ///
    /// # Errors
    ///
    /// Returns a [`TokenParseError`] for malformed tokens; see [`decode_payload`].
    pub fn from_id_token(token: &str) -> Result<Self, TokenParseError> {
        decode_payload(token).map(Self)
    }

    /// Raw claim access for provider-specific lookups
    #[must_use]
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    fn str_claim(&self, claim: &str) -> Option<&str> {
        self.0.get(claim).and_then(Value::as_str)
    }

    /// The `sub` claim - the provider-scoped user identifier
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// The `email` claim
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    /// The `nonce` claim, carried back from the authorization request
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.str_claim("nonce")
    }

    /// Display name: the `name` claim, or `given_name` + `family_name` joined
    #[must_use]
    pub fn name(&self) -> Option<String> {
        if let Some(name) = self.str_claim("name") {
            return Some(name.to_string());
        }

        let given = self.str_claim("given_name");
        let family = self.str_claim("family_name");
        match (given, family) {
            (Some(g), Some(f)) => Some(format!("{g} {f}")),
            (Some(g), None) => Some(g.to_string()),
            (None, Some(f)) => Some(f.to_string()),
            (None, None) => None,
        }
    }

    /// The `tid` claim - the Microsoft tenant identifier
    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        self.str_claim("tid")
    }

    /// Account label for Microsoft tokens: `preferred_username`, then `email`
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.str_claim("preferred_username").or_else(|| self.email())
    }
}
