//! Platform-agnostic sign-in result types
//!
//! One result shape per provider, tagged with the platform that produced it.
//! The identity token is always present on success; every other field is
//! best-effort and depends on what the provider surfaced on this platform.

use serde::{Deserialize, Serialize};

/// The platform a sign-in result originated from
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
    Desktop,
}

/// Result of a Google sign-in
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GoogleSignInResult {
    pub id_token: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub platform: Platform,
}

/// Result of an Apple sign-in
///
/// `email` and `full_name` are only populated by Apple on the user's first
/// consent; their absence on later sign-ins is not an error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppleSignInResult {
    pub id_token: String,
    pub auth_code: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<FullName>,
    pub platform: Platform,
}

/// Name components as Apple delivers them
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FullName {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl FullName {
    /// True when neither component is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.given_name.is_none() && self.family_name.is_none()
    }
}

/// Result of a Microsoft sign-in
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MicrosoftSignInResult {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub email: Option<String>,
    pub tenant_id: Option<String>,
    pub platform: Platform,
}

/// Provider-tagged result delivered through the capability interface
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum SignInResult {
    Google(GoogleSignInResult),
    Apple(AppleSignInResult),
    Microsoft(MicrosoftSignInResult),
}

impl SignInResult {
    /// The platform the result originated from
    #[must_use]
    pub fn platform(&self) -> Platform {
        match self {
            Self::Google(r) => r.platform,
            Self::Apple(r) => r.platform,
            Self::Microsoft(r) => r.platform,
        }
    }

    /// The identity token, when the provider returned one
    #[must_use]
    pub fn id_token(&self) -> Option<&str> {
        match self {
            Self::Google(r) => Some(&r.id_token),
            Self::Apple(r) => Some(&r.id_token),
            Self::Microsoft(r) => r.id_token.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_serde_tags() {
        assert_eq!(serde_json::to_string(&Platform::Ios).unwrap(), "\"ios\"");
        assert_eq!(serde_json::to_string(&Platform::Web).unwrap(), "\"web\"");
        let parsed: Platform = serde_json::from_str("\"desktop\"").unwrap();
        assert_eq!(parsed, Platform::Desktop);
    }

    #[test]
    fn test_apple_result_allows_absent_optional_fields() {
        let result = AppleSignInResult {
            id_token: "token".to_string(),
            auth_code: None,
            user_id: Some("user".to_string()),
            email: None,
            full_name: None,
            platform: Platform::Ios,
        };

        // Round-trip keeps the token and the absent best-effort fields
        let json = serde_json::to_string(&result).unwrap();
        let parsed: AppleSignInResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_sign_in_result_accessors() {
        let result = SignInResult::Microsoft(MicrosoftSignInResult {
            id_token: Some("jwt".to_string()),
            access_token: Some("at".to_string()),
            email: Some("user@contoso.com".to_string()),
            tenant_id: Some("tenant".to_string()),
            platform: Platform::Web,
        });

        assert_eq!(result.platform(), Platform::Web);
        assert_eq!(result.id_token(), Some("jwt"));
    }

    #[test]
    fn test_full_name_emptiness() {
        let empty = FullName {
            given_name: None,
            family_name: None,
        };
        assert!(empty.is_empty());

        let partial = FullName {
            given_name: Some("Jane".to_string()),
            family_name: None,
        };
        assert!(!partial.is_empty());
    }
}
