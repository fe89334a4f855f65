use std::sync::Arc;

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::common::identity::Identity;

/// An identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub identity: Identity,
    /// Whether the provider has confirmed the user controls this identity,
    /// e.g. by OTP for phone numbers or a verification link for emails.
    pub verified: bool,
}

/// Something that can turn a provider-issued ID token into an identity.
///
/// Authentication itself (OTPs, passwords, verification emails) happens
/// entirely at the provider; this backend only consumes the outcome.
#[rocket::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve an ID token, returning `None` if the provider rejects it.
    async fn resolve(&self, id_token: &str) -> Result<Option<VerifiedIdentity>>;
}

/// The identity provider, as held in managed state.
pub type Identities = Arc<dyn IdentityProvider>;

const FIREBASE_LOOKUP_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1/accounts:lookup";

/// Resolves Firebase Authentication ID tokens via the Identity Toolkit REST API.
pub struct FirebaseIdentityProvider {
    http: Client,
    api_key: String,
}

impl FirebaseIdentityProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    phone_number: Option<String>,
}

impl LookupUser {
    /// Phone sign-in is only possible after an OTP round trip, so a phone
    /// number is always verified and takes precedence over any email.
    fn into_verified_identity(self) -> Option<VerifiedIdentity> {
        if let Some(identity) = self.phone_number.and_then(|p| p.parse().ok()) {
            return Some(VerifiedIdentity {
                identity,
                verified: true,
            });
        }
        let identity = self.email?.parse().ok()?;
        Some(VerifiedIdentity {
            identity,
            verified: self.email_verified,
        })
    }
}

#[rocket::async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn resolve(&self, id_token: &str) -> Result<Option<VerifiedIdentity>> {
        let response = self
            .http
            .post(FIREBASE_LOOKUP_ENDPOINT)
            .query(&[("key", &self.api_key)])
            .json(&LookupRequest { id_token })
            .send()
            .await?;

        // Invalid or expired tokens are reported as a plain bad request.
        if response.status() == StatusCode::BAD_REQUEST {
            debug!("Identity provider rejected ID token");
            return Ok(None);
        }

        let lookup: LookupResponse = response.error_for_status()?.json().await?;
        let identity = lookup
            .users
            .into_iter()
            .next()
            .and_then(LookupUser::into_verified_identity);
        if identity.is_none() {
            warn!("Identity provider returned no usable email or phone number");
        }
        Ok(identity)
    }
}

/// Test double: accepts tokens of the form `verified:<identity>` or
/// `unverified:<identity>`.
#[cfg(test)]
pub struct StaticIdentityProvider;

#[cfg(test)]
impl StaticIdentityProvider {
    pub fn token(identity: &str) -> String {
        format!("verified:{identity}")
    }

    pub fn unverified_token(identity: &str) -> String {
        format!("unverified:{identity}")
    }
}

#[cfg(test)]
#[rocket::async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, id_token: &str) -> Result<Option<VerifiedIdentity>> {
        let resolved = id_token.split_once(':').and_then(|(kind, identity)| {
            let verified = match kind {
                "verified" => true,
                "unverified" => false,
                _ => return None,
            };
            Some(VerifiedIdentity {
                identity: identity.parse().ok()?,
                verified,
            })
        });
        Ok(resolved)
    }
}
