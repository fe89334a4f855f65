use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::common::identity::Identity;

use super::provider::VerifiedIdentity;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a signed-in voter or host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "sub")]
    pub identity: Identity,
    #[serde(rename = "vfd")]
    pub verified: bool,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for an identity vouched for by the identity provider.
    pub fn new(identity: VerifiedIdentity) -> Self {
        Self {
            identity: identity.identity,
            verified: identity.verified,
        }
    }

    #[allow(clippy::missing_panics_doc)]
    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie.
    ///
    /// A missing or invalid cookie fails with 401. Routes that serve
    /// anonymous callers too take an `Option<AuthToken>` instead.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = try_outcome!(req
            .cookies()
            .get(AUTH_TOKEN_COOKIE)
            .ok_or_else(|| Error::Status(Status::Unauthorized, "Please sign in".to_string()))
            .into_outcome(Status::Unauthorized));
        Self::from_cookie(cookie, config).into_outcome(Status::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use rocket::http::Cookie;

    use super::*;

    #[test]
    fn cookie_round_trip_preserves_identity() {
        let config = Config::example();
        let token = AuthToken {
            identity: Identity::example_phone(),
            verified: true,
        };
        let cookie = token.clone().into_cookie(&config);
        assert_eq!(cookie.name(), AUTH_TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(AuthToken::from_cookie(&cookie, &config).unwrap(), token);
    }

    #[test]
    fn tampered_cookie_is_rejected() {
        let config = Config::example();
        let cookie = Cookie::new(AUTH_TOKEN_COOKIE, "not.a.jwt");
        assert!(AuthToken::from_cookie(&cookie, &config).is_err());
    }
}
