use log::info;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::api::{
    auth::{AuthToken, Identities, SessionRequest, AUTH_TOKEN_COOKIE},
    response::{Message, SessionInfo, Success},
};

pub fn routes() -> Vec<Route> {
    routes![sign_in, whoami, sign_out]
}

/// Exchange an identity provider ID token for a session cookie.
#[post("/auth/session", data = "<request>", format = "json")]
async fn sign_in(
    request: Json<SessionRequest>,
    cookies: &CookieJar<'_>,
    identities: &State<Identities>,
    config: &State<Config>,
) -> Result<Json<Success<SessionInfo>>> {
    let verified = identities
        .resolve(&request.id_token)
        .await?
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "Sign-in failed: the ID token was not accepted".to_string(),
            )
        })?;

    let token = AuthToken::new(verified);
    info!("Signed in {} (verified: {})", token.identity, token.verified);
    let session = SessionInfo {
        identity: token.identity.to_string(),
        verified: token.verified,
    };
    cookies.add(token.into_cookie(config));

    Ok(Success::json(session))
}

#[get("/auth/session")]
async fn whoami(token: AuthToken) -> Json<Success<SessionInfo>> {
    Success::json(SessionInfo {
        identity: token.identity.to_string(),
        verified: token.verified,
    })
}

#[delete("/auth/session")]
async fn sign_out(cookies: &CookieJar<'_>) -> Json<Success<Message>> {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Success::json(Message::new("Signed out"))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, Value},
    };

    use crate::model::{api::auth::StaticIdentityProvider, common::identity::Identity};

    use super::*;

    async fn sign_in_with(client: &Client, id_token: &str) -> Status {
        client
            .post(uri!(sign_in))
            .header(ContentType::JSON)
            .body(json!({ "idToken": id_token }).to_string())
            .dispatch()
            .await
            .status()
    }

    #[backend_test]
    async fn sign_in_sets_cookie(client: Client) {
        let status = sign_in_with(&client, &StaticIdentityProvider::token("+44 1234 567890")).await;
        assert_eq!(status, Status::Ok);
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.get(uri!(whoami)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let session: Success<SessionInfo> = response.into_json().await.unwrap();
        assert_eq!(session.body.identity, Identity::example_phone().to_string());
        assert!(session.body.verified);
    }

    #[backend_test]
    async fn rejected_id_token_is_unauthorized(client: Client) {
        let status = sign_in_with(&client, "forged").await;
        assert_eq!(status, Status::Unauthorized);
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());
    }

    #[backend_test]
    async fn whoami_requires_session(client: Client) {
        let response = client.get(uri!(whoami)).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["ok"], false);
    }

    #[backend_test(voter)]
    async fn sign_out_clears_session(client: Client) {
        let response = client.delete(uri!(sign_out)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());

        let response = client.get(uri!(whoami)).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[backend_test]
    async fn unverified_identities_can_still_sign_in(client: Client) {
        let status = sign_in_with(
            &client,
            &StaticIdentityProvider::unverified_token("new@example.com"),
        )
        .await;
        assert_eq!(status, Status::Ok);

        let session: Success<SessionInfo> = client
            .get(uri!(whoami))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(!session.body.verified);
    }
}
