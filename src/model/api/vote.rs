use std::convert::Infallible;

use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};

use crate::model::common::election::Selections;

/// A vote as submitted by a voter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    /// Position index to candidate index.
    pub votes: Selections,
    /// Client-collected browser fingerprint, if the client sent one.
    #[serde(default)]
    pub device_fingerprint: Option<String>,
}

const FORWARDED_FOR: &str = "X-Forwarded-For";

/// The network address a request came from.
///
/// Behind a proxy this is the first `X-Forwarded-For` entry, otherwise the
/// peer address. Clients can forge the header, so this is only as
/// trustworthy as the proxy in front of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub Option<String>);

impl ClientAddress {
    fn from_forwarded_for(header: &str) -> Option<String> {
        header
            .split(',')
            .next()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientAddress {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let forwarded = req
            .headers()
            .get_one(FORWARDED_FOR)
            .and_then(Self::from_forwarded_for);
        let address = forwarded.or_else(|| req.client_ip().map(|ip| ip.to_string()));
        Outcome::Success(Self(address))
    }
}
