use rocket::{serde::json::Json, Route, State};

use crate::admission::{self, Submission};
use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::{
        auth::AuthToken,
        response::{Message, Success},
        vote::{ClientAddress, VoteRequest},
    },
    mongodb::Id,
};
use crate::store::Store;

pub fn routes() -> Vec<Route> {
    routes![cast_vote]
}

/// Submit a vote, subject to the admission check.
///
/// The session is optional here so that an anonymous submission gets the
/// admission check's own "missing identity" rejection.
#[post("/elections/<election_id>/votes", data = "<vote>", format = "json")]
async fn cast_vote(
    token: Option<AuthToken>,
    election_id: Id,
    vote: Json<VoteRequest>,
    address: ClientAddress,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<Json<Success<Message>>> {
    let vote = vote.into_inner();
    let submission = Submission {
        election_id,
        identity: token.as_ref().map(|token| token.identity.to_string()),
        verified: token.map_or(false, |token| token.verified),
        device_fingerprint: vote.device_fingerprint,
        ip_address: address.0,
        selections: vote.votes,
    };
    admission::admit(store, config, submission).await?;

    Ok(Success::json(Message::new("Your vote has been recorded")))
}
