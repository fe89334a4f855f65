use log::info;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        election::{ElectionDescription, ElectionSpec, ElectionSummary},
        response::{Closed, Created, ElectionList, Success},
    },
    db::election::Election,
    mongodb::Id,
};
use crate::store::Store;

pub fn routes() -> Vec<Route> {
    routes![create_election, my_elections, election, close_election]
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken,
    spec: Json<ElectionSpec>,
    store: &State<Store>,
) -> Result<Json<Success<Created>>> {
    let election = spec.into_inner().into_election(&token.identity)?;
    let election = store.create_election(election).await?;
    info!("{} created election {}", token.identity, election.id);
    Ok(Success::json(Created {
        election: election.into(),
    }))
}

#[get("/elections/mine")]
async fn my_elections(
    token: AuthToken,
    store: &State<Store>,
) -> Result<Json<Success<ElectionList>>> {
    let elections = store
        .elections_hosted_by(&token.identity)
        .await?
        .into_iter()
        .map(ElectionSummary::from)
        .collect();
    Ok(Success::json(ElectionList { elections }))
}

#[get("/elections/<election_id>")]
async fn election(
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<Success<ElectionDescription>>> {
    let election = find_election(store, election_id).await?;
    Ok(Success::json(election.into()))
}

#[post("/elections/<election_id>/close")]
async fn close_election(
    token: AuthToken,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<Success<Closed>>> {
    let election = find_election(store, election_id).await?;
    require_host(&election, &token)?;

    let closed = store.close_election(election_id).await?;
    info!(
        "Election {election_id} closed with {} votes",
        closed.vote_count
    );
    Ok(Success::json(Closed {
        total_votes: closed.vote_count,
    }))
}

/// Fetch an election, or fail with 404.
pub(super) async fn find_election(store: &Store, election_id: Id) -> Result<Election> {
    store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

/// Fail with 403 unless the token belongs to the election's host.
pub(super) fn require_host(election: &Election, token: &AuthToken) -> Result<()> {
    if election.is_hosted_by(&token.identity) {
        Ok(())
    } else {
        Err(Error::Status(
            Status::Forbidden,
            "Only the host of this election can do that".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, Value},
    };

    use crate::model::{
        api::auth::StaticIdentityProvider, common::identity::Identity, db::election::NewElection,
    };

    use super::*;

    async fn create_example(client: &Client) -> ElectionDescription {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(ElectionSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let created: Success<Created> = response.into_json().await.unwrap();
        created.body.election
    }

    #[backend_test(host)]
    async fn create_and_fetch_election(client: Client) {
        let created = create_example(&client).await;
        assert_eq!(created.title, "Student Council");
        assert_eq!(created.host, Identity::example_host().to_string());
        assert!(!created.closed);

        let id: Id = created.id.parse().unwrap();
        let response = client.get(uri!(election(id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let fetched: Success<ElectionDescription> = response.into_json().await.unwrap();
        assert!(fetched.ok);
        assert_eq!(fetched.body, created);
    }

    #[backend_test(host)]
    async fn invalid_spec_is_rejected(client: Client) {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(
                json!({
                    "title": "Club",
                    "positions": [{"name": "Chair", "candidates": [" "]}],
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "Please add at least one candidate for Chair");
    }

    #[backend_test]
    async fn creating_requires_session(client: Client) {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(ElectionSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[backend_test(host)]
    async fn host_lists_own_elections(client: Client, store: Store) {
        let mine = create_example(&client).await;
        let mut foreign = NewElection::example();
        foreign.created_by = "someone@example.com".to_string();
        store.create_election(foreign).await.unwrap();

        let list: Success<ElectionList> = client
            .get(uri!(my_elections))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(list.body.elections.len(), 1);
        assert_eq!(list.body.elections[0].id, mine.id);
        assert_eq!(list.body.elections[0].vote_count, 0);
    }

    #[backend_test]
    async fn unknown_election_is_not_found(client: Client) {
        let response = client.get(uri!(election(Id::new()))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["ok"], false);
    }

    #[backend_test(host)]
    async fn host_closes_election_once(client: Client) {
        let id: Id = create_example(&client).await.id.parse().unwrap();

        let response = client.post(uri!(close_election(id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let closed: Success<Closed> = response.into_json().await.unwrap();
        assert_eq!(closed.body.total_votes, 0);

        let response = client.post(uri!(close_election(id))).dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[backend_test(voter)]
    async fn only_host_may_close(client: Client, store: Store) {
        let election = store
            .create_election(NewElection::example())
            .await
            .unwrap();

        let response = client
            .post(uri!(close_election(election.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
        assert!(!store.election(election.id).await.unwrap().unwrap().closed);
    }

    #[backend_test]
    async fn host_identity_is_normalised(client: Client, store: Store) {
        // Sign in with a differently formatted version of the host's email.
        let token = StaticIdentityProvider::token("  HOST@example.com");
        client
            .post("/auth/session")
            .header(ContentType::JSON)
            .body(json!({ "idToken": token }).to_string())
            .dispatch()
            .await;
        let election = store
            .create_election(NewElection::example())
            .await
            .unwrap();

        let response = client
            .post(uri!(close_election(election.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }
}
