use chrono::Utc;
use log::info;
use rocket::{
    http::{ContentType, Header, Status},
    serde::json::Json,
    Route, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        response::{ElectionCounts, Results, Success},
    },
    db::election::Election,
    mongodb::Id,
    report::{result_rows, Report},
    tally::Tally,
};
use crate::store::Store;

use super::elections::{find_election, require_host};

pub fn routes() -> Vec<Route> {
    routes![counts, results, export]
}

/// MIME type of an Office Open XML workbook.
const XLSX_SUBTYPE: &str = "vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A workbook download.
#[derive(Responder)]
struct Spreadsheet {
    body: Vec<u8>,
    content_type: ContentType,
    disposition: Header<'static>,
}

impl Spreadsheet {
    fn new(body: Vec<u8>, file_name: &str) -> Self {
        Self {
            body,
            content_type: ContentType::new("application", XLSX_SUBTYPE),
            disposition: Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"{file_name}\""),
            ),
        }
    }
}

/// Fetch an election and count its votes.
async fn tally_election(store: &Store, election_id: Id) -> Result<(Election, Tally)> {
    let election = find_election(store, election_id).await?;
    let votes = store.votes(election_id).await?;
    let tally = Tally::count(&election.positions, votes.iter().map(|vote| &vote.selections));
    Ok((election, tally))
}

#[get("/elections/<election_id>/counts")]
async fn counts(election_id: Id, store: &State<Store>) -> Result<Json<Success<ElectionCounts>>> {
    let (_, tally) = tally_election(store, election_id).await?;
    Ok(Success::json(ElectionCounts::from(&tally)))
}

#[get("/elections/<election_id>/results")]
async fn results(election_id: Id, store: &State<Store>) -> Result<Json<Success<Results>>> {
    let (election, tally) = tally_election(store, election_id).await?;
    Ok(Success::json(Results {
        results: result_rows(&election, &tally),
    }))
}

#[get("/elections/<election_id>/export")]
async fn export(token: AuthToken, election_id: Id, store: &State<Store>) -> Result<Spreadsheet> {
    let (election, tally) = tally_election(store, election_id).await?;
    require_host(&election, &token)?;
    if !election.closed {
        return Err(Error::Status(
            Status::BadRequest,
            "Results can only be exported once the election is closed".to_string(),
        ));
    }

    let report = Report::new(&election, &tally, Utc::now());
    let body = report.to_xlsx()?;
    info!(
        "Exported results of election {election_id} ({} bytes)",
        body.len()
    );
    Ok(Spreadsheet::new(body, &report.file_name()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, Value},
    };

    use crate::admission::{admit, Submission};
    use crate::config::Config;
    use crate::model::{
        common::election::Position, db::election::NewElection, report::ResultRow,
    };

    use super::*;

    /// An election with the single position `President: [A, B]`.
    async fn presidential_election(store: &Store) -> Id {
        let mut election = NewElection::example();
        election.positions = vec![Position::president()];
        store.create_election(election).await.unwrap().id
    }

    async fn vote_for(store: &Store, election_id: Id, voter: &str, candidate: usize) {
        let submission = Submission {
            identity: Some(voter.to_string()),
            device_fingerprint: None,
            ip_address: None,
            selections: [(0, candidate)].into_iter().collect(),
            ..Submission::example(election_id)
        };
        admit(store, &Config::example(), submission).await.unwrap();
    }

    async fn president_scenario(store: &Store) -> Id {
        let id = presidential_election(store).await;
        vote_for(store, id, "one@example.com", 0).await;
        vote_for(store, id, "two@example.com", 1).await;
        vote_for(store, id, "three@example.com", 0).await;
        id
    }

    #[backend_test]
    async fn counts_president_scenario(client: Client, store: Store) {
        let id = president_scenario(&store).await;

        let response = client.get(uri!(counts(id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let counts: Success<ElectionCounts> = response.into_json().await.unwrap();
        assert_eq!(counts.body.total_votes, 3);
        assert_eq!(counts.body.vote_counts[&0][&0], 2);
        assert_eq!(counts.body.vote_counts[&0][&1], 1);
        assert_eq!(counts.body.winners[&0], vec![0]);
    }

    #[backend_test]
    async fn counts_are_stable(client: Client, store: Store) {
        let id = president_scenario(&store).await;
        let first: Success<ElectionCounts> =
            client.get(uri!(counts(id))).dispatch().await.into_json().await.unwrap();
        let second: Success<ElectionCounts> =
            client.get(uri!(counts(id))).dispatch().await.into_json().await.unwrap();
        assert_eq!(first, second);
    }

    #[backend_test]
    async fn results_list_every_candidate_and_total(client: Client, store: Store) {
        let id = president_scenario(&store).await;

        let listing: Success<Results> = client
            .get(uri!(results(id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        let row = |position: &str, candidate: &str, votes| ResultRow {
            position: position.to_string(),
            candidate: candidate.to_string(),
            votes,
        };
        assert_eq!(
            listing.body.results,
            vec![
                row("President", "A", 2),
                row("President", "B", 1),
                row("TOTAL", "Total Votes Cast", 3),
            ]
        );
    }

    #[backend_test]
    async fn results_of_unknown_election_are_not_found(client: Client) {
        let response = client.get(uri!(results(Id::new()))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[backend_test(host)]
    async fn host_exports_spreadsheet(client: Client, store: Store) {
        let id = president_scenario(&store).await;
        store.close_election(id).await.unwrap();

        let response = client.get(uri!(export(id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            response.content_type(),
            Some(ContentType::new("application", XLSX_SUBTYPE))
        );
        let disposition = response.headers().get_one("Content-Disposition").unwrap();
        assert_eq!(
            disposition,
            "attachment; filename=\"Student_Council_results.xlsx\""
        );
        let body = response.into_bytes().await.unwrap();
        // XLSX files are zip archives.
        assert_eq!(&body[..2], b"PK");
    }

    #[backend_test(voter)]
    async fn only_host_may_export(client: Client, store: Store) {
        let id = president_scenario(&store).await;
        store.close_election(id).await.unwrap();
        let response = client.get(uri!(export(id))).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[backend_test(host)]
    async fn open_election_cannot_be_exported(client: Client, store: Store) {
        let id = president_scenario(&store).await;
        let response = client.get(uri!(export(id))).dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(
            body["error"],
            "Results can only be exported once the election is closed"
        );
    }

    #[backend_test(host)]
    async fn counts_follow_submitted_votes(client: Client, store: Store) {
        let id = presidential_election(&store).await;
        let path = format!("/elections/{id}/votes");
        let response = client
            .post(path.as_str())
            .header(ContentType::JSON)
            .body(json!({ "votes": {"0": 1} }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let counts: Success<ElectionCounts> =
            client.get(uri!(counts(id))).dispatch().await.into_json().await.unwrap();
        assert_eq!(counts.body.vote_counts[&0][&1], 1);
        assert_eq!(counts.body.winners[&0], vec![1]);
    }
}
