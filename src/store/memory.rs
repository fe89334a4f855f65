use std::collections::HashMap;

use rocket::{http::Status, tokio::sync::Mutex};

use crate::error::{Error, Rejection, Result};
use crate::model::{
    common::identity::Identity,
    db::{
        election::{Election, NewElection},
        vote::Vote,
    },
    mongodb::Id,
};

use super::{check_election, ElectionStore};

/// A store that lives and dies with the process.
///
/// A single lock guards all state, which is what makes admission atomic here.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    elections: HashMap<Id, Election>,
    votes: Vec<Vote>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn create_election(&self, election: NewElection) -> Result<Election> {
        let election = Election {
            id: Id::new(),
            election,
        };
        self.state
            .lock()
            .await
            .elections
            .insert(election.id, election.clone());
        Ok(election)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.state.lock().await.elections.get(&id).cloned())
    }

    async fn elections_hosted_by(&self, host: &Identity) -> Result<Vec<Election>> {
        let state = self.state.lock().await;
        let mut hosted: Vec<Election> = state
            .elections
            .values()
            .filter(|election| election.is_hosted_by(host))
            .cloned()
            .collect();
        hosted.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(hosted)
    }

    async fn close_election(&self, id: Id) -> Result<Election> {
        let mut state = self.state.lock().await;
        let election = state
            .elections
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("Election {id}")))?;
        if election.closed {
            return Err(Error::Status(
                Status::BadRequest,
                format!("Election {id} is already closed"),
            ));
        }
        election.closed = true;
        Ok(election.clone())
    }

    async fn admit_vote(&self, vote: Vote, network_cap: Option<u32>) -> Result<()> {
        let mut state = self.state.lock().await;
        let same_election = |v: &&Vote| v.election_id == vote.election_id;

        if state
            .votes
            .iter()
            .filter(same_election)
            .any(|v| v.identity_hash == vote.identity_hash)
        {
            return Err(Rejection::DuplicateIdentity.into());
        }

        if let Some(device) = &vote.device_hash {
            if state
                .votes
                .iter()
                .filter(same_election)
                .any(|v| v.device_hash.as_ref() == Some(device))
            {
                return Err(Rejection::DuplicateDevice.into());
            }
        }

        if let (Some(cap), Some(ip)) = (network_cap, &vote.ip_address) {
            let from_network = state
                .votes
                .iter()
                .filter(same_election)
                .filter(|v| v.ip_address.as_ref() == Some(ip))
                .count();
            if from_network >= cap as usize {
                return Err(Rejection::NetworkLimitExceeded.into());
            }
        }

        let election = state.elections.get_mut(&vote.election_id);
        check_election(election.as_deref(), &vote.selections)?;
        if let Some(election) = election {
            election.vote_count += 1;
        }

        state.votes.push(vote);
        Ok(())
    }

    async fn votes(&self, election_id: Id) -> Result<Vec<Vote>> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .iter()
            .filter(|v| v.election_id == election_id)
            .cloned()
            .collect())
    }
}
