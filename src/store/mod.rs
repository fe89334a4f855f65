//! Persistent election state.
//!
//! Every implementation must evaluate [`ElectionStore::admit_vote`] as a
//! single atomic step: two racing submissions can never both pass a gate
//! that only one of them should.

use std::sync::Arc;

use crate::error::{Rejection, Result};
use crate::model::{
    common::{election::Selections, identity::Identity},
    db::{
        election::{Election, NewElection},
        vote::Vote,
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// The election store, as held in managed state.
pub type Store = Arc<dyn ElectionStore>;

#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    /// Persist a new election, assigning it an ID.
    async fn create_election(&self, election: NewElection) -> Result<Election>;

    async fn election(&self, id: Id) -> Result<Option<Election>>;

    /// Every election created by `host`, newest first.
    async fn elections_hosted_by(&self, host: &Identity) -> Result<Vec<Election>>;

    /// Mark an open election as closed, returning its final state.
    async fn close_election(&self, id: Id) -> Result<Election>;

    /// Admit a vote whose identity has already been checked and hashed.
    ///
    /// Evaluates, in order, and rejects on the first failure:
    ///
    /// 1. no existing vote shares the identity hash,
    /// 2. no existing vote shares the device hash, if there is one,
    /// 3. fewer than `network_cap` votes share the network address, if both are set,
    /// 4. the election exists, is open, and the selections fit its ballot,
    ///
    /// and only then writes the vote.
    async fn admit_vote(&self, vote: Vote, network_cap: Option<u32>) -> Result<()>;

    /// Every vote admitted to the given election.
    async fn votes(&self, election_id: Id) -> Result<Vec<Vote>>;
}

/// The election gate shared by all stores.
fn check_election(
    election: Option<&Election>,
    selections: &Selections,
) -> std::result::Result<(), Rejection> {
    let election = election.ok_or(Rejection::ElectionNotFound)?;
    if election.closed {
        return Err(Rejection::ElectionClosed);
    }
    if selections.is_empty() {
        return Err(Rejection::NoSelections);
    }
    if !selections.fits(&election.positions) {
        return Err(Rejection::InvalidSelection);
    }
    Ok(())
}
