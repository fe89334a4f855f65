//! Types shared between the database and API representations.

pub mod digest;
pub mod election;
pub mod identity;
