mod bson;
mod collection;
mod counter;
mod errors;

pub use bson::{serde_nested_string_map, serde_string_map, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::NetworkCounter;
pub use errors::{is_duplicate_key_error, is_retryable_transaction_error};
