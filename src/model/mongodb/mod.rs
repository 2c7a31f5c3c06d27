mod bson;
mod collection;
mod errors;

pub use bson::{hex_id, hex_ids, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::is_duplicate_key_error;
