mod models;
mod schema;
mod store;
mod trait_def;

pub use models::*;
pub use schema::KARA_VERSIONED_SCHEMAS;
pub use store::SqliteKaraStore;
pub use trait_def::{CatalogTransaction, KaraStore};
