pub mod archive;
pub mod db;
pub mod models;
pub mod queries;
pub mod record_store;
pub mod schema;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
