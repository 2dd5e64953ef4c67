pub mod get_transaction;
pub mod ingest_transaction;

pub use get_transaction::{GetTransaction, LookupError};
pub use ingest_transaction::{IngestError, IngestOutcome, IngestTransaction};
