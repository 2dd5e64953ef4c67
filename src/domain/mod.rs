//! Framework-agnostic domain types.

pub mod amount;
pub mod transaction;

pub use transaction::{NewTransaction, Transaction, TransactionStatus};
