pub mod api;
pub mod chain;
pub mod clock;
pub mod configure;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logger;
pub mod logging;
pub mod models;
pub mod settlement;

pub use error::{LedgerError, LedgerResult};
