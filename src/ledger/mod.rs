pub mod asset_book;
pub mod balance;
pub mod transaction_log;

pub use asset_book::AssetBook;
pub use balance::BalanceLedger;
pub use transaction_log::{TransactionLog, DEFAULT_PAGE_SIZE};
