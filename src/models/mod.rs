pub use account::*;
pub use amount::*;
pub use api_response::*;
pub use asset::*;
pub use transaction::*;

pub mod account;
pub mod amount;
pub mod api_response;
pub mod asset;
pub mod serde_utils;
pub mod transaction;
