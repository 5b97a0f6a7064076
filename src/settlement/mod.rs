pub mod recorder;
pub mod relay;
pub mod types;

pub use recorder::{generate_token_id, InvestmentRecorder};
pub use relay::NftRelay;
pub use types::*;
