pub mod ethers_client;
pub mod mock;
pub mod traits;

pub use ethers_client::{parse_address, EthersChainClient};
pub use mock::{MockChainClient, ReceiptMode, SubmittedTx};
pub use traits::{ChainClient, Receipt};
