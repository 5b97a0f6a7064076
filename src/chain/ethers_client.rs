use std::time::Duration;

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};

use crate::configure::ChainConfig;
use crate::error::{LedgerError, LedgerResult};

use super::traits::{ChainClient, Receipt};

pub fn parse_address(address: &str) -> LedgerResult<Address> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|_| LedgerError::InvalidAddress(address.to_string()))
}

pub(crate) fn parse_tx_hash(tx_hash: &str) -> LedgerResult<H256> {
    tx_hash
        .trim()
        .parse::<H256>()
        .map_err(|_| LedgerError::InvalidInput(format!("malformed transaction hash {}", tx_hash)))
}

/// JSON-RPC backed client. Reads go through the plain provider; submissions
/// need the signing middleware, which only exists when a key is configured.
pub struct EthersChainClient {
    provider: Provider<Http>,
    signer: Option<SignerMiddleware<Provider<Http>, LocalWallet>>,
    poll_interval: Duration,
}

impl EthersChainClient {
    pub fn new(config: &ChainConfig) -> LedgerResult<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| LedgerError::NetworkError(format!("bad rpc url {}: {}", config.rpc_url, e)))?
            .interval(config.poll_interval());

        let signer = match config.signing_key() {
            Some(key) => {
                let wallet = key
                    .parse::<LocalWallet>()
                    .map_err(|e| LedgerError::InvalidInput(format!("invalid signing key: {}", e)))?
                    .with_chain_id(config.chain_id);
                log::info!("Chain signer {:?} on chain {}", wallet.address(), config.chain_id);
                Some(SignerMiddleware::new(provider.clone(), wallet))
            }
            None => {
                log::warn!("No signing key configured, chain submissions are disabled");
                None
            }
        };

        Ok(Self {
            provider,
            signer,
            poll_interval: config.poll_interval(),
        })
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    async fn get_balance(&self, address: &str) -> LedgerResult<U256> {
        let address = parse_address(address)?;
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| LedgerError::NetworkError(e.to_string()))
    }

    async fn submit(&self, to: &str, amount: U256, payload: Vec<u8>) -> LedgerResult<String> {
        let signer = self.signer.as_ref().ok_or(LedgerError::KeyNotConfigured)?;
        let to = parse_address(to)?;

        let request = TransactionRequest::new()
            .to(to)
            .value(amount)
            .data(Bytes::from(payload));
        let pending = signer
            .send_transaction(request, None)
            .await
            .map_err(|e| LedgerError::NetworkError(e.to_string()))?;

        let hash: H256 = *pending;
        let hash = format!("{:#x}", hash);
        log::info!("[{}] Submitted {} to {:?}", self.name(), hash, to);
        Ok(hash)
    }

    async fn receipt(&self, tx_hash: &str) -> LedgerResult<Option<Receipt>> {
        let hash = parse_tx_hash(tx_hash)?;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| LedgerError::NetworkError(e.to_string()))?;

        Ok(receipt
            .filter(|r| r.block_number.is_some())
            .map(|r| Receipt {
                tx_hash: format!("{:#x}", r.transaction_hash),
                block_number: r.block_number.map(|b| b.as_u64()),
                success: r.status.map_or(true, |s| s.as_u64() == 1),
            }))
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn name(&self) -> &str {
        "ethers"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(private_key: &str) -> ChainConfig {
        ChainConfig {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 71,
            private_key: private_key.to_string(),
            confirmation_timeout_secs: 60,
            poll_interval_ms: 500,
            use_mock: false,
            default_nft_address: String::new(),
        }
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("0x000000000000000000000000000000000000dEaD").is_ok());
        assert_eq!(
            parse_address("not-an-address").unwrap_err(),
            LedgerError::InvalidAddress("not-an-address".to_string())
        );
    }

    #[test]
    fn test_parse_tx_hash() {
        let hash = format!("0x{:064x}", 7);
        assert!(parse_tx_hash(&hash).is_ok());
        assert!(matches!(parse_tx_hash("0x12"), Err(LedgerError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_submit_without_key() {
        let client = EthersChainClient::new(&config("")).unwrap();
        let err = client
            .submit("0x000000000000000000000000000000000000dEaD", U256::zero(), vec![])
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::KeyNotConfigured);
    }

    #[tokio::test]
    async fn test_get_balance_rejects_malformed_address_before_rpc() {
        let client = EthersChainClient::new(&config("")).unwrap();
        let err = client.get_balance("cfx:nope").await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAddress(_)));
    }

    #[test]
    fn test_invalid_signing_key() {
        assert!(matches!(
            EthersChainClient::new(&config("zz")),
            Err(LedgerError::InvalidInput(_))
        ));
    }
}
