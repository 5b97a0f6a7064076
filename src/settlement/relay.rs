//! NFT relay
//!
//! Encodes certificate mint and transfer calls for the product NFT contract
//! and broadcasts them through the injected chain client.

use std::sync::Arc;

use ethers::abi::{self, Token};
use ethers::types::{Address, H256, U256};
use ethers::utils::id;

use crate::chain::ChainClient;
use crate::error::{LedgerError, LedgerResult};

use super::types::{NftMintRequest, NftTransferRequest};

const MINT_SIGNATURE: &str = "mintWithInfo(address,uint256,string,string,uint64,string,bytes32)";
const TRANSFER_SIGNATURE: &str = "safeTransferFrom(address,address,uint256)";

fn address_arg(field: &str, value: &str) -> LedgerResult<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|_| LedgerError::InvalidAddress(format!("{}: {}", field, value)))
}

fn token_id_arg(value: &str) -> LedgerResult<U256> {
    U256::from_dec_str(value.trim())
        .map_err(|_| LedgerError::InvalidInput(format!("tokenId must be a decimal integer: {}", value)))
}

fn content_hash_arg(value: Option<&str>) -> LedgerResult<H256> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(H256::zero()),
        Some(raw) => raw
            .parse::<H256>()
            .map_err(|_| LedgerError::InvalidInput(format!("contentHash must be 32 bytes hex: {}", raw))),
    }
}

fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = id(signature).to_vec();
    data.extend(abi::encode(args));
    data
}

pub fn encode_mint(req: &NftMintRequest) -> LedgerResult<Vec<u8>> {
    let args = [
        Token::Address(address_arg("to", &req.to)?),
        Token::Uint(token_id_arg(&req.token_id)?),
        Token::String(req.uri.clone().unwrap_or_default()),
        Token::String(req.origin.clone()),
        Token::Uint(U256::from(req.harvest_time)),
        Token::String(req.inspection_id.clone()),
        Token::FixedBytes(content_hash_arg(req.content_hash.as_deref())?.as_bytes().to_vec()),
    ];
    Ok(encode_call(MINT_SIGNATURE, &args))
}

pub fn encode_transfer(req: &NftTransferRequest) -> LedgerResult<Vec<u8>> {
    let args = [
        Token::Address(address_arg("from", &req.from)?),
        Token::Address(address_arg("to", &req.to)?),
        Token::Uint(token_id_arg(&req.token_id)?),
    ];
    Ok(encode_call(TRANSFER_SIGNATURE, &args))
}

pub struct NftRelay {
    chain: Arc<dyn ChainClient>,
    default_nft_address: Option<String>,
}

impl NftRelay {
    pub fn new(chain: Arc<dyn ChainClient>, default_nft_address: &str) -> Self {
        let trimmed = default_nft_address.trim();
        Self {
            chain,
            default_nft_address: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }

    pub fn default_address(&self) -> Option<&str> {
        self.default_nft_address.as_deref()
    }

    fn contract(&self, requested: Option<&str>) -> LedgerResult<String> {
        requested
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_nft_address.clone())
            .ok_or_else(|| LedgerError::InvalidInput("nftAddress is required".to_string()))
    }

    pub async fn mint(&self, req: &NftMintRequest) -> LedgerResult<String> {
        let contract = self.contract(req.nft_address.as_deref())?;
        let payload = encode_mint(req)?;
        let tx_hash = self.chain.submit(&contract, U256::zero(), payload).await?;
        log::info!(
            "[Relay] mint token {} to {} via {} -> {}",
            req.token_id,
            req.to,
            contract,
            tx_hash
        );
        Ok(tx_hash)
    }

    pub async fn transfer(&self, req: &NftTransferRequest) -> LedgerResult<String> {
        let contract = self.contract(req.nft_address.as_deref())?;
        let payload = encode_transfer(req)?;
        let tx_hash = self.chain.submit(&contract, U256::zero(), payload).await?;
        log::info!(
            "[Relay] transfer token {} {} -> {} via {} -> {}",
            req.token_id,
            req.from,
            req.to,
            contract,
            tx_hash
        );
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;

    const NFT: &str = "0x00000000000000000000000000000000000000aa";
    const ALICE: &str = "0x0000000000000000000000000000000000000001";
    const BOB: &str = "0x0000000000000000000000000000000000000002";

    fn mint_request() -> NftMintRequest {
        NftMintRequest {
            to: ALICE.to_string(),
            token_id: "42".to_string(),
            nft_address: None,
            uri: None,
            origin: "Yunnan".to_string(),
            harvest_time: 1_700_000_000,
            inspection_id: "QC-1".to_string(),
            content_hash: None,
        }
    }

    #[test]
    fn test_transfer_encoding_layout() {
        let data = encode_transfer(&NftTransferRequest {
            from: ALICE.to_string(),
            to: BOB.to_string(),
            token_id: "42".to_string(),
            nft_address: None,
        })
        .unwrap();

        // selector + three static words
        assert_eq!(data.len(), 4 + 3 * 32);
        assert_eq!(&data[..4], &id(TRANSFER_SIGNATURE)[..]);
        assert_eq!(data[4 + 31], 1);
        assert_eq!(data[4 + 63], 2);
        assert_eq!(data[4 + 95], 42);
    }

    #[test]
    fn test_mint_encoding_selector() {
        let data = encode_mint(&mint_request()).unwrap();
        assert_eq!(&data[..4], &id(MINT_SIGNATURE)[..]);
        assert_eq!((data.len() - 4) % 32, 0);
    }

    #[test]
    fn test_bad_arguments() {
        let mut req = mint_request();
        req.token_id = "abc".to_string();
        assert!(matches!(encode_mint(&req), Err(LedgerError::InvalidInput(_))));

        let mut req = mint_request();
        req.to = "cfx:xyz".to_string();
        assert!(matches!(encode_mint(&req), Err(LedgerError::InvalidAddress(_))));

        let mut req = mint_request();
        req.content_hash = Some("0x1234".to_string());
        assert!(matches!(encode_mint(&req), Err(LedgerError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_mint_uses_default_contract() {
        let chain = Arc::new(MockChainClient::new());
        let relay = NftRelay::new(chain.clone(), NFT);
        let hash = relay.mint(&mint_request()).await.unwrap();

        let sent = chain.submitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tx_hash, hash);
        assert_eq!(sent[0].to, NFT);
    }

    #[tokio::test]
    async fn test_contract_required() {
        let relay = NftRelay::new(Arc::new(MockChainClient::new()), "");
        assert!(relay.default_address().is_none());
        assert!(matches!(
            relay.mint(&mint_request()).await,
            Err(LedgerError::InvalidInput(_))
        ));
    }
}
