use std::sync::Arc;

use crate::clock::Clock;
use crate::db::LedgerDb;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    validate_address, validate_amount, Asset, AssetStatus, NewAsset, NewTransaction, Transaction,
};

/// Investment holdings, one per issued token id.
pub struct AssetBook {
    db: Arc<LedgerDb>,
    clock: Arc<dyn Clock>,
}

impl AssetBook {
    pub fn new(db: Arc<LedgerDb>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn check(draft: &mut NewAsset) -> LedgerResult<()> {
        validate_address(&draft.wallet_address)?;
        draft.investment_amount = validate_amount(draft.investment_amount)?;
        if draft.token_id.trim().is_empty() {
            return Err(LedgerError::InvalidInput("token_id must not be empty".to_string()));
        }
        Ok(())
    }

    /// Record an active holding. Fails with `DuplicateTokenId` without writing
    /// anything if the token id is already taken.
    pub fn issue(&self, mut draft: NewAsset) -> LedgerResult<Asset> {
        Self::check(&mut draft)?;
        let asset = self.db.insert_asset(draft, self.clock.now())?;
        log::info!(
            "[Assets] Issued {} (product {}) to {}",
            asset.token_id,
            asset.product_id,
            asset.wallet_address
        );
        Ok(asset)
    }

    /// Holding and its funding log entry as one all-or-nothing write.
    pub fn issue_with_transaction(
        &self,
        mut draft: NewAsset,
        funding: NewTransaction,
    ) -> LedgerResult<(Asset, Transaction)> {
        Self::check(&mut draft)?;
        let (asset, tx) = self
            .db
            .insert_asset_with_transaction(draft, funding, self.clock.now())?;
        log::info!(
            "[Assets] Issued {} with transaction #{} to {}",
            asset.token_id,
            tx.id,
            asset.wallet_address
        );
        Ok((asset, tx))
    }

    pub fn get(&self, asset_id: u64) -> LedgerResult<Asset> {
        self.db
            .get_asset(asset_id)?
            .ok_or(LedgerError::AssetNotFound(asset_id))
    }

    pub fn token_id_exists(&self, token_id: &str) -> LedgerResult<bool> {
        self.db.token_id_exists(token_id)
    }

    /// Active holdings, newest purchase first.
    pub fn list_active(&self, address: &str) -> LedgerResult<Vec<Asset>> {
        validate_address(address)?;
        self.db.list_assets(address, Some(AssetStatus::Active))
    }
}
