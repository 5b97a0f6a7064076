//! Embedded storage for accounts, transactions and assets.
//!
//! One sled tree per relation plus secondary indexes. Balance updates are
//! compare-and-swap loops on a single key; anything that touches more than
//! one tree runs inside a sled multi-tree transaction so uniqueness of
//! transaction hashes and token ids is checked and claimed atomically.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use sled::transaction::{
    abort, ConflictableTransactionResult, TransactionResult, TransactionalTree,
};
use sled::{CompareAndSwapError, Db, IVec, Transactional, Tree};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    transition, Account, Asset, AssetStatus, NewAsset, NewTransaction, Transaction,
    TransactionEvent,
};

const ACCOUNTS_TREE: &str = "accounts";
const TRANSACTIONS_TREE: &str = "transactions";
const ACCOUNT_TRANSACTIONS_TREE: &str = "account_transactions";
const TX_HASHES_TREE: &str = "tx_hashes";
const ASSETS_TREE: &str = "assets";
const ACCOUNT_ASSETS_TREE: &str = "account_assets";
const TOKEN_IDS_TREE: &str = "token_ids";

fn id_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

fn id_from_key(raw: &[u8]) -> LedgerResult<u64> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| LedgerError::StorageError(format!("corrupt id key ({} bytes)", raw.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

/// `address 0x00` - addresses never contain control characters, so the
/// separator keeps one account's prefix from matching another's.
fn index_prefix(address: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(address.len() + 17);
    key.extend_from_slice(address.as_bytes());
    key.push(0);
    key
}

/// `address 0x00 ts_ms id`, big-endian, so a reverse prefix scan yields
/// newest first with ties broken by insertion order.
fn index_key(address: &str, at: DateTime<Utc>, id: u64) -> Vec<u8> {
    let mut key = index_prefix(address);
    key.extend_from_slice(&(at.timestamp_millis().max(0) as u64).to_be_bytes());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn decode<T: DeserializeOwned>(raw: &IVec) -> LedgerResult<T> {
    Ok(serde_json::from_slice(raw)?)
}

pub struct LedgerDb {
    db: Db,
    accounts: Tree,
    transactions: Tree,
    account_transactions: Tree,
    tx_hashes: Tree,
    assets: Tree,
    account_assets: Tree,
    token_ids: Tree,
    flush_on_write: bool,
}

impl LedgerDb {
    pub fn open(path: &str, flush_on_write: bool) -> LedgerResult<Self> {
        let db = sled::open(path)?;
        log::info!("Opened ledger database at {}", path);
        Self::from_db(db, flush_on_write)
    }

    /// Throwaway database removed on drop
    pub fn temporary() -> LedgerResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, false)
    }

    fn from_db(db: Db, flush_on_write: bool) -> LedgerResult<Self> {
        Ok(Self {
            accounts: db.open_tree(ACCOUNTS_TREE)?,
            transactions: db.open_tree(TRANSACTIONS_TREE)?,
            account_transactions: db.open_tree(ACCOUNT_TRANSACTIONS_TREE)?,
            tx_hashes: db.open_tree(TX_HASHES_TREE)?,
            assets: db.open_tree(ASSETS_TREE)?,
            account_assets: db.open_tree(ACCOUNT_ASSETS_TREE)?,
            token_ids: db.open_tree(TOKEN_IDS_TREE)?,
            db,
            flush_on_write,
        })
    }

    fn flush(&self) -> LedgerResult<()> {
        if self.flush_on_write {
            self.db.flush()?;
        }
        Ok(())
    }

    // ===== Accounts =====

    pub fn get_account(&self, address: &str) -> LedgerResult<Option<Account>> {
        self.accounts
            .get(address.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    /// Insert-if-absent. Returns the stored account and whether it was created.
    pub fn get_or_create_account(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<(Account, bool)> {
        if let Some(account) = self.get_account(address)? {
            return Ok((account, false));
        }

        let fresh = Account::new(address, now);
        let bytes = serde_json::to_vec(&fresh)?;
        match self
            .accounts
            .compare_and_swap(address.as_bytes(), None::<&[u8]>, Some(bytes))?
        {
            Ok(()) => {
                self.flush()?;
                Ok((fresh, true))
            }
            // Lost the race to a concurrent creator: theirs wins.
            Err(CompareAndSwapError {
                current: Some(raw), ..
            }) => Ok((decode(&raw)?, false)),
            Err(CompareAndSwapError { current: None, .. }) => Err(LedgerError::StorageError(
                format!("account {} vanished during creation", address),
            )),
        }
    }

    /// Atomic read-modify-write of one balance.
    ///
    /// `apply` maps the current balance to the new one and may reject the
    /// update; it can run more than once when writers collide.
    pub fn update_balance<F>(
        &self,
        address: &str,
        now: DateTime<Utc>,
        apply: F,
    ) -> LedgerResult<Account>
    where
        F: Fn(Decimal) -> LedgerResult<Decimal>,
    {
        loop {
            let current = self
                .accounts
                .get(address.as_bytes())?
                .ok_or_else(|| LedgerError::AccountNotFound(address.to_string()))?;

            let mut account: Account = decode(&current)?;
            account.balance = apply(account.balance)?;
            account.updated_at = now;
            let bytes = serde_json::to_vec(&account)?;

            match self
                .accounts
                .compare_and_swap(address.as_bytes(), Some(&current), Some(bytes))?
            {
                Ok(()) => {
                    self.flush()?;
                    return Ok(account);
                }
                Err(_) => {
                    log::debug!("Balance CAS conflict on {}, retrying", address);
                }
            }
        }
    }

    // ===== Transactions =====

    fn write_transaction(
        txs: &TransactionalTree,
        idx: &TransactionalTree,
        hashes: &TransactionalTree,
        record: &Transaction,
        bytes: &[u8],
    ) -> ConflictableTransactionResult<(), LedgerError> {
        if !record.tx_hash.is_empty() && hashes.get(record.tx_hash.as_bytes())?.is_some() {
            return abort(LedgerError::DuplicateTxHash(record.tx_hash.clone()));
        }
        txs.insert(id_key(record.id), bytes)?;
        idx.insert(index_key(&record.address, record.created_at, record.id), id_key(record.id))?;
        if !record.tx_hash.is_empty() {
            hashes.insert(record.tx_hash.as_bytes(), id_key(record.id))?;
        }
        Ok(())
    }

    pub fn insert_transaction(
        &self,
        draft: NewTransaction,
        now: DateTime<Utc>,
    ) -> LedgerResult<Transaction> {
        let id = self.db.generate_id()?;
        let record = draft.into_transaction(id, now);
        let bytes = serde_json::to_vec(&record)?;

        let result: TransactionResult<(), LedgerError> =
            (&self.transactions, &self.account_transactions, &self.tx_hashes).transaction(
                |(txs, idx, hashes)| Self::write_transaction(txs, idx, hashes, &record, &bytes),
            );
        result?;

        self.flush()?;
        Ok(record)
    }

    pub fn get_transaction(&self, id: u64) -> LedgerResult<Option<Transaction>> {
        self.transactions
            .get(id_key(id))?
            .map(|raw| decode(&raw))
            .transpose()
    }

    pub fn find_transaction_by_hash(&self, tx_hash: &str) -> LedgerResult<Option<Transaction>> {
        match self.tx_hashes.get(tx_hash.as_bytes())? {
            Some(raw) => self.get_transaction(id_from_key(&raw)?),
            None => Ok(None),
        }
    }

    /// Conditional status update: the FSM check and the hash claim happen
    /// in the same storage transaction as the write.
    pub fn transition_transaction(
        &self,
        id: u64,
        event: TransactionEvent,
        tx_hash: Option<&str>,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Transaction> {
        let tx_hash = tx_hash.filter(|h| !h.is_empty());

        let result: TransactionResult<Transaction, LedgerError> = (&self.transactions, &self.tx_hashes)
            .transaction(|(txs, hashes)| {
                let raw = match txs.get(id_key(id))? {
                    Some(raw) => raw,
                    None => return abort(LedgerError::TransactionNotFound(id)),
                };
                let mut record: Transaction = match serde_json::from_slice(&raw) {
                    Ok(record) => record,
                    Err(e) => return abort(LedgerError::from(e)),
                };
                let next = match transition(record.status, event) {
                    Ok(next) => next,
                    Err(e) => return abort(e),
                };

                if let Some(hash) = tx_hash {
                    if let Some(owner) = hashes.get(hash.as_bytes())? {
                        if owner.as_ref() != id_key(id).as_slice() {
                            return abort(LedgerError::DuplicateTxHash(hash.to_string()));
                        }
                    }
                    if !record.tx_hash.is_empty() && record.tx_hash != hash {
                        hashes.remove(record.tx_hash.as_bytes())?;
                    }
                    hashes.insert(hash.as_bytes(), id_key(id))?;
                    record.tx_hash = hash.to_string();
                }

                record.status = next;
                record.failure_reason = reason.map(str::to_string);
                record.updated_at = now;

                let bytes = match serde_json::to_vec(&record) {
                    Ok(bytes) => bytes,
                    Err(e) => return abort(LedgerError::from(e)),
                };
                txs.insert(id_key(id), bytes)?;
                Ok(record)
            });
        let record = result?;

        self.flush()?;
        Ok(record)
    }

    /// Newest first; `offset`/`limit` page over the account's index.
    pub fn list_transactions(
        &self,
        address: &str,
        offset: usize,
        limit: usize,
    ) -> LedgerResult<Vec<Transaction>> {
        let mut out = Vec::new();
        for item in self
            .account_transactions
            .scan_prefix(index_prefix(address))
            .rev()
            .skip(offset)
            .take(limit)
        {
            let (_, id_raw) = item?;
            let id = id_from_key(&id_raw)?;
            match self.get_transaction(id)? {
                Some(tx) => out.push(tx),
                None => log::warn!("Dangling transaction index entry {} for {}", id, address),
            }
        }
        Ok(out)
    }

    // ===== Assets =====

    fn write_asset(
        assets: &TransactionalTree,
        idx: &TransactionalTree,
        tokens: &TransactionalTree,
        asset: &Asset,
        bytes: &[u8],
    ) -> ConflictableTransactionResult<(), LedgerError> {
        if tokens.get(asset.token_id.as_bytes())?.is_some() {
            return abort(LedgerError::DuplicateTokenId(asset.token_id.clone()));
        }
        tokens.insert(asset.token_id.as_bytes(), id_key(asset.id))?;
        assets.insert(id_key(asset.id), bytes)?;
        idx.insert(
            index_key(&asset.wallet_address, asset.purchase_date, asset.id),
            id_key(asset.id),
        )?;
        Ok(())
    }

    pub fn insert_asset(&self, draft: NewAsset, now: DateTime<Utc>) -> LedgerResult<Asset> {
        let id = self.db.generate_id()?;
        let asset = draft.into_asset(id, now);
        let bytes = serde_json::to_vec(&asset)?;

        let result: TransactionResult<(), LedgerError> =
            (&self.assets, &self.account_assets, &self.token_ids).transaction(
                |(assets, idx, tokens)| Self::write_asset(assets, idx, tokens, &asset, &bytes),
            );
        result?;

        self.flush()?;
        Ok(asset)
    }

    /// Asset, token claim, funding transaction and all indexes in one unit:
    /// either everything is written or nothing is.
    pub fn insert_asset_with_transaction(
        &self,
        asset_draft: NewAsset,
        tx_draft: NewTransaction,
        now: DateTime<Utc>,
    ) -> LedgerResult<(Asset, Transaction)> {
        let asset = asset_draft.into_asset(self.db.generate_id()?, now);
        let record = tx_draft.into_transaction(self.db.generate_id()?, now);
        let asset_bytes = serde_json::to_vec(&asset)?;
        let tx_bytes = serde_json::to_vec(&record)?;

        let result: TransactionResult<(), LedgerError> = (
            &self.assets,
            &self.account_assets,
            &self.token_ids,
            &self.transactions,
            &self.account_transactions,
            &self.tx_hashes,
        )
            .transaction(|(assets, asset_idx, tokens, txs, tx_idx, hashes)| {
                Self::write_asset(assets, asset_idx, tokens, &asset, &asset_bytes)?;
                Self::write_transaction(txs, tx_idx, hashes, &record, &tx_bytes)?;
                Ok(())
            });
        result?;

        self.flush()?;
        Ok((asset, record))
    }

    pub fn get_asset(&self, id: u64) -> LedgerResult<Option<Asset>> {
        self.assets.get(id_key(id))?.map(|raw| decode(&raw)).transpose()
    }

    pub fn token_id_exists(&self, token_id: &str) -> LedgerResult<bool> {
        Ok(self.token_ids.contains_key(token_id.as_bytes())?)
    }

    /// Assets of one wallet, newest purchase first.
    pub fn list_assets(
        &self,
        address: &str,
        status: Option<AssetStatus>,
    ) -> LedgerResult<Vec<Asset>> {
        let mut out = Vec::new();
        for item in self.account_assets.scan_prefix(index_prefix(address)).rev() {
            let (_, id_raw) = item?;
            if let Some(asset) = self.get_asset(id_from_key(&id_raw)?)? {
                if status.map_or(true, |s| asset.status == s) {
                    out.push(asset);
                }
            }
        }
        Ok(out)
    }
}
