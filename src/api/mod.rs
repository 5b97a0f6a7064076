pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};

use crate::settlement::{InvestmentRecorder, NftRelay};

/// Shared handler state
pub struct AppState {
    pub recorder: Arc<InvestmentRecorder>,
    pub relay: Arc<NftRelay>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/topup", post(handlers::handle_topup))
        .route("/balance/:address", get(handlers::get_balance))
        .route("/invest", post(handlers::handle_invest))
        .route("/transactions/:address", get(handlers::list_transactions))
        .route("/transaction/:id/confirm", post(handlers::confirm_transaction))
        .route("/assets/:address", get(handlers::list_assets))
        .route("/transfer", post(handlers::handle_transfer))
        .route("/withdraw", post(handlers::handle_withdraw))
        .route("/deposit", post(handlers::handle_deposit))
        .route("/relay/nft/mint", post(handlers::relay_mint))
        .route("/relay/nft/transfer", post(handlers::relay_transfer))
        .route("/nft/default-address", get(handlers::nft_default_address))
        .route("/chain/balance/:address", get(handlers::chain_balance))
        .layer(Extension(state))
}
