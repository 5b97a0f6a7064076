//! Settlement Server
//!
//! HTTP front for the settlement ledger: top-ups, investments, transaction
//! history and NFT relay calls.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dotenv::dotenv;

use settlement_ledger::api::{self, AppState};
use settlement_ledger::chain::{ChainClient, EthersChainClient, MockChainClient};
use settlement_ledger::clock::SystemClock;
use settlement_ledger::configure;
use settlement_ledger::db::LedgerDb;
use settlement_ledger::logger;
use settlement_ledger::settlement::{InvestmentRecorder, NftRelay};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Config file path without extension
    #[clap(long, default_value = "config/settlement")]
    config: String,
    /// Overrides chain.use_mock
    #[clap(long, action = clap::ArgAction::SetTrue)]
    mock_chain: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let config = configure::load_config_from(&args.config).context("Failed to load config")?;
    logger::setup_logger(&config.log).map_err(|e| anyhow!("Failed to set up logger: {}", e))?;

    log::info!("Settlement Server");
    log::info!(
        "storage={} rpc={} chain_id={}",
        config.storage.db_path,
        config.chain.rpc_url,
        config.chain.chain_id
    );

    let db = Arc::new(
        LedgerDb::open(&config.storage.db_path, config.storage.flush_on_write)
            .context("Failed to open ledger database")?,
    );

    let chain: Arc<dyn ChainClient> = if args.mock_chain || config.chain.use_mock {
        log::warn!("Using mock chain client, nothing is broadcast");
        Arc::new(MockChainClient::new())
    } else {
        Arc::new(EthersChainClient::new(&config.chain).context("Failed to build chain client")?)
    };

    let recorder = InvestmentRecorder::new(
        db,
        chain.clone(),
        Arc::new(SystemClock),
        config.settlement.clone(),
        config.chain.confirmation_timeout(),
    );
    let relay = NftRelay::new(chain, &config.chain.default_nft_address);

    let state = Arc::new(AppState {
        recorder: Arc::new(recorder),
        relay: Arc::new(relay),
    });
    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
