use tracing::info;
use tracing_subscriber::EnvFilter;

use dbd_wiki_api::state::AppState;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?
        .block_on(run())
}

async fn run() -> color_eyre::Result<()> {
    setup_tracing();

    let state = AppState::from_env()?;
    info!("application state initialized");

    dbd_wiki_api::serve(state).await
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
