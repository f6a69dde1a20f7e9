pub mod accounts;
pub mod auth;
pub mod errors;
pub mod models;
pub mod password;
pub mod routes;
pub mod state;
pub mod store;

use tokio::net::TcpListener;
use tracing::info;

use state::AppState;

/// Bind and serve the API until the task is aborted.
pub async fn serve(state: AppState) -> color_eyre::Result<()> {
    let addr = std::env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let app = routes::routes(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
