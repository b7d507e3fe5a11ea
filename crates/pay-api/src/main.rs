//! # mpesa-relay
//!
//! Thin relay in front of Safaricom's STK push API.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export CONSUMER_KEY=...
//! export CONSUMER_SECRET=...
//! export PASSKEY=...
//! export CALLBACK_URL=https://relay.example.com/callback
//!
//! # Run the server
//! mpesa-relay
//! ```

use pay_api::{logging, routes, state::AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    logging::init(logging::LogFormat::from_env());

    // Print banner
    print_banner();

    // Initialize application state (fails fast on missing configuration)
    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.mpesa.is_production();

    info!("Environment: {}", state.mpesa.environment);
    info!("Till: {}", state.till());
    info!("Callback URL: {}", state.mpesa.callback_url);
    info!("Payment provider: {}", state.payments.provider_name());

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("📲 mpesa-relay starting on http://{}", addr);

    if !is_prod {
        info!("📝 Pay form: http://{}/pay", addr);
        info!("💳 Submit: POST http://{}/api/pay", addr);
        info!("🔔 Callback: POST http://{}/callback", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("mpesa-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_banner() {
    println!(
        r#"
  📲 mpesa-relay 📲
  ━━━━━━━━━━━━━━━━━━━━━━━
  STK push relay
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
