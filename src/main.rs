use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use campuspass_server::config::Config;
use campuspass_server::routes::create_routes;
use campuspass_server::services::{HmacSigner, PaymentService};
use campuspass_server::state::AppState;
use campuspass_server::store::{PgEventDirectory, PgTicketStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration, refusing to start");
            std::process::exit(1);
        }
    };

    // Secrets are validated here, once; issuance never has to wonder
    // whether a key exists.
    let qr_signer = HmacSigner::new(config.qr_signing_secret.clone())
        .expect("QR_SIGNING_SECRET validated by Config::from_env");
    let gateway_signer = HmacSigner::new(config.gateway_webhook_secret.clone())
        .expect("GATEWAY_WEBHOOK_SECRET validated by Config::from_env");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let payments = PaymentService::new(
        Arc::new(PgTicketStore::new(pool.clone())),
        Arc::new(PgEventDirectory::new(pool)),
        qr_signer,
        gateway_signer,
        config.checkout_base_url.clone(),
    );

    let app: Router = create_routes(AppState::new(payments));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
