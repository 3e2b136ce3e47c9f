use std::net::TcpListener;

use campus_api::configuration::get_configuration;
use campus_api::email_client::EmailClient;
use campus_api::startup::run;
use campus_api::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let connection_string = configuration.database.connection_string();
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    tracing::info!("Database connection pool created successfully");

    let email_client = EmailClient::new(&configuration.email, reqwest::Client::new())
        .map_err(|e| {
            tracing::error!("Invalid email configuration: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Email configuration error")
        })?;

    let address = format!("127.0.0.1:{}", configuration.application.port);
    tracing::info!("Binding server to address: {}", address);

    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let jwt_config = configuration.jwt.clone();

    let server = run(listener, pool, jwt_config, email_client)?;
    tracing::info!("Server started successfully");

    let _ = server.await;

    Ok(())
}
