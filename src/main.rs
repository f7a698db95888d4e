//! Clinic Registry Gateway - Main entry point.
//!
//! Runs one gateway operation against the registry database and prints its
//! outcome as JSON on stdout. Logs go to stderr.

use clap::Parser;
use clinic_registry_gateway::config::{Command, Config};
use clinic_registry_gateway::db::{ConnectionPool, MySqlConnectionPool};
use clinic_registry_gateway::gateway::Registry;
use clinic_registry_gateway::models::{CallListSubject, TreatmentRecord};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Run the selected operation and render its outcome.
async fn run(registry: &Registry, command: Command) -> serde_json::Result<Value> {
    match command {
        Command::CallList {
            clinic_id,
            subject,
            reference_chars,
        } => {
            let subject: CallListSubject = subject.parse().unwrap_or_else(|e| match e {});
            serde_json::to_value(
                registry
                    .call_list
                    .fetch_call_list(clinic_id, &subject, &reference_chars)
                    .await,
            )
        }
        Command::EmailMessages { clinic_id, subject } => {
            let subject: CallListSubject = subject.parse().unwrap_or_else(|e| match e {});
            serde_json::to_value(
                registry
                    .call_list
                    .fetch_email_messages(clinic_id, &subject)
                    .await,
            )
        }
        Command::ChangePassword { user, hash, salt } => serde_json::to_value(
            registry
                .password
                .change_password(&user, &hash, &salt)
                .await,
        ),
        Command::RequestPasswordReset { user, email } => serde_json::to_value(
            registry
                .password
                .request_password_reset(&user, &email)
                .await,
        ),
        Command::RecordTreatment {
            patient_id,
            rx_class,
            medications,
            date,
            user,
            clinic_id,
        } => {
            let record = TreatmentRecord {
                patient_id,
                prescription_class: rx_class,
                medications,
                date,
                user_name: user,
                clinic_id,
            };
            serde_json::to_value(registry.treatment.record_treatment(&record).await)
        }
        Command::Treatments { patient_id } => {
            serde_json::to_value(registry.treatment.fetch_treatments(patient_id).await)
        }
        Command::Salt { user } => serde_json::to_value(registry.sign_in.retrieve_salt(&user).await),
        Command::ValidateUser { user, password } => {
            serde_json::to_value(registry.sign_in.validate_user(&user, &password).await)
        }
        Command::Authenticate { user, password } => {
            serde_json::to_value(registry.sign_in.authenticate_user(&user, &password).await)
        }
        Command::User { user } => serde_json::to_value(registry.sign_in.get_user(&user).await),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        "Starting Clinic Registry Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db_config = config.parse_database()?;
    let pool = Arc::new(MySqlConnectionPool::connect(&db_config).await?);
    let registry = Registry::new(Arc::clone(&pool) as Arc<dyn ConnectionPool>);

    let rendered = tokio::select! {
        rendered = run(&registry, config.command.clone()) => Some(rendered?),
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted before the operation completed");
            None
        }
    };

    let stats = pool.stats();
    info!(
        acquired = stats.acquired,
        released = stats.released,
        "Connection usage"
    );
    pool.close().await;

    if let Some(value) = rendered {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    info!("Shutdown complete");
    Ok(())
}
