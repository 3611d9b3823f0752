mod commands;

use crate::commands::{Args, CommandError};
use clap::Parser;
use quillboard_client::{
    client::{ApiClient, ClientError, DEFAULT_API_URL},
    coordinator::{Coordinator, DEFAULT_MUTATION_TIMEOUT},
};
use quillboard_common::model::auth::AuthToken;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error setting up the API client: {0}")]
    Client(#[from] ClientError),
    #[error("{0}")]
    Command(#[from] CommandError),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    #[serde(default = "default_api_url")]
    api_url: String,
    token: Option<String>,
    #[serde(default = "default_mutation_timeout_secs")]
    mutation_timeout_secs: u64,
    request_timeout_secs: Option<u64>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_owned()
}

fn default_mutation_timeout_secs() -> u64 {
    DEFAULT_MUTATION_TIMEOUT.as_secs()
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quillboard_cli=debug,\
                quillboard_client=debug,\
                quillboard_common=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::prefixed("QUILLBOARD_")
        .from_env()
        .map_err(InitError::from)
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let args = Args::parse();
    let env = get_env()?;
    debug!(api_url = %env.api_url, "Using backend");

    let client = ApiClient::new(
        &env.api_url,
        env.request_timeout_secs.map(Duration::from_secs),
    )?;
    let coordinator = Coordinator::new(client, Duration::from_secs(env.mutation_timeout_secs));

    commands::run(&coordinator, env.token.map(AuthToken::new), args.command).await?;

    Ok(())
}
