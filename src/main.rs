use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;

use crate::api::server::{AppState, ServerError};
use crate::db::PgError;
use crate::util::telemetry;

mod api;
mod auth;
mod db;
mod domain;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Db(#[from] PgError),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_registry = telemetry::Telemetry::new().await?.register();

    tracing::info!("starting main application");

    let state = Arc::new(AppState::new().await?);
    db::migrate(state.db_pool).await?;

    let handles = api::server::start_server(state).await?;
    _ = join_all(handles).await;

    telemetry_registry.shutdown();
    Ok(())
}
