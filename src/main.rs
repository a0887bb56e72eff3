mod api;
mod config;
mod entry_store;
mod obihai_client;
mod services;

use crate::{
    api::{Api, register_routes},
    config::AppConfig,
    entry_store::EntryStore,
    obihai_client::ObihaiHttpClient,
};
use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{debug, error, info};
use std::io::Write;
use tokio::signal::unix::{SignalKind, signal};

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::get();

    let store = web::Data::new(
        EntryStore::load(&config.paths.entries_file).context("failed to load entry store")?,
    );
    let api = web::Data::new(Api::new(ObihaiHttpClient::new()));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(api.clone())
            .app_data(store.clone())
            .configure(register_routes::<ObihaiHttpClient>)
    })
    .bind(("0.0.0.0", config.ui.port))
    .context("failed to bind ui port")?
    .disable_signals()
    .run();

    info!("listening on port {}", config.ui.port);

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c");
            server_handle.stop(true).await;
        },
        _ = sigterm.recv() => {
            debug!("sigterm");
            server_handle.stop(true).await;
        },
        result = server_task => {
            debug!("server stopped");
            result.context("server task failed")??;
        }
    }

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}
