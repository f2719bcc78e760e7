use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use anyhow::Context;
use clap::Parser;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod error;
mod extract;
mod handlers;
mod middleware;
mod models;
mod utils;

use crate::config::Config;
use crate::db::{AppState, Database};
use crate::handlers::{
    aware, domains, instrument_groups, instrument_notes, instrument_status, instruments, measurements,
    plot_configurations, profiles, projects, timeseries,
};

#[derive(Parser, Debug)]
#[clap(about = "Instrumentation API - projects, instruments and timeseries measurements over REST")]
struct Args {
    #[clap(short, long, default_value = "false")]
    debug: bool,

    /// Overrides `listen_port` from the config file
    #[clap(short, long)]
    port: Option<u16>,

    /// Overrides `database_path` from the config file
    #[clap(long)]
    database: Option<PathBuf>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(domains::health))
        .route("/domains", get(domains::list_domains))
        .route("/profiles", post(profiles::create_profile))
        .route("/my_profile", get(profiles::get_my_profile))
        .route("/my_projects", get(projects::list_my_projects))
        .route("/projects", get(projects::list_projects).post(projects::create_projects))
        .route("/projects/count", get(projects::get_project_count))
        .route(
            "/projects/:project_id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_flag_project),
        )
        .route("/projects/:project_id/instruments", get(projects::list_project_instruments))
        .route(
            "/projects/:project_id/instrument_groups",
            get(projects::list_project_instrument_groups),
        )
        .route("/projects/:project_id/timeseries", get(projects::list_project_timeseries))
        .route(
            "/projects/:project_id/timeseries/:timeseries_id",
            post(projects::create_project_timeseries).delete(projects::delete_project_timeseries),
        )
        .route(
            "/projects/:project_id/plot_configurations",
            get(plot_configurations::list_plot_configurations)
                .post(plot_configurations::create_plot_configuration),
        )
        .route(
            "/projects/:project_id/plot_configurations/:plot_configuration_id",
            get(plot_configurations::get_plot_configuration)
                .put(plot_configurations::update_plot_configuration)
                .delete(plot_configurations::delete_plot_configuration),
        )
        .route(
            "/instruments",
            get(instruments::list_instruments).post(instruments::create_instruments),
        )
        .route("/instruments/count", get(instruments::get_instrument_count))
        .route(
            "/instruments/notes",
            get(instrument_notes::list_instrument_notes).post(instrument_notes::create_instrument_notes),
        )
        .route(
            "/instruments/notes/:note_id",
            get(instrument_notes::get_instrument_note)
                .put(instrument_notes::update_instrument_note)
                .delete(instrument_notes::delete_instrument_note),
        )
        .route(
            "/instruments/:instrument_id",
            get(instruments::get_instrument)
                .put(instruments::update_instrument)
                .delete(instruments::delete_flag_instrument),
        )
        .route(
            "/instruments/:instrument_id/notes",
            get(instrument_notes::list_instrument_instrument_notes),
        )
        .route(
            "/instruments/:instrument_id/status",
            get(instrument_status::list_instrument_status)
                .post(instrument_status::create_or_update_instrument_status),
        )
        .route(
            "/instruments/:instrument_id/status/:status_id",
            get(instrument_status::get_instrument_status).delete(instrument_status::delete_instrument_status),
        )
        .route(
            "/instruments/:instrument_id/timeseries",
            get(timeseries::list_instrument_timeseries),
        )
        .route(
            "/instruments/:instrument_id/timeseries/computed",
            get(instruments::list_computed_timeseries),
        )
        .route(
            "/instrument_groups",
            get(instrument_groups::list_instrument_groups).post(instrument_groups::create_instrument_groups),
        )
        .route(
            "/instrument_groups/:group_id",
            get(instrument_groups::get_instrument_group)
                .put(instrument_groups::update_instrument_group)
                .delete(instrument_groups::delete_flag_instrument_group),
        )
        .route(
            "/instrument_groups/:group_id/instruments",
            get(instrument_groups::list_instrument_group_instruments),
        )
        .route(
            "/instrument_groups/:group_id/instruments/:instrument_id",
            post(instrument_groups::create_instrument_group_instrument)
                .delete(instrument_groups::delete_instrument_group_instrument),
        )
        .route("/timeseries", get(timeseries::list_timeseries).post(timeseries::create_timeseries))
        .route(
            "/timeseries/:timeseries_id",
            get(timeseries::get_timeseries)
                .put(timeseries::update_timeseries)
                .delete(timeseries::delete_timeseries),
        )
        .route(
            "/timeseries/:timeseries_id/measurements",
            get(measurements::list_timeseries_measurements),
        )
        .route(
            "/timeseries_measurements",
            post(measurements::create_or_update_timeseries_measurements),
        )
        .route("/aware/parameters", get(aware::list_aware_parameters))
        .route(
            "/aware/data_acquisition_config",
            get(aware::list_aware_platform_parameter_config),
        )
        .route("/aware_platforms", post(aware::create_aware_platform))
        .layer(from_fn_with_state(state.clone(), middleware::attach_profile))
        .layer(from_fn(middleware::logging))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let mut config = Config::load();
    if let Some(port) = args.port {
        config.listen_port = port;
    }
    if let Some(path) = args.database {
        config.database_path = path;
    }

    let db = Database::open(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path.display()))?;
    if config.auth_disabled {
        let mock_id = config.mock_profile_id;
        let mock = db
            .call(move |conn| models::profiles::ensure_mock_profile(conn, &mock_id))
            .await?;
        info!("authentication disabled; requests act as {} ({})", mock.username, mock.id);
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.listen_port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.listen_addr, config.listen_port))?;
    let app = app(AppState::new(db, config));

    info!("instrumentation api listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
