use crate::config::Config;
use crate::data::postgres::PgRecordStore;
use crate::data::store::{MemoryStore, RecordStore};
use crate::fanout::EventHub;
use crate::geocode::AddressResolver;
use crate::ingest::poller::{Poller, RecentCache, RunOutcome};
use crate::ingest::recency::RecencyFilter;
use crate::ingest::scheduler::{INGEST_SERVICE, Scheduler};
use crate::source::client::Safe182Client;
use crate::source::extract::RecordExtractor;
use crate::source::pagination::Paginator;
use crate::source::patterns::FieldPatterns;
use crate::state::{AppState, ServiceStatus};
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

/// Status registry key for the HTTP server.
pub const WEB_SERVICE: &str = "web";

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    poller: Arc<Mutex<Poller>>,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let store: Arc<dyn RecordStore> = match config.database_url.as_deref() {
            Some(url) => Arc::new(PgRecordStore::new(Self::connect(url).await?)),
            None => {
                info!("DATABASE_URL not set, keeping records in memory");
                Arc::new(MemoryStore::new())
            }
        };

        let patterns = FieldPatterns::load(config.patterns_file.as_deref())
            .context("Failed to load extraction patterns")?
            .compile()
            .context("Failed to compile extraction patterns")?;
        if let Some(path) = &config.patterns_file {
            info!(path = %path.display(), "Loaded extraction pattern overrides");
        }

        let base_url = Url::parse(&config.source_base_url).context("Invalid SOURCE_BASE_URL")?;
        let client = Safe182Client::new(
            &base_url,
            &config.source_list_path,
            config.source_page_size,
            config.request_timeout,
        )
        .context("Failed to create listing client")?;

        let resolver = AddressResolver::new();
        let extractor = RecordExtractor::new(patterns, base_url, resolver);

        let hub = EventHub::default();
        let recent = RecentCache::default();
        let app_state = AppState::new(store.clone(), hub.clone(), recent.clone());

        let poller = Poller::new(Arc::new(client), extractor, store, Arc::new(hub))
            .with_paginator(Paginator::new(config.page_cap, config.page_delay))
            .with_recency(RecencyFilter::from_days(config.recency_days))
            .with_recent_cache(recent);

        Ok(App {
            config,
            app_state,
            poller: Arc::new(Mutex::new(poller)),
        })
    }

    async fn connect(database_url: &str) -> Result<sqlx::PgPool, anyhow::Error> {
        let slow_threshold = Duration::from_millis(500);
        let connect_options = PgConnectOptions::from_str(database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_slow_threshold(slow_threshold)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            max_connections = 4,
            acquire_slow_threshold = fmt_duration(slow_threshold),
            "database pool established"
        );

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        Ok(db_pool)
    }

    /// Run a single primary ingestion pass and report how it went.
    pub async fn run_once(self) -> ExitCode {
        let mut poller = self.poller.lock().await;
        if let Err(e) = poller.seed().await {
            warn!(error = ?e, "Failed to seed recent cache, starting empty");
        }

        match poller.run_primary().await {
            RunOutcome::Completed(summary) => {
                info!(
                    pages = summary.pages,
                    saved = summary.counts.saved,
                    duplicates = summary.counts.duplicates,
                    "Single ingestion pass completed"
                );
                ExitCode::SUCCESS
            }
            RunOutcome::FellBack { reason, .. } => {
                error!(reason = %reason, "Single ingestion pass fell back to sample data");
                ExitCode::FAILURE
            }
        }
    }

    /// Run the web server and ingestion scheduler until a shutdown signal arrives.
    pub async fn run(self) -> ExitCode {
        let shutdown = CancellationToken::new();
        let statuses = self.app_state.service_statuses.clone();

        let scheduler = Scheduler::new(
            self.poller.clone(),
            statuses.clone(),
            self.config.poll_interval,
            self.config.supplementary_interval,
            self.config.shutdown_timeout,
        );
        let mut scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

        let mut web_handle = tokio::spawn(Self::serve(
            self.config.port,
            self.app_state.clone(),
            shutdown.clone(),
        ));

        let mut exit = ExitCode::SUCCESS;
        tokio::select! {
            _ = shutdown_signal() => {}
            result = &mut web_handle => {
                match result {
                    Ok(Ok(())) => warn!("Web server stopped unexpectedly"),
                    Ok(Err(e)) => error!(error = ?e, "Web server failed"),
                    Err(e) => error!(error = ?e, "Web server task panicked"),
                }
                statuses.set(WEB_SERVICE, ServiceStatus::Error);
                exit = ExitCode::FAILURE;
            }
            result = &mut scheduler_handle => {
                if let Err(e) = result {
                    error!(error = ?e, "Ingestion scheduler task panicked");
                }
                statuses.set(INGEST_SERVICE, ServiceStatus::Error);
                exit = ExitCode::FAILURE;
            }
        }

        shutdown.cancel();
        // The scheduler spends up to `shutdown_timeout` on an in-flight run; allow a little more.
        let grace = self.config.shutdown_timeout + Duration::from_secs(1);
        let drained = tokio::time::timeout(grace, async {
            if !scheduler_handle.is_finished() {
                let _ = (&mut scheduler_handle).await;
            }
            if !web_handle.is_finished() {
                let _ = (&mut web_handle).await;
            }
        })
        .await;

        if drained.is_err() {
            warn!(timeout = fmt_duration(grace), "Services did not stop in time, exiting anyway");
            scheduler_handle.abort();
            web_handle.abort();
            exit = ExitCode::FAILURE;
        } else {
            info!("All services stopped");
        }

        exit
    }

    async fn serve(
        port: u16,
        app_state: AppState,
        shutdown: CancellationToken,
    ) -> Result<(), anyhow::Error> {
        let statuses = app_state.service_statuses.clone();
        let address = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {address}"))?;
        info!(address, "Web server listening");
        statuses.set(WEB_SERVICE, ServiceStatus::Active);

        axum::serve(listener, create_router(app_state))
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .context("Web server error")?;

        info!("Web server stopped");
        Ok(())
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = ?e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
