//! # Poll Loop
//!
//! The agent's steady state: heartbeat, sync config when stale, then
//! work through pending jobs one at a time.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  every poll_interval seconds:                                │
//! │                                                              │
//! │  heartbeat ──► version stale? ──► GET /config ──► apply     │
//! │      │                                                       │
//! │      ▼                                                       │
//! │  GET /jobs ──► claim ──► fetch PDF ──► start ──► lp ──►     │
//! │                 │                                complete    │
//! │                 └── lost the race? next job                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! One job failing never aborts the cycle; the failure is reported via
//! `complete(success=false)` and the loop moves on.

use std::io::Write;
use std::time::Duration;

use tracing::{debug, info, warn};
use tracing_subscriber::{reload, EnvFilter, Registry};

use flypush_core::AgentConfig;

use crate::client::{ApiClient, HeartbeatRequest};
use crate::config::{ConfigStore, LocalSettings};
use crate::error::{AgentError, AgentResult};
use crate::printer;

/// Handle for adjusting the log level from synced config.
pub type LogReloadHandle = reload::Handle<EnvFilter, Registry>;

/// The running agent.
pub struct Agent {
    client: ApiClient,
    store: ConfigStore,
    settings: LocalSettings,
    log_reload: Option<LogReloadHandle>,
}

impl Agent {
    pub fn new(client: ApiClient, store: ConfigStore, settings: LocalSettings) -> Self {
        Agent {
            client,
            store,
            settings,
            log_reload: None,
        }
    }

    /// Attaches the subscriber reload handle so synced `log_level`
    /// changes apply without a restart.
    pub fn with_log_reload(mut self, handle: LogReloadHandle) -> Self {
        self.log_reload = Some(handle);
        self
    }

    /// Runs until ctrl-c.
    pub async fn run(&mut self) -> AgentResult<()> {
        info!(
            poll_interval = self.settings.poll_interval,
            printer = self.settings.printer_name.as_deref().unwrap_or("<none>"),
            "Agent started"
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping agent");
                    return Ok(());
                }
                _ = self.cycle_and_sleep() => {}
            }
        }
    }

    async fn cycle_and_sleep(&mut self) {
        if let Err(e) = self.cycle().await {
            warn!(error = %e, "Poll cycle failed; retrying next interval");
        }
        tokio::time::sleep(Duration::from_secs(u64::from(
            self.settings.poll_interval.max(1),
        )))
        .await;
    }

    /// One poll cycle.
    pub async fn cycle(&mut self) -> AgentResult<()> {
        let printers = printer::list_printers().await.unwrap_or_default();
        let heartbeat = self
            .client
            .heartbeat(&HeartbeatRequest {
                printer_name: self.settings.printer_name.clone(),
                available_printers: Some(printers),
            })
            .await?;

        if heartbeat.latest_agent_version != env!("CARGO_PKG_VERSION") {
            debug!(
                latest = %heartbeat.latest_agent_version,
                running = env!("CARGO_PKG_VERSION"),
                "A newer agent version is available"
            );
        }

        // Refetch config only when the heartbeat echo says ours is stale
        if heartbeat.config_version != self.settings.config_version {
            let config = self.client.config().await?;
            self.apply_config(&config)?;
        }

        let jobs = self.client.pending_jobs().await?;
        if !jobs.is_empty() {
            debug!(pending = jobs.len(), "Jobs waiting");
        }

        for job in jobs {
            match self.process_job(&job.id).await {
                Ok(()) => {}
                Err(e) if e.is_claim_conflict() => {
                    debug!(job_id = %job.id, "Lost claim race, skipping");
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Job processing failed");
                }
            }
        }

        Ok(())
    }

    /// Applies a fresh config snapshot: cache to disk, adjust the loop
    /// and the log level.
    fn apply_config(&mut self, config: &AgentConfig) -> AgentResult<()> {
        let settings = LocalSettings::from_server(config);
        info!(
            version = settings.config_version,
            printer = settings.printer_name.as_deref().unwrap_or("<none>"),
            format = %settings.label_format,
            "Applying synced configuration"
        );

        if let Some(handle) = &self.log_reload {
            if settings.log_level != self.settings.log_level {
                match handle.reload(EnvFilter::new(&settings.log_level)) {
                    Ok(()) => info!(level = %settings.log_level, "Log level updated"),
                    Err(e) => warn!(error = %e, "Failed to update log level"),
                }
            }
        }

        self.store.save_settings(&settings)?;
        self.settings = settings;
        Ok(())
    }

    /// Claims and prints a single job.
    async fn process_job(&self, job_id: &str) -> AgentResult<()> {
        let job = self.client.claim(job_id).await?;
        info!(job_id = %job.id, format = %job.label_format, copies = job.copies, "Job claimed");

        let pdf = self.client.job_pdf(&job.id).await?;

        let Some(printer_name) = self.settings.printer_name.clone() else {
            let reason = "No printer configured on this agent";
            self.client.complete(&job.id, false, Some(reason)).await?;
            return Err(AgentError::Printer(reason.to_string()));
        };

        self.client.start(&job.id).await?;

        let result = self.submit(&printer_name, &pdf, &job).await;
        match result {
            Ok(()) => {
                self.client.complete(&job.id, true, None).await?;
                info!(job_id = %job.id, "Job printed");
                Ok(())
            }
            Err(e) => {
                self.client
                    .complete(&job.id, false, Some(&e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }

    /// Spools the PDF through a temp file.
    async fn submit(
        &self,
        printer_name: &str,
        pdf: &[u8],
        job: &crate::client::ClaimedJob,
    ) -> AgentResult<()> {
        let mut spool = tempfile::Builder::new()
            .prefix("flyprint-")
            .suffix(".pdf")
            .tempfile()?;
        spool.write_all(pdf)?;
        spool.flush()?;

        printer::print_pdf(printer_name, spool.path(), &job.label_format, job.copies).await
    }
}
