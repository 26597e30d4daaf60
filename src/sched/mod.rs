//! Cron scheduling for stored scripts.
//!
//! The API speaks five-field crontab plus the common `@` nicknames;
//! `tokio-cron-scheduler` wants six fields with leading seconds, so
//! expressions are normalized before they reach the engine.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::lifecycle::LifecycleComponent;
use crate::runs::RunManager;
use crate::store::ScriptStore;

#[derive(Debug)]
pub enum ScheduleError {
    InvalidExpression,
    Runtime(String),
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::InvalidExpression => write!(f, "Invalid cron expression"),
            ScheduleError::Runtime(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Accepts the crontab nicknames (minus `@reboot`, which has no meaning
/// for a long-running service) and anything shaped like five fields.
/// Field values are checked by the engine when the job is armed.
pub fn valid_shape(expr: &str) -> bool {
    let re = Regex::new(r"^(@(yearly|annually|monthly|weekly|daily|hourly)|(\S+\s+){4}\S+)$")
        .unwrap();
    re.is_match(expr)
}

fn normalize(expr: &str) -> String {
    let five = match expr {
        "@yearly" | "@annually" => "0 0 1 1 *",
        "@monthly" => "0 0 1 * *",
        "@weekly" => "0 0 * * 0",
        "@daily" => "0 0 * * *",
        "@hourly" => "0 * * * *",
        other => other,
    };
    format!("0 {}", five)
}

pub struct ScheduleService {
    scheduler: Arc<Mutex<JobScheduler>>,
    jobs: Mutex<HashMap<String, Uuid>>,
    store: ScriptStore,
    runs: RunManager,
}

impl ScheduleService {
    pub fn new(scheduler: Arc<Mutex<JobScheduler>>, store: ScriptStore, runs: RunManager) -> Self {
        Self {
            scheduler,
            jobs: Mutex::new(HashMap::new()),
            store,
            runs,
        }
    }

    /// Arm every stored schedule. Returns how many jobs were registered;
    /// scripts with unparseable expressions are skipped with a warning.
    pub async fn load(&self) -> usize {
        let scripts = match self.store.list() {
            Ok(scripts) => scripts,
            Err(e) => {
                tracing::warn!("Could not list scripts for scheduling: {}", e);
                return 0;
            }
        };
        let mut armed = 0;
        for (id, meta) in scripts {
            let Some(expr) = meta.schedule else { continue };
            match self.arm(&id, &expr).await {
                Ok(_) => armed += 1,
                Err(e) => tracing::warn!("Skipping schedule for {} ({}): {}", id, expr, e),
            }
        }
        armed
    }

    /// Swap the cron job for a script. An empty expression disarms it.
    /// The replacement is armed before the old job is dropped, so a
    /// rejected expression leaves the current schedule running.
    pub async fn set_schedule(&self, script_id: &str, expr: &str) -> Result<(), ScheduleError> {
        if expr.is_empty() {
            return self
                .disarm(script_id)
                .await
                .map_err(|e| ScheduleError::Runtime(e.to_string()));
        }
        if !valid_shape(expr) {
            return Err(ScheduleError::InvalidExpression);
        }
        let replaced = self.arm(script_id, expr).await?;
        if let Some(old_id) = replaced
            && let Err(e) = self.scheduler.lock().await.remove(&old_id).await
        {
            tracing::warn!(
                "Replaced schedule for {} but could not drop the old job: {}",
                script_id,
                e
            );
        }
        Ok(())
    }

    /// Best-effort removal, used when a script is deleted.
    pub async fn remove_schedule(&self, script_id: &str) {
        if let Err(e) = self.disarm(script_id).await {
            tracing::warn!("Could not remove schedule for {}: {}", script_id, e);
        }
    }

    /// Next fire time of a script's armed job, if any.
    pub async fn next_run(&self, script_id: &str) -> Option<DateTime<Utc>> {
        let job_id = {
            let jobs = self.jobs.lock().await;
            jobs.get(script_id).copied()
        }?;
        match self.scheduler.lock().await.next_tick_for_job(job_id).await {
            Ok(tick) => tick,
            Err(e) => {
                tracing::debug!("No next tick for {}: {}", script_id, e);
                None
            }
        }
    }

    /// Registers a job with the engine and maps the script to it,
    /// returning the id of any job the script had before.
    async fn arm(&self, script_id: &str, expr: &str) -> Result<Option<Uuid>, ScheduleError> {
        let normalized = normalize(expr);
        let store = self.store.clone();
        let runs = self.runs.clone();
        let id = script_id.to_string();
        let job = Job::new_async(normalized.as_str(), move |_uuid, mut _l| {
            let store = store.clone();
            let runs = runs.clone();
            let id = id.clone();
            Box::pin(async move {
                if !store.exists(&id) {
                    tracing::warn!("Scheduled script {} no longer exists", id);
                    return;
                }
                tracing::info!("Schedule fired for script {}", id);
                let run_id = runs.start(store.script_path(&id), None, false).await;
                tracing::debug!("Scheduled run {} started for script {}", run_id, id);
            })
        })
        .map_err(|e| {
            tracing::debug!("Rejected cron expression {:?}: {}", expr, e);
            ScheduleError::InvalidExpression
        })?;

        let job_id = self
            .scheduler
            .lock()
            .await
            .add(job)
            .await
            .map_err(|e| ScheduleError::Runtime(e.to_string()))?;
        Ok(self.jobs.lock().await.insert(script_id.to_string(), job_id))
    }

    async fn disarm(&self, script_id: &str) -> Result<()> {
        let existing = self.jobs.lock().await.remove(script_id);
        if let Some(job_id) = existing {
            self.scheduler.lock().await.remove(&job_id).await?;
        }
        Ok(())
    }
}

/// Lifecycle hook that arms stored schedules before the engine starts.
pub struct SchedulerComponent {
    service: Arc<ScheduleService>,
}

impl SchedulerComponent {
    pub fn new(service: Arc<ScheduleService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LifecycleComponent for SchedulerComponent {
    async fn on_init(&mut self) -> Result<()> {
        let armed = self.service.load().await;
        if armed > 0 {
            tracing::info!("Armed {} stored schedules", armed);
        }
        Ok(())
    }
}
