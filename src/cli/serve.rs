use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use tokio::sync::Mutex;

use crate::config::{Config, DEFAULT_PORT};
use crate::lifecycle::LifecycleManager;
use crate::logging;
use crate::runs::{RunJanitor, RunManager};
use crate::sched::{ScheduleService, SchedulerComponent};
use crate::store::ScriptStore;
use crate::terminal::{self, GuideSection};
use crate::web::ApiServer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServeOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub open_browser: bool,
}

pub(crate) fn parse_serve_flags(args: &[String], start: usize) -> ServeOptions {
    let mut host = None;
    let mut port = None;
    let mut open_browser = true;
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                if i + 1 < args.len() {
                    host = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--port" => {
                if i + 1 < args.len() {
                    port = Some(args[i + 1].parse().unwrap_or(DEFAULT_PORT));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--no-open" => {
                open_browser = false;
                i += 1;
            }
            _ => i += 1,
        }
    }
    ServeOptions {
        host,
        port,
        open_browser,
    }
}

/// Boot the full service: storage, cron engine, run manager and the
/// API server, then wait for Ctrl+C. In daemonized mode the banner and
/// browser launch are skipped since stdout goes to the log file.
pub async fn run(options: ServeOptions, daemonized: bool) -> Result<()> {
    let log_tx = logging::init();
    let config = Config::load_with_overrides(options.host, options.port);

    if !daemonized {
        terminal::print_banner();
    }

    let store = ScriptStore::new(config.scripts_dir.clone());
    store
        .ensure_layout()
        .with_context(|| format!("Could not create {}", config.scripts_dir.display()))?;

    let runs = RunManager::new();
    let mut manager = LifecycleManager::new().await;
    let sched = manager
        .scheduler
        .clone()
        .map(|scheduler| Arc::new(ScheduleService::new(scheduler, store.clone(), runs.clone())));

    if let Some(service) = &sched {
        manager.attach(Arc::new(Mutex::new(SchedulerComponent::new(service.clone()))));
    }
    manager.attach(Arc::new(Mutex::new(RunJanitor::new(runs.clone()))));
    manager.attach(Arc::new(Mutex::new(ApiServer::new(
        config.clone(),
        store,
        runs,
        sched,
        log_tx,
    ))));

    manager.start().await?;

    if !daemonized {
        GuideSection::new("scriptshed")
            .status(
                "Dashboard",
                &style(config.dashboard_url()).underlined().cyan().to_string(),
            )
            .status("Scripts", &config.scripts_dir.display().to_string())
            .blank()
            .text(&format!("Press {} to stop.", style("Ctrl+C").bold().yellow()))
            .print();
        println!();

        if options.open_browser {
            let _ = open::that(config.dashboard_url());
        }
    }

    tokio::signal::ctrl_c().await?;
    manager.shutdown().await?;
    if !daemonized {
        terminal::print_goodbye();
    }
    Ok(())
}
