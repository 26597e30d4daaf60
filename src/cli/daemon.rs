use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use console::style;

use super::serve;
use crate::config::Config;
use crate::platform::{NativePlatform, Platform};
use crate::terminal::{GuideSection, print_error, print_info, print_warn};

pub async fn gateway_start(config: &Config, args: &[String]) -> Result<()> {
    let run_dir = config.run_dir();
    std::fs::create_dir_all(&run_dir)?;
    NativePlatform::restrict_dir_permissions(&run_dir);
    let pid_file = config.pid_file();
    if recorded_pid(&pid_file).is_some() {
        print_warn("Daemon is already running. Use 'scriptshed gateway stop' first.");
        return Ok(());
    }

    let options = serve::parse_serve_flags(args, 3);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_file())?;

    let exe = std::env::current_exe()?;
    let mut child_cmd = std::process::Command::new(exe);
    child_cmd.arg("daemon-run");
    if let Some(port) = options.port {
        child_cmd.arg("--port").arg(port.to_string());
    }
    if let Some(host) = &options.host {
        child_cmd.arg("--host").arg(host);
    }

    let child = child_cmd
        .stdin(std::process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    std::fs::write(&pid_file, child.id().to_string())?;

    // Flags passed to `gateway start` shape what the child will bind.
    let effective = Config::load_with_overrides(options.host, options.port);
    GuideSection::new("Gateway Started")
        .status(
            "Status",
            &format!(
                "{} (PID {})",
                style("RUNNING").green().bold(),
                style(child.id()).dim()
            ),
        )
        .status("Dashboard", &effective.dashboard_url())
        .status("Scripts", &effective.scripts_dir.display().to_string())
        .blank()
        .info(&format!(
            "Run {} to follow the logs.",
            style("scriptshed logs").cyan().bold()
        ))
        .print();
    println!();

    Ok(())
}

pub async fn gateway_stop(config: &Config) -> Result<()> {
    let pid_file = config.pid_file();
    match recorded_pid(&pid_file) {
        Some(pid) => {
            let _ = NativePlatform::kill_process(&pid);
            std::fs::remove_file(&pid_file).ok();
            GuideSection::new("Gateway Stopped")
                .status(
                    "Status",
                    &format!(
                        "{} (was PID {})",
                        style("STOPPED").red().bold(),
                        style(&pid).dim()
                    ),
                )
                .print();
        }
        None => {
            std::fs::remove_file(&pid_file).ok();
            print_info("Gateway is not currently running.");
        }
    }

    // Clean up anything still holding the listen port.
    for pid in NativePlatform::find_pids_on_port(config.port) {
        let _ = NativePlatform::kill_process(&pid);
        print_info(&format!(
            "Cleaned up process on port {} (PID {})",
            style(config.port).cyan(),
            style(&pid).bold()
        ));
    }

    println!();
    Ok(())
}

pub async fn gateway_restart() -> Result<()> {
    let exe = std::env::current_exe()?;
    for action in ["stop", "start"] {
        let _ = std::process::Command::new(&exe)
            .args(["gateway", action])
            .status();
    }
    Ok(())
}

pub async fn gateway_status(config: &Config) -> Result<()> {
    let Some(pid) = recorded_pid(&config.pid_file()) else {
        GuideSection::new("Gateway Status")
            .status("Gateway", &style("STOPPED").red().bold().to_string())
            .blank()
            .info(&format!(
                "Run {} to start the daemon.",
                style("scriptshed gateway start").cyan().bold()
            ))
            .print();
        println!();
        return Ok(());
    };

    let api = if check_health(&config.dashboard_url()).await {
        format!(
            "{} at {}",
            style("REACHABLE").green().bold(),
            config.dashboard_url()
        )
    } else {
        style("UNREACHABLE").red().bold().to_string()
    };
    GuideSection::new("Gateway Status")
        .status(
            "Gateway",
            &format!(
                "{} (PID {})",
                style("RUNNING").green().bold(),
                style(&pid).dim()
            ),
        )
        .status("API", &api)
        .status("Host", &format!("{}@{}", whoami::username(), host_label()))
        .print();
    println!();
    Ok(())
}

pub async fn follow_logs(config: &Config) -> Result<()> {
    if recorded_pid(&config.pid_file()).is_some() {
        let log_file = config.log_file();
        if log_file.exists() {
            GuideSection::new("Live Logs")
                .text(&format!(
                    "Following {} - press {} to stop.",
                    style("scriptshed.log").cyan(),
                    style("Ctrl+C").bold().yellow()
                ))
                .print();
            println!();
            let mut child = NativePlatform::tail_file(&log_file)?;
            let _ = child.wait()?;
        } else {
            print_error(&format!(
                "Log file not found at {}",
                style(log_file.display()).dim()
            ));
        }
    } else {
        GuideSection::new("Live Logs")
            .warn("Gateway is not running.")
            .blank()
            .info(&format!(
                "Run {} to start it.",
                style("scriptshed gateway start").cyan().bold()
            ))
            .print();
        println!();
    }
    Ok(())
}

/// The pid recorded for a previously started daemon, if any.
fn recorded_pid(pid_file: &Path) -> Option<String> {
    let pid = std::fs::read_to_string(pid_file).ok()?;
    let pid = pid.trim();
    (!pid.is_empty()).then(|| pid.to_string())
}

pub(super) async fn check_health(base: &str) -> bool {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(client) => client,
        Err(_) => return false,
    };
    match client.get(format!("{}/health", base)).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

fn host_label() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
