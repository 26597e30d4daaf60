use anyhow::Result;

use super::daemon;
use crate::config::Config;
use crate::platform::{NativePlatform, Platform};
use crate::terminal::{self, print_error, print_info, print_step, print_success, print_warn};

/// Walk through everything a working installation needs and report on
/// each piece. Only the shell and a writable scripts directory are
/// fatal; the rest degrade specific features.
pub async fn run_doctor(config: &Config) -> Result<()> {
    print_step("scriptshed System Doctor - Checking Dependencies...");
    println!();

    let shell = NativePlatform::default_shell();
    let mut missing_shell = false;
    let mut bad_scripts_dir = false;

    // 1. Shell Check
    match std::process::Command::new(shell).arg("--version").output() {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout);
            print_success(&format!(
                "Shell is available: {}",
                version.lines().next().unwrap_or("").trim()
            ));
        }
        _ => {
            print_error(&format!("{} is missing! (Required to run scripts)", shell));
            missing_shell = true;
        }
    }

    // 2. Scripts Directory Check
    let probe = config.scripts_dir.join(".doctor-probe");
    let writable = std::fs::create_dir_all(&config.scripts_dir)
        .and_then(|_| std::fs::write(&probe, b"probe"))
        .is_ok();
    std::fs::remove_file(&probe).ok();
    if writable {
        print_success(&format!(
            "Scripts directory is writable: {}",
            config.scripts_dir.display()
        ));
    } else {
        print_error(&format!(
            "Scripts directory is not writable: {}",
            config.scripts_dir.display()
        ));
        bad_scripts_dir = true;
    }

    // 3. Cron Engine Check
    match tokio_cron_scheduler::JobScheduler::new().await {
        Ok(_) => print_success("Cron engine is available. Schedules will run."),
        Err(e) => print_warn(&format!(
            "Cron engine could not start ({}). Schedules are disabled.",
            e
        )),
    }

    // 4. Passwordless Sudo Check
    match std::process::Command::new("sudo")
        .args(["-n", "true"])
        .output()
    {
        Ok(out) if out.status.success() => {
            print_success("Passwordless sudo is available for sudo-mode runs.");
        }
        _ => {
            print_warn("Passwordless sudo is not available. Sudo-mode runs will fail.");
        }
    }

    // 5. Port / Gateway Check
    match std::net::TcpListener::bind(config.bind_addr()) {
        Ok(_) => print_success(&format!("Port {} is free.", config.port)),
        Err(_) => {
            if daemon::check_health(&config.dashboard_url()).await {
                print_info(&format!(
                    "The gateway is already serving at {}.",
                    config.dashboard_url()
                ));
            } else {
                print_warn(&format!(
                    "Port {} is taken by something that is not answering /health.",
                    config.port
                ));
            }
        }
    }

    // 6. Deployment Mode
    if config.container {
        print_info("Running inside a container.");
    }
    if config.host_access {
        print_info("Host-access mode is enabled.");
    }

    println!();

    if missing_shell || bad_scripts_dir {
        print_error("Some critical dependencies are missing. Please check the logs above.");
    } else {
        println!(
            "{} All systems normal. You are ready to fly!",
            terminal::ROCKET
        );
    }

    Ok(())
}
