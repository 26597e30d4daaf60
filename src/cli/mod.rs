mod daemon;
mod doctor;
mod serve;

use anyhow::Result;
use console::style;

use crate::config::Config;
use crate::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Core")
        .command("serve", "Run the web console in the foreground")
        .command("gateway", "Start, stop, or inspect the background daemon")
        .command("logs", "Tail the daemon log file")
        .print();

    GuideSection::new("Diagnostics")
        .command("doctor", "Check host dependencies and setup")
        .command("version", "Print the installed version")
        .print();

    GuideSection::new("Options for serve")
        .text("--host <addr>   Bind address (default: 127.0.0.1)")
        .text("--port <port>   Listen port (default: 9855)")
        .text("--no-open       Do not open the dashboard in a browser")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("scriptshed").green()
    );
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = Config::load();

    if args.len() > 1 {
        let cmd = args[1].as_str();
        match cmd {
            "serve" => {
                let options = serve::parse_serve_flags(&args, 2);
                return serve::run(options, false).await;
            }
            "daemon-run" => {
                // Internal entrypoint used by `gateway start`.
                let options = serve::parse_serve_flags(&args, 2);
                return serve::run(options, true).await;
            }
            "gateway" => {
                let sub_cmd = args.get(2).map(String::as_str).unwrap_or("");
                match sub_cmd {
                    "start" => daemon::gateway_start(&config, &args).await?,
                    "stop" => daemon::gateway_stop(&config).await?,
                    "restart" => daemon::gateway_restart().await?,
                    "status" => daemon::gateway_status(&config).await?,
                    _ => {
                        print_error(
                            "Unknown gateway command. Expected one of: start, stop, restart, status",
                        );
                        print_help();
                    }
                }
                return Ok(());
            }
            "logs" => {
                daemon::follow_logs(&config).await?;
                return Ok(());
            }
            "doctor" => {
                doctor::run_doctor(&config).await?;
                return Ok(());
            }
            "version" | "--version" | "-V" => {
                println!("scriptshed {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "help" | "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            _ => {
                print_error(&format!("Unknown command: {}", cmd));
                print_help();
                return Ok(());
            }
        }
    }

    print_help();
    Ok(())
}
