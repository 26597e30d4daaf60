mod cli;
mod config;
mod lifecycle;
mod logging;
mod platform;
mod runs;
mod sched;
mod store;
mod terminal;
mod web;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_main().await {
        terminal::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
