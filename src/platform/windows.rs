use std::path::{Path, PathBuf};

use super::{Platform, resolve_data_dir};

pub struct NativePlatform;

impl Platform for NativePlatform {
    fn default_shell() -> &'static str {
        "bash"
    }

    fn shell_command_async(script_path: &Path) -> tokio::process::Command {
        // Script bodies are bash. Git Bash or WSL provides bash.exe on Windows.
        let mut cmd = tokio::process::Command::new(Self::default_shell());
        cmd.arg(script_path);
        cmd
    }

    fn sudo_shell_command_async(script_path: &Path) -> tokio::process::Command {
        // There is no sudo on Windows; the spawn error surfaces in the run output.
        let mut cmd = tokio::process::Command::new("sudo");
        cmd.arg("-n").arg(Self::default_shell()).arg(script_path);
        cmd
    }

    fn kill_process(pid: &str) -> std::io::Result<std::process::Output> {
        std::process::Command::new("taskkill")
            .args(["/PID", pid, "/F"])
            .output()
    }

    fn kill_process_group(pid: &str) -> std::io::Result<std::process::Output> {
        // /T takes the whole process tree down with it.
        std::process::Command::new("taskkill")
            .args(["/PID", pid, "/T", "/F"])
            .output()
    }

    fn find_pids_on_port(port: u16) -> Vec<String> {
        let Ok(output) = std::process::Command::new("netstat")
            .args(["-ano", "-p", "TCP"])
            .output()
        else {
            return Vec::new();
        };
        let Ok(text) = String::from_utf8(output.stdout) else {
            return Vec::new();
        };
        let needle = format!(":{}", port);
        text.lines()
            .filter(|line| line.contains("LISTENING") && line.contains(&needle))
            .filter_map(|line| line.split_whitespace().last())
            .map(|pid| pid.to_string())
            .collect()
    }

    fn tail_file(path: &Path) -> std::io::Result<std::process::Child> {
        std::process::Command::new("powershell")
            .args(["-NoProfile", "-Command"])
            .arg(format!(
                "Get-Content -Path '{}' -Tail 200 -Wait",
                path.display()
            ))
            .spawn()
    }

    fn restrict_dir_permissions(_path: &Path) {
        // Per-user profile directories are already access controlled.
    }

    fn set_executable(_path: &Path) {}

    fn data_dir() -> PathBuf {
        let base = dirs::data_dir().expect("No data directory for the current user");
        resolve_data_dir(base.join("scriptshed"))
    }
}
