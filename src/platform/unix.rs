use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use super::{Platform, resolve_data_dir};

pub struct NativePlatform;

impl Platform for NativePlatform {
    fn default_shell() -> &'static str {
        "bash"
    }

    fn shell_command_async(script_path: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(Self::default_shell());
        cmd.arg(script_path);
        cmd
    }

    fn sudo_shell_command_async(script_path: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("sudo");
        cmd.arg("-n").arg(Self::default_shell()).arg(script_path);
        cmd
    }

    fn kill_process(pid: &str) -> std::io::Result<std::process::Output> {
        std::process::Command::new("kill").args(["-15", pid]).output()
    }

    fn kill_process_group(pid: &str) -> std::io::Result<std::process::Output> {
        // A negative target asks kill(1) for the whole process group.
        let group = format!("-{}", pid);
        std::process::Command::new("kill")
            .args(["-15", "--", &group])
            .output()
    }

    fn find_pids_on_port(port: u16) -> Vec<String> {
        let Ok(output) = std::process::Command::new("lsof")
            .args(["-t", "-i"])
            .arg(format!("tcp:{}", port))
            .output()
        else {
            return Vec::new();
        };
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect()
    }

    fn tail_file(path: &Path) -> std::io::Result<std::process::Child> {
        std::process::Command::new("tail")
            .args(["-n", "100", "-f"])
            .arg(path)
            .spawn()
    }

    fn restrict_dir_permissions(path: &Path) {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700));
    }

    fn set_executable(path: &Path) {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755));
    }

    fn data_dir() -> PathBuf {
        let home = dirs::home_dir().expect("No home directory for the current user");
        resolve_data_dir(home.join(".scriptshed"))
    }
}
