use std::path::{Path, PathBuf};

/// OS-specific process and filesystem operations behind one interface,
/// so the rest of the crate never needs `#[cfg]` blocks.
pub trait Platform {
    /// The shell binary that script bodies are written for.
    fn default_shell() -> &'static str;

    /// A tokio `Command` that runs a script file through the shell.
    fn shell_command_async(script_path: &Path) -> tokio::process::Command;

    /// A tokio `Command` that runs a script file under passwordless sudo.
    fn sudo_shell_command_async(script_path: &Path) -> tokio::process::Command;

    /// Ask the process identified by `pid` to terminate.
    fn kill_process(pid: &str) -> std::io::Result<std::process::Output>;

    /// Ask the whole process group rooted at `pid` to terminate.
    fn kill_process_group(pid: &str) -> std::io::Result<std::process::Output>;

    /// PIDs of processes currently listening on `port`.
    fn find_pids_on_port(port: u16) -> Vec<String>;

    /// Spawn a child following a log file, `tail -f` style.
    fn tail_file(path: &Path) -> std::io::Result<std::process::Child>;

    /// Make a directory private to the current user where the OS supports it.
    fn restrict_dir_permissions(path: &Path);

    /// Mark a script file runnable where the OS requires it.
    fn set_executable(path: &Path);

    /// Root data directory for scriptshed.
    /// Unix: `~/.scriptshed`, Windows: `%APPDATA%\scriptshed`.
    fn data_dir() -> PathBuf;
}

/// Honor `SCRIPTSHED_DATA_DIR` before falling back to the platform default.
pub fn resolve_data_dir(default: PathBuf) -> PathBuf {
    if let Ok(dir) = std::env::var("SCRIPTSHED_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    default
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;
