/*!
 * Clipboard support
 *
 * Packed documents are handed to a platform clipboard command (tmux,
 * wl-copy, xsel, xclip, pbcopy, clip.exe or termux-clipboard-set), picked
 * from what is installed. Failures are returned to the caller to report;
 * they never affect the packed document.
 */

use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::debug;

/// Error type for clipboard operations
#[derive(Error, Debug)]
pub enum ClipboardError {
    /// Failed to execute the command
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// No suitable clipboard mechanism was found
    #[error("No suitable clipboard mechanism found")]
    NoClipboardFound,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for clipboard operations
pub type Result<T> = std::result::Result<T, ClipboardError>;

/// Destination for copied text
pub trait Clipboard {
    /// Copy text to the clipboard
    fn copy_to_clipboard(&self, text: &str) -> Result<()>;
}

/// Clipboard commands, in order of preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardProvider {
    Tmux,
    Wayland,
    Xsel,
    Xclip,
    MacOS,
    Wsl,
    Termux,
}

impl ClipboardProvider {
    /// Program and arguments that read the text from stdin
    fn command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Tmux => ("tmux", &["load-buffer", "-w", "-"]),
            Self::Wayland => ("wl-copy", &[]),
            Self::Xsel => ("xsel", &["-b", "-i"]),
            Self::Xclip => ("xclip", &["-selection", "clipboard", "-in"]),
            Self::MacOS => ("pbcopy", &[]),
            Self::Wsl => ("clip.exe", &[]),
            Self::Termux => ("termux-clipboard-set", &[]),
        }
    }

    /// Providers usable on this machine, best first
    pub fn detect() -> Vec<Self> {
        let mut providers = Vec::with_capacity(3);

        if command_exists("tmux") && is_tmux_running() {
            providers.push(Self::Tmux);
        }

        let candidates: &[Self] = match get_platform() {
            "macos" => &[Self::MacOS],
            "windows" | "wsl" => &[Self::Wsl],
            "linux" => &[Self::Wayland, Self::Xsel, Self::Xclip],
            "android" => &[Self::Termux],
            _ => &[],
        };
        providers.extend(
            candidates
                .iter()
                .copied()
                .filter(|p| command_exists(p.command().0)),
        );

        providers
    }
}

impl Clipboard for ClipboardProvider {
    fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        let (cmd, args) = self.command();
        execute_clipboard_command(cmd, args, text)
    }
}

/// The system clipboard, through the first provider that works
#[derive(Debug, Clone, Default)]
pub struct SystemClipboard {
    providers: Vec<ClipboardProvider>,
}

impl SystemClipboard {
    /// Detect the available providers
    pub fn detect() -> Self {
        Self {
            providers: ClipboardProvider::detect(),
        }
    }

    pub fn providers(&self) -> &[ClipboardProvider] {
        &self.providers
    }
}

impl Clipboard for SystemClipboard {
    fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.copy_to_clipboard(text) {
                Ok(()) => {
                    debug!("Copied {} bytes with {:?}", text.len(), provider);
                    return Ok(());
                }
                Err(e) => {
                    debug!("Clipboard provider {:?} failed: {}", provider, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(ClipboardError::NoClipboardFound))
    }
}

/// Copy text to the system clipboard
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    SystemClipboard::detect().copy_to_clipboard(text)
}

/// Check if a command exists on the system
pub fn command_exists(command: &str) -> bool {
    if let Some(paths) = env::var_os("PATH") {
        if env::split_paths(&paths).any(|dir| Path::new(&dir).join(command).is_file()) {
            return true;
        }
    }

    Command::new(command)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Spawn `cmd`, feed `text` on stdin and wait for it
fn execute_clipboard_command(cmd: &str, args: &[&str], text: &str) -> Result<()> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ClipboardError::CommandFailed(format!("Failed to spawn {}: {}", cmd, e)))?;

    {
        let stdin = child.stdin.as_mut().ok_or_else(|| {
            ClipboardError::CommandFailed(format!("Failed to open stdin for {}", cmd))
        })?;
        stdin.write_all(text.as_bytes())?;
    }
    // Close stdin so the command sees end of input
    drop(child.stdin.take());

    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(ClipboardError::CommandFailed(format!(
            "{} exited with status: {}",
            cmd, status
        )))
    }
}

static PLATFORM: OnceLock<&'static str> = OnceLock::new();

fn get_platform() -> &'static str {
    PLATFORM.get_or_init(|| {
        if cfg!(target_os = "macos") {
            "macos"
        } else if cfg!(target_os = "windows") {
            "windows"
        } else if cfg!(target_os = "android") {
            "android"
        } else if cfg!(target_os = "linux") {
            if env::var("WSL_DISTRO_NAME").is_ok() {
                "wsl"
            } else {
                "linux"
            }
        } else {
            "unknown"
        }
    })
}

fn is_tmux_running() -> bool {
    if env::var("TMUX").is_ok() {
        return true;
    }

    Command::new("tmux")
        .args(["list-buffers"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
