//! Desktop notifications through an external notifier command
//!
//! The binary is located by trying an ordered list of candidates; the first
//! one that exists wins. Argument layout depends on which notifier was found.

use async_trait::async_trait;
use queuewatch_core::notify::APP_TITLE;
use queuewatch_core::{AppPaths, Notification, WatchConfig};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::channel::{ChannelError, NotifyChannel};

const RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Notifier binary expected on this platform
pub fn platform_binary() -> &'static str {
    if cfg!(windows) {
        "SnoreToast.exe"
    } else if cfg!(target_os = "macos") {
        "terminal-notifier"
    } else {
        "notify-send"
    }
}

/// One place to look for the notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Path from config; a relative path is tried next to the executable
    /// first, then as given (relative to the working directory)
    Configured(PathBuf),
    /// `<dir>/<binary>`
    InDir(PathBuf),
    /// `<binary>` somewhere on the search path
    OnPath,
}

impl Candidate {
    fn resolve(&self, binary: &str, exe_dir: Option<&Path>, search_path: Option<&OsString>) -> Option<PathBuf> {
        match self {
            Candidate::Configured(path) => {
                if path.is_relative() {
                    if let Some(dir) = exe_dir {
                        let beside = dir.join(path);
                        if beside.is_file() {
                            return Some(beside);
                        }
                    }
                }
                path.is_file().then(|| path.clone())
            }
            Candidate::InDir(dir) => {
                let path = dir.join(binary);
                path.is_file().then_some(path)
            }
            Candidate::OnPath => search_path.and_then(|paths| {
                std::env::split_paths(paths)
                    .map(|dir| dir.join(binary))
                    .find(|path| path.is_file())
            }),
        }
    }
}

/// Ordered notifier lookup
#[derive(Debug, Clone)]
pub struct ToastResolver {
    binary: String,
    candidates: Vec<Candidate>,
    exe_dir: Option<PathBuf>,
    search_path: Option<OsString>,
}

impl ToastResolver {
    pub fn new(binary: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            binary: binary.into(),
            candidates,
            exe_dir,
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Standard lookup order: configured path, next to the executable, the
    /// app's `bin` directory, then the search path
    pub fn for_config(config: &WatchConfig, paths: &AppPaths) -> Self {
        let mut candidates = Vec::new();
        if let Some(configured) = config.notifier_path.as_deref().filter(|p| !p.trim().is_empty()) {
            candidates.push(Candidate::Configured(PathBuf::from(configured)));
        }
        let mut resolver = Self::new(platform_binary(), candidates);
        if let Some(dir) = resolver.exe_dir.clone() {
            resolver.candidates.push(Candidate::InDir(dir));
        }
        resolver.candidates.push(Candidate::InDir(paths.bin_dir()));
        resolver.candidates.push(Candidate::OnPath);
        resolver
    }

    pub fn with_exe_dir(mut self, exe_dir: Option<PathBuf>) -> Self {
        self.exe_dir = exe_dir;
        self
    }

    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn resolve(&self) -> Option<PathBuf> {
        let found = self.candidates.iter().find_map(|candidate| {
            let hit = candidate.resolve(&self.binary, self.exe_dir.as_deref(), self.search_path.as_ref());
            if let Some(path) = &hit {
                debug!("Notifier found via {:?}: {:?}", candidate, path);
            }
            hit
        });
        if found.is_none() {
            debug!("No {} found in {} location(s)", self.binary, self.candidates.len());
        }
        found
    }
}

/// Argument conventions of the notifiers we know about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastFlavor {
    SnoreToast,
    TerminalNotifier,
    NotifySend,
    /// Unknown program: called as `<program> <title> <message>`
    Generic,
}

impl ToastFlavor {
    pub fn detect(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match stem.as_str() {
            "snoretoast" => ToastFlavor::SnoreToast,
            "terminal-notifier" => ToastFlavor::TerminalNotifier,
            "notify-send" => ToastFlavor::NotifySend,
            _ => ToastFlavor::Generic,
        }
    }

    pub fn args(&self, notification: &Notification) -> Vec<String> {
        let title = notification.title.clone();
        let message = notification.message.clone();
        match self {
            ToastFlavor::SnoreToast => vec![
                "-appID".into(),
                APP_TITLE.into(),
                "-t".into(),
                title,
                "-m".into(),
                message,
                "-d".into(),
                "long".into(),
            ],
            ToastFlavor::TerminalNotifier => {
                let mut args = vec!["-title".into(), title, "-message".into(), message];
                if let Some(url) = &notification.board_url {
                    args.push("-open".into());
                    args.push(url.clone());
                }
                args
            }
            ToastFlavor::NotifySend => {
                vec!["--app-name".into(), APP_TITLE.into(), title, message]
            }
            ToastFlavor::Generic => vec![title, message],
        }
    }
}

/// Runs the resolved notifier once per notification
pub struct ToastChannel {
    resolver: ToastResolver,
}

impl ToastChannel {
    pub fn new(resolver: ToastResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl NotifyChannel for ToastChannel {
    fn name(&self) -> &str {
        "toast"
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        let Some(program) = self.resolver.resolve() else {
            return Err(ChannelError::Unavailable(format!(
                "notifier '{}'",
                self.resolver.binary
            )));
        };

        let flavor = ToastFlavor::detect(&program);
        let args = flavor.args(notification);
        info!("Running notifier {:?} with args {:?}", program, args);

        let failed = |reason: String| ChannelError::Failed {
            channel: "toast".to_string(),
            reason,
        };

        let output = tokio::time::timeout(RUN_TIMEOUT, Command::new(&program).args(&args).output())
            .await
            .map_err(|_| failed(format!("{:?} timed out after {:?}", program, RUN_TIMEOUT)))?
            .map_err(|e| failed(format!("could not start {:?}: {}", program, e)))?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        info!(
            "Notifier exit={} output={}",
            output.status,
            combined.trim()
        );

        if output.status.success() {
            Ok(())
        } else {
            Err(failed(format!(
                "{:?} exited with {}: {}",
                program,
                output.status,
                combined.trim()
            )))
        }
    }
}
