//! Turns one action into process launches.
//!
//! Order is fixed: shell commands, then URLs one after another with a short
//! gap, then programs all at once without waiting on them. A failure in one
//! launch never stops its siblings.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::state::{Action, Notice, TerminalMode};

use super::opener::{build_embedded_url_invocation, build_open_url_invocation};
use super::profiles::{Platform, ProfileKind, ProfileResolution, TerminalProfile, resolve_profile};
use super::programs::build_program_invocation;
use super::prompt::{InputPrompt, InputResolver};
use super::terminal_spawn::{
    Invocation, ShellRequest, build_elevated_invocation, build_internal_invocation,
    build_linux_invocation, build_macos_invocation, build_windows_invocation,
};

pub const DEFAULT_URL_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("terminal profile {requested:?} is not available, using {fallback}")]
    TerminalResolution { requested: String, fallback: String },
    #[error("failed to start elevated terminal {target}: {source}")]
    Elevation {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to launch {target}: {source}")]
    Launch {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("input {0:?} was cancelled, remaining steps skipped")]
    InputCancelled(String),
}

impl DispatchError {
    pub fn to_notice(&self) -> Notice {
        match self {
            DispatchError::TerminalResolution { .. } => Notice::warning(self.to_string()),
            DispatchError::InputCancelled(_) => Notice::info(self.to_string()),
            DispatchError::Elevation { .. } | DispatchError::Launch { .. } => Notice::error(self.to_string()),
        }
    }
}

/// Where launches go. `SystemSink` spawns real processes.
pub trait EffectSink: Send + Sync + 'static {
    /// Start the shell that takes over the host terminal.
    fn start_internal(&self, invocation: &Invocation) -> std::io::Result<Option<Child>>;

    /// Start a background process and forget about it.
    fn spawn_detached(&self, invocation: &Invocation) -> std::io::Result<()>;

    /// Start a terminal window and forget about it. Its stdio is left to
    /// the console it opens.
    fn spawn_console(&self, invocation: &Invocation) -> std::io::Result<()>;
}

fn reap(mut child: std::process::Child) {
    std::thread::spawn(move || {
        let _ = child.wait();
    });
}

pub struct SystemSink;

impl EffectSink for SystemSink {
    fn start_internal(&self, invocation: &Invocation) -> std::io::Result<Option<Child>> {
        let mut cmd = tokio::process::Command::from(invocation.to_command());
        cmd.kill_on_drop(false);
        cmd.spawn().map(Some)
    }

    fn spawn_detached(&self, invocation: &Invocation) -> std::io::Result<()> {
        use std::process::Stdio;

        let mut cmd = invocation.to_command();
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        reap(cmd.spawn()?);
        Ok(())
    }

    fn spawn_console(&self, invocation: &Invocation) -> std::io::Result<()> {
        reap(invocation.to_command().spawn()?);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub platform: Platform,
    pub url_delay: Duration,
    pub default_profile: Option<String>,
    pub embedded_browser: Option<String>,
    /// Shell used by the internal terminal on POSIX hosts.
    pub host_shell: String,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            url_delay: DEFAULT_URL_DELAY,
            default_profile: None,
            embedded_browser: None,
            host_shell: std::env::var("SHELL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "/bin/sh".to_string()),
        }
    }
}

/// Outcome of one run.
///
/// Program launches may still be in flight; [`RunHandle::settle`] collects
/// their results and waits for the internal terminal session to end.
pub struct RunHandle {
    pub notices: Vec<Notice>,
    pub cancelled: bool,
    internal: Option<Child>,
    launches: Vec<JoinHandle<Result<(), DispatchError>>>,
}

impl RunHandle {
    fn new() -> Self {
        Self {
            notices: Vec::new(),
            cancelled: false,
            internal: None,
            launches: Vec::new(),
        }
    }

    fn report(&mut self, err: DispatchError) {
        match &err {
            DispatchError::InputCancelled(_) => tracing::info!("{}", err),
            DispatchError::TerminalResolution { .. } => tracing::warn!("{}", err),
            _ => tracing::error!("{}", err),
        }
        self.notices.push(err.to_notice());
    }

    pub async fn settle(mut self) -> Vec<Notice> {
        for launch in self.launches.drain(..) {
            match launch.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!("{}", err);
                    self.notices.push(err.to_notice());
                }
                Err(join_err) => {
                    tracing::error!("Launch task failed: {}", join_err);
                    self.notices.push(Notice::error(format!("Launch task failed: {}", join_err)));
                }
            }
        }

        if let Some(mut child) = self.internal.take() {
            match child.wait().await {
                Ok(status) => tracing::debug!("Internal terminal exited with {}", status),
                Err(e) => tracing::warn!("Failed waiting for internal terminal: {}", e),
            }
        }

        self.notices
    }
}

pub struct Dispatcher<S: EffectSink> {
    sink: Arc<S>,
    profiles: Vec<TerminalProfile>,
    options: DispatchOptions,
}

impl<S: EffectSink> Dispatcher<S> {
    pub fn new(sink: S, profiles: Vec<TerminalProfile>, options: DispatchOptions) -> Self {
        Self {
            sink: Arc::new(sink),
            profiles,
            options,
        }
    }

    /// True when the shell part of `action` runs on the host terminal:
    /// internal mode, or an external run on Linux with no emulator to host it.
    pub fn uses_host_terminal(&self, action: &Action) -> bool {
        if action.shell_commands.is_empty() {
            return false;
        }
        match action.terminal_mode {
            TerminalMode::Internal => true,
            TerminalMode::External => {
                let resolution = self.resolve(action);
                self.options.platform == Platform::Linux
                    && self.linux_host(resolution.profile.as_ref()).is_none()
            }
        }
    }

    fn resolve(&self, action: &Action) -> ProfileResolution {
        resolve_profile(
            &self.profiles,
            action.terminal_profile_name.as_deref(),
            self.options.default_profile.as_deref(),
            self.options.platform,
        )
    }

    /// Emulator window a Linux external run opens in, if any.
    fn linux_host<'p>(&'p self, profile: Option<&'p TerminalProfile>) -> Option<&'p TerminalProfile> {
        match profile {
            Some(p) if matches!(p.kind, ProfileKind::Emulator(_)) => Some(p),
            _ => self.first_emulator(),
        }
    }

    fn first_emulator(&self) -> Option<&TerminalProfile> {
        self.profiles
            .iter()
            .find(|p| matches!(p.kind, ProfileKind::Emulator(_)))
    }

    /// Fan one action out into its launches.
    ///
    /// Placeholders are resolved right before each effect class is issued,
    /// so a cancelled prompt keeps whatever was already launched.
    pub async fn run(&self, action: &Action, prompt: &dyn InputPrompt) -> RunHandle {
        let mut handle = RunHandle::new();
        let mut inputs = InputResolver::new(prompt);
        tracing::info!("Running {:?}", action.qualified_name());

        if !action.shell_commands.is_empty() {
            let commands = match inputs.resolve_all(&action.shell_commands) {
                Ok(commands) => commands,
                Err(label) => return cancelled(handle, label),
            };
            self.run_shell(action, &commands, &mut handle);
        }

        for (i, entry) in action.urls.iter().enumerate() {
            let url = match inputs.resolve(&entry.url) {
                Ok(url) => url,
                Err(label) => return cancelled(handle, label),
            };
            if i > 0 {
                tokio::time::sleep(self.options.url_delay).await;
            }
            let invocation = if entry.external {
                build_open_url_invocation(self.options.platform, &url)
            } else {
                if self.options.embedded_browser.is_none() {
                    tracing::info!("No embedded browser configured, opening {} externally", url);
                }
                build_embedded_url_invocation(
                    self.options.platform,
                    self.options.embedded_browser.as_deref(),
                    &url,
                )
            };
            if let Err(source) = self.sink.spawn_detached(&invocation) {
                handle.report(DispatchError::Launch { target: url, source });
            }
        }

        let mut programs = Vec::with_capacity(action.programs.len());
        for entry in &action.programs {
            let mut resolved = entry.clone();
            resolved.path = match inputs.resolve(&entry.path) {
                Ok(path) => path,
                Err(label) => return cancelled(handle, label),
            };
            if let Some(args) = &entry.args {
                match inputs.resolve(args) {
                    Ok(args) => resolved.args = Some(args),
                    Err(label) => return cancelled(handle, label),
                }
            }
            programs.push(resolved);
        }

        for entry in programs {
            let invocation = build_program_invocation(self.options.platform, &entry);
            let sink = Arc::clone(&self.sink);
            handle.launches.push(tokio::task::spawn_blocking(move || {
                sink.spawn_detached(&invocation)
                    .map_err(|source| DispatchError::Launch {
                        target: entry.path.clone(),
                        source,
                    })
            }));
        }

        handle
    }

    fn run_shell(&self, action: &Action, commands: &[String], handle: &mut RunHandle) {
        let req = ShellRequest {
            name: &action.name,
            commands,
            auto_close: action.auto_close,
            env: &action.env,
        };
        let platform = self.options.platform;

        if action.terminal_mode == TerminalMode::Internal {
            let invocation = build_internal_invocation(platform, &self.options.host_shell, &req);
            tracing::debug!("Internal terminal: {}", invocation.display());
            match self.sink.start_internal(&invocation) {
                Ok(child) => handle.internal = child,
                Err(source) => handle.report(DispatchError::Launch {
                    target: invocation.display(),
                    source,
                }),
            }
            return;
        }

        let resolution = self.resolve(action);
        if let Some(requested) = &resolution.missing {
            handle.report(DispatchError::TerminalResolution {
                requested: requested.clone(),
                fallback: resolution
                    .profile
                    .as_ref()
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "the platform shell".to_string()),
            });
        }
        let profile = resolution.profile.as_ref();

        let elevate = action.run_as_admin && platform == Platform::Windows;
        if action.run_as_admin && !elevate {
            handle.notices.push(Notice::warning(format!(
                "Run as administrator is only supported on Windows; {:?} runs unelevated",
                action.name
            )));
        }

        let invocation = match platform {
            Platform::Windows if elevate => build_elevated_invocation(profile, &req),
            Platform::Windows => build_windows_invocation(profile, &req),
            Platform::MacOs => build_macos_invocation(profile, &req),
            Platform::Linux => build_linux_invocation(profile, self.first_emulator(), &req),
        };
        tracing::debug!("External terminal: {}", invocation.display());

        if platform == Platform::Linux && self.linux_host(profile).is_none() {
            // No window to open, the kept-open shell takes the host terminal
            match self.sink.start_internal(&invocation) {
                Ok(child) => handle.internal = child,
                Err(source) => handle.report(DispatchError::Launch {
                    target: invocation.display(),
                    source,
                }),
            }
            return;
        }

        if let Err(source) = self.sink.spawn_console(&invocation) {
            let target = profile
                .map(|p| p.name.clone())
                .unwrap_or_else(|| invocation.program.clone());
            let err = if elevate {
                DispatchError::Elevation { target, source }
            } else {
                DispatchError::Launch { target, source }
            };
            handle.report(err);
        }
    }
}

fn cancelled(mut handle: RunHandle, label: String) -> RunHandle {
    handle.cancelled = true;
    handle.report(DispatchError::InputCancelled(label));
    handle
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;
    use crate::external::prompt::tests::ScriptedPrompt;
    use crate::state::{ProgramEntry, UrlEntry};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Kind {
        Internal,
        Detached,
        Console,
    }

    /// Records launches instead of spawning; programs listed in `failing`
    /// fail to start.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(Kind, Invocation, Instant)>>,
        failing: HashSet<String>,
    }

    impl RecordingSink {
        fn failing(programs: &[&str]) -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                failing: programs.iter().map(|p| p.to_string()).collect(),
            }
        }

        fn record(&self, kind: Kind, invocation: &Invocation) -> std::io::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((kind, invocation.clone(), Instant::now()));
            let line = invocation.display();
            if self.failing.iter().any(|f| line.contains(f.as_str())) {
                return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "not found"));
            }
            Ok(())
        }
    }

    impl EffectSink for RecordingSink {
        fn start_internal(&self, invocation: &Invocation) -> std::io::Result<Option<Child>> {
            self.record(Kind::Internal, invocation).map(|()| None)
        }

        fn spawn_detached(&self, invocation: &Invocation) -> std::io::Result<()> {
            self.record(Kind::Detached, invocation)
        }

        fn spawn_console(&self, invocation: &Invocation) -> std::io::Result<()> {
            self.record(Kind::Console, invocation)
        }
    }

    fn options(platform: Platform) -> DispatchOptions {
        DispatchOptions {
            platform,
            url_delay: Duration::from_millis(20),
            default_profile: None,
            embedded_browser: None,
            host_shell: "/bin/bash".to_string(),
        }
    }

    fn fan_out_action() -> Action {
        let mut action = Action::new("Morning");
        action.shell_commands = vec!["cd ~/work".to_string(), "git pull".to_string()];
        action.urls = vec![
            UrlEntry {
                url: "https://mail.example.com".to_string(),
                external: true,
            },
            UrlEntry {
                url: "https://dash.example.com".to_string(),
                external: false,
            },
        ];
        action.programs = vec![ProgramEntry {
            path: "/usr/bin/slack".to_string(),
            args: None,
        }];
        action
    }

    fn events(dispatcher: &Dispatcher<RecordingSink>) -> Vec<(Kind, Invocation, Instant)> {
        dispatcher.sink.events.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_fan_out_order_and_url_gap() {
        let dispatcher = Dispatcher::new(RecordingSink::default(), Vec::new(), options(Platform::Linux));
        let prompt = ScriptedPrompt::new(&[]);

        let handle = dispatcher.run(&fan_out_action(), &prompt).await;
        let notices = handle.settle().await;
        assert!(notices.is_empty(), "{:?}", notices);

        let events = events(&dispatcher);
        assert_eq!(events.len(), 4);

        assert_eq!(events[0].0, Kind::Internal);
        assert_eq!(events[0].1.args, vec!["-c", "cd ~/work && git pull; exec /bin/bash"]);

        assert_eq!(events[1].1.display(), "xdg-open https://mail.example.com");
        assert_eq!(events[2].1.display(), "xdg-open https://dash.example.com");
        assert!(events[2].2.duration_since(events[1].2) >= Duration::from_millis(20));

        assert_eq!(events[3].1.args, vec!["-c", "/usr/bin/slack"]);
    }

    #[tokio::test]
    async fn test_windows_internal_joins_with_semicolons() {
        let dispatcher = Dispatcher::new(RecordingSink::default(), Vec::new(), options(Platform::Windows));
        let mut action = Action::new("Build");
        action.shell_commands = vec!["cd app".to_string(), "dotnet build".to_string()];

        dispatcher.run(&action, &ScriptedPrompt::new(&[])).await.settle().await;
        let events = events(&dispatcher);
        assert_eq!(events[0].1.program, "powershell.exe");
        assert_eq!(events[0].1.args.last().unwrap(), "cd app; dotnet build");
    }

    #[tokio::test]
    async fn test_program_failures_reported_individually() {
        let sink = RecordingSink::failing(&["/missing/one", "/missing/two"]);
        let dispatcher = Dispatcher::new(sink, Vec::new(), options(Platform::Linux));
        let mut action = Action::new("Apps");
        action.programs = ["/missing/one", "/usr/bin/ok", "/missing/two"]
            .iter()
            .map(|p| ProgramEntry {
                path: p.to_string(),
                args: None,
            })
            .collect();

        let notices = dispatcher.run(&action, &ScriptedPrompt::new(&[])).await.settle().await;
        assert_eq!(events(&dispatcher).len(), 3);
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(Notice::is_error));
        assert!(notices.iter().any(|n| n.message.contains("/missing/one")));
        assert!(notices.iter().any(|n| n.message.contains("/missing/two")));
    }

    #[tokio::test]
    async fn test_missing_profile_falls_back_with_warning() {
        let profiles = vec![TerminalProfile {
            name: "XTerm".to_string(),
            kind: ProfileKind::Emulator(crate::external::profiles::EmulatorStyle::ExecArgs),
            path: PathBuf::from("/usr/bin/xterm"),
        }];
        let dispatcher = Dispatcher::new(RecordingSink::default(), profiles, options(Platform::Linux));
        let mut action = Action::new("Logs");
        action.shell_commands = vec!["tail -f log".to_string()];
        action.terminal_mode = TerminalMode::External;
        action.terminal_profile_name = Some("Warp".to_string());

        let handle = dispatcher.run(&action, &ScriptedPrompt::new(&[])).await;
        assert_eq!(handle.notices.len(), 1);
        assert!(handle.notices[0].message.contains("Warp"));
        handle.settle().await;

        let events = events(&dispatcher);
        assert_eq!(events[0].0, Kind::Console);
        assert_eq!(events[0].1.program, "/usr/bin/xterm");
        assert!(!dispatcher.uses_host_terminal(&action));
    }

    #[tokio::test]
    async fn test_elevation_failure_is_reported() {
        let sink = RecordingSink::failing(&["Start-Process"]);
        let dispatcher = Dispatcher::new(sink, Vec::new(), options(Platform::Windows));
        let mut action = Action::new("Admin");
        action.shell_commands = vec!["netsh winsock reset".to_string()];
        action.terminal_mode = TerminalMode::External;
        action.run_as_admin = true;

        let notices = dispatcher.run(&action, &ScriptedPrompt::new(&[])).await.settle().await;
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("elevated"));
    }

    #[tokio::test]
    async fn test_cancelled_prompt_keeps_earlier_effects() {
        let dispatcher = Dispatcher::new(RecordingSink::default(), Vec::new(), options(Platform::MacOs));
        let mut action = Action::new("Ticket");
        action.shell_commands = vec!["echo ${input:Name}".to_string()];
        action.urls = vec![UrlEntry {
            url: "https://jira/${input:Ticket}".to_string(),
            external: true,
        }];
        action.programs = vec![ProgramEntry {
            path: "/Applications/Slack.app".to_string(),
            args: None,
        }];
        let prompt = ScriptedPrompt::new(&[("Name", "ada")]);

        let handle = dispatcher.run(&action, &prompt).await;
        assert!(handle.cancelled);
        handle.settle().await;

        let events = events(&dispatcher);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.args[1], "echo ada; exec /bin/bash");
        assert_eq!(*prompt.asked.borrow(), vec!["Name", "Ticket"]);
    }

    #[tokio::test]
    async fn test_run_as_admin_off_windows_warns() {
        let dispatcher = Dispatcher::new(RecordingSink::default(), Vec::new(), options(Platform::Linux));
        let mut action = Action::new("Root");
        action.shell_commands = vec!["id".to_string()];
        action.terminal_mode = TerminalMode::External;
        action.run_as_admin = true;

        let handle = dispatcher.run(&action, &ScriptedPrompt::new(&[])).await;
        assert!(handle.notices.iter().any(|n| n.message.contains("administrator")));
        handle.settle().await;
        // No emulator available: the shell itself is started and kept open
        let events = events(&dispatcher);
        assert_eq!(events[0].1.display(), "bash -c id; exec bash");
        assert_eq!(events[0].0, Kind::Internal);
    }

    #[tokio::test]
    async fn test_linux_without_emulator_keeps_shell_on_host_terminal() {
        let dispatcher = Dispatcher::new(RecordingSink::default(), Vec::new(), options(Platform::Linux));
        let mut action = Action::new("Echo");
        action.shell_commands = vec!["echo hello".to_string()];
        action.terminal_mode = TerminalMode::External;
        assert!(dispatcher.uses_host_terminal(&action));

        let notices = dispatcher.run(&action, &ScriptedPrompt::new(&[])).await.settle().await;
        assert!(notices.is_empty(), "{:?}", notices);

        let events = events(&dispatcher);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Kind::Internal);
        assert_eq!(events[0].1.display(), "bash -c echo hello; exec bash");
    }

    #[tokio::test]
    async fn test_windows_external_opens_console_window() {
        let dispatcher = Dispatcher::new(RecordingSink::default(), Vec::new(), options(Platform::Windows));
        let mut action = Action::new("Build");
        action.shell_commands = vec!["dotnet build".to_string()];
        action.terminal_mode = TerminalMode::External;
        assert!(!dispatcher.uses_host_terminal(&action));

        dispatcher.run(&action, &ScriptedPrompt::new(&[])).await.settle().await;
        let events = events(&dispatcher);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, Kind::Console);
    }
}
