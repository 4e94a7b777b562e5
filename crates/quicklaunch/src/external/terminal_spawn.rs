//! Builds the OS-level invocation that runs an action's shell commands.
//!
//! Every builder is a pure function of (platform, profile, request), so the
//! quoting of each shell family can be checked without spawning anything.

use std::collections::BTreeMap;
use std::process::Command;

use utils::shell::{escape_applescript, escape_elevation, quote_posix};

use super::profiles::{EmulatorStyle, Platform, ProfileKind, TerminalProfile};
use super::shell::{ShellFamily, join_commands, keep_open, wrap_auto_close};

/// Environment variable carrying the action name into launched shells.
pub const ACTION_ENV: &str = "QUICKLAUNCH_ACTION";

/// A fully resolved process launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Pass `args` to the Windows command line untouched instead of letting
    /// std quote them; cmd.exe has its own quoting rules.
    pub verbatim: bool,
    /// Give the process its own console window (Windows only).
    pub new_console: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            verbatim: false,
            new_console: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn verbatim(mut self) -> Self {
        self.verbatim = true;
        self
    }

    pub fn new_console(mut self) -> Self {
        self.new_console = true;
        self
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.envs(&self.env);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

            if self.verbatim {
                for arg in &self.args {
                    cmd.raw_arg(arg);
                }
            } else {
                cmd.args(&self.args);
            }
            if self.new_console {
                cmd.creation_flags(CREATE_NEW_CONSOLE);
            }
        }

        #[cfg(not(windows))]
        {
            cmd.args(&self.args);
        }

        cmd
    }

    /// Human-readable command line for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The parts of an action that shape its terminal invocation.
#[derive(Debug, Clone, Copy)]
pub struct ShellRequest<'a> {
    pub name: &'a str,
    pub commands: &'a [String],
    pub auto_close: bool,
    pub env: &'a BTreeMap<String, String>,
}

impl ShellRequest<'_> {
    fn env_with_tag(&self) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        env.insert(ACTION_ENV.to_string(), self.name.to_string());
        env
    }
}

/// Run the commands in the host's own terminal (the tty `ql` runs in).
///
/// `shell` is the user's login shell on POSIX hosts; Windows always uses
/// Windows PowerShell.
pub fn build_internal_invocation(platform: Platform, shell: &str, req: &ShellRequest) -> Invocation {
    let family = platform.host_shell_family();
    let script = join_commands(req.commands, family);

    let invocation = match family {
        ShellFamily::PowerShell => {
            let inv = Invocation::new("powershell.exe").arg("-NoLogo");
            if req.auto_close {
                inv.arg("-Command").arg(wrap_auto_close(&script, family))
            } else {
                inv.args(["-NoExit", "-Command"]).arg(script)
            }
        }
        ShellFamily::Posix | ShellFamily::Cmd => {
            let body = if req.auto_close {
                wrap_auto_close(&script, family)
            } else {
                keep_open(&script, family, shell)
            };
            Invocation::new(shell).arg("-c").arg(body)
        }
    };

    invocation.envs(&req.env_with_tag())
}

/// Program and arguments that run `script` in the shell of `profile`.
fn shell_argv(program: &str, kind: ProfileKind, req: &ShellRequest) -> Vec<String> {
    match kind {
        ProfileKind::Cmd => {
            let script = join_commands(req.commands, ShellFamily::Cmd);
            let flag = if req.auto_close { "/c" } else { "/k" };
            vec![program.to_string(), flag.to_string(), script]
        }
        ProfileKind::PowerShell => {
            let script = join_commands(req.commands, ShellFamily::PowerShell);
            let mut argv = vec![program.to_string()];
            if !req.auto_close {
                argv.push("-NoExit".to_string());
            }
            argv.push("-Command".to_string());
            argv.push(script);
            argv
        }
        ProfileKind::Posix | ProfileKind::MacTerminal | ProfileKind::ITerm | ProfileKind::Emulator(_) => {
            let script = join_commands(req.commands, ShellFamily::Posix);
            let body = if req.auto_close {
                script
            } else {
                keep_open(&script, ShellFamily::Posix, program)
            };
            if program.ends_with("wsl.exe") {
                vec![program.to_string(), "-e".to_string(), "bash".to_string(), "-c".to_string(), body]
            } else {
                vec![program.to_string(), "-c".to_string(), body]
            }
        }
    }
}

/// New console window on Windows, `cmd` when no profile resolved.
pub fn build_windows_invocation(profile: Option<&TerminalProfile>, req: &ShellRequest) -> Invocation {
    let (program, kind) = windows_target(profile);
    let mut argv = shell_argv(&program, kind, req).into_iter();
    let program = argv.next().unwrap_or(program);

    let inv = Invocation::new(program).args(argv).envs(&req.env_with_tag()).new_console();
    if kind == ProfileKind::Cmd { inv.verbatim() } else { inv }
}

/// Re-invoke through `Start-Process -Verb RunAs`.
///
/// The target command line travels as one string through an extra
/// PowerShell parsing layer, hence the dedicated escaping.
pub fn build_elevated_invocation(profile: Option<&TerminalProfile>, req: &ShellRequest) -> Invocation {
    let (program, kind) = windows_target(profile);
    let argv = shell_argv(&program, kind, req);
    let arg_line = argv[1..]
        .iter()
        .map(|a| windows_quote(a))
        .collect::<Vec<_>>()
        .join(" ");

    let start = format!(
        "Start-Process -FilePath '{}' -ArgumentList '{}' -Verb RunAs",
        escape_elevation(&program),
        escape_elevation(&arg_line)
    );

    Invocation::new("powershell.exe")
        .args(["-NoProfile", "-Command"])
        .arg(start)
        .envs(&req.env_with_tag())
}

fn windows_target(profile: Option<&TerminalProfile>) -> (String, ProfileKind) {
    match profile {
        Some(p) if !matches!(p.kind, ProfileKind::MacTerminal | ProfileKind::ITerm | ProfileKind::Emulator(_)) => {
            (p.program(), p.kind)
        }
        _ => ("cmd.exe".to_string(), ProfileKind::Cmd),
    }
}

fn windows_quote(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"') {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

/// Drive Terminal.app or iTerm through AppleScript.
pub fn build_macos_invocation(profile: Option<&TerminalProfile>, req: &ShellRequest) -> Invocation {
    let kind = profile.map(|p| p.kind).unwrap_or(ProfileKind::MacTerminal);

    let mut script = match kind {
        ProfileKind::PowerShell => {
            let program = profile.map(TerminalProfile::program).unwrap_or_else(|| "pwsh".to_string());
            shell_argv(&program, kind, req)
                .iter()
                .map(|a| quote_posix(a).into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        }
        _ => join_commands(req.commands, ShellFamily::Posix),
    };
    if req.auto_close {
        script.push_str("; exit");
    }
    let escaped = escape_applescript(&script);

    let lines: Vec<String> = match kind {
        ProfileKind::ITerm => vec![
            "tell application \"iTerm\"".to_string(),
            "create window with default profile".to_string(),
            format!("tell current session of current window to write text \"{}\"", escaped),
            "activate".to_string(),
            "end tell".to_string(),
        ],
        _ => vec![
            "tell application \"Terminal\"".to_string(),
            format!("do script \"{}\"", escaped),
            "activate".to_string(),
            "end tell".to_string(),
        ],
    };

    let mut inv = Invocation::new("osascript");
    for line in lines {
        inv = inv.arg("-e").arg(line);
    }
    inv.envs(&req.env_with_tag())
}

/// Spawn a terminal emulator running the profile's shell.
///
/// `emulator` hosts shell-only profiles. Without any emulator the shell is
/// started directly with a trailing command that keeps it open.
pub fn build_linux_invocation(
    profile: Option<&TerminalProfile>,
    emulator: Option<&TerminalProfile>,
    req: &ShellRequest,
) -> Invocation {
    let (host, shell_program, shell_kind) = match profile {
        Some(p) if matches!(p.kind, ProfileKind::Emulator(_)) => (Some(p), "bash".to_string(), ProfileKind::Posix),
        Some(p) => (emulator, p.program(), p.kind),
        None => (emulator, "bash".to_string(), ProfileKind::Posix),
    };

    let argv = shell_argv(&shell_program, shell_kind, req);
    let env = req.env_with_tag();

    let Some(host) = host else {
        tracing::warn!("No terminal emulator found, starting {} directly", shell_program);
        let argv = shell_argv(&shell_program, shell_kind, &ShellRequest { auto_close: false, ..*req });
        let mut argv = argv.into_iter();
        let program = argv.next().unwrap_or(shell_program);
        return Invocation::new(program).args(argv).envs(&env);
    };

    let style = match host.kind {
        ProfileKind::Emulator(style) => style,
        _ => EmulatorStyle::ExecArgs,
    };

    let inv = Invocation::new(host.program());
    let inv = match style {
        EmulatorStyle::DoubleDash => inv.arg("--").args(argv),
        EmulatorStyle::ExecArgs => inv.arg("-e").args(argv),
        EmulatorStyle::Direct => inv.args(argv),
        EmulatorStyle::ExecString => {
            let line = argv
                .iter()
                .map(|a| quote_posix(a).into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            inv.arg("-e").arg(line)
        }
    };
    inv.envs(&env)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn profile(name: &str, kind: ProfileKind, path: &str) -> TerminalProfile {
        TerminalProfile {
            name: name.to_string(),
            kind,
            path: PathBuf::from(path),
        }
    }

    fn request<'a>(commands: &'a [String], auto_close: bool, env: &'a BTreeMap<String, String>) -> ShellRequest<'a> {
        ShellRequest {
            name: "Serve",
            commands,
            auto_close,
            env,
        }
    }

    fn commands() -> Vec<String> {
        vec!["cd app".to_string(), "npm start".to_string()]
    }

    #[test]
    fn test_internal_posix_keep_open() {
        let env = BTreeMap::from([("PORT".to_string(), "3000".to_string())]);
        let cmds = commands();
        let inv = build_internal_invocation(Platform::Linux, "/bin/zsh", &request(&cmds, false, &env));
        assert_eq!(inv.program, "/bin/zsh");
        assert_eq!(inv.args, vec!["-c", "cd app && npm start; exec /bin/zsh"]);
        assert_eq!(inv.env.get("PORT").map(String::as_str), Some("3000"));
        assert_eq!(inv.env.get(ACTION_ENV).map(String::as_str), Some("Serve"));
    }

    #[test]
    fn test_internal_posix_auto_close_traps_interrupt() {
        let env = BTreeMap::new();
        let cmds = commands();
        let inv = build_internal_invocation(Platform::MacOs, "/bin/bash", &request(&cmds, true, &env));
        assert_eq!(inv.args[1], "trap 'exit' INT TERM; cd app && npm start; exit");
    }

    #[test]
    fn test_internal_windows_uses_semicolons() {
        let env = BTreeMap::new();
        let cmds = commands();
        let inv = build_internal_invocation(Platform::Windows, "ignored", &request(&cmds, false, &env));
        assert_eq!(inv.program, "powershell.exe");
        assert_eq!(inv.args, vec!["-NoLogo", "-NoExit", "-Command", "cd app; npm start"]);

        let inv = build_internal_invocation(Platform::Windows, "ignored", &request(&cmds, true, &env));
        assert_eq!(
            inv.args,
            vec!["-NoLogo", "-Command", "try { cd app; npm start } finally { exit }"]
        );
    }

    #[test]
    fn test_windows_cmd_keep_open_and_close() {
        let env = BTreeMap::new();
        let cmds = commands();
        let cmd = profile("Command Prompt", ProfileKind::Cmd, r"C:\Windows\System32\cmd.exe");

        let inv = build_windows_invocation(Some(&cmd), &request(&cmds, false, &env));
        assert_eq!(inv.program, r"C:\Windows\System32\cmd.exe");
        assert_eq!(inv.args, vec!["/k", "cd app && npm start"]);
        assert!(inv.verbatim && inv.new_console);

        let inv = build_windows_invocation(Some(&cmd), &request(&cmds, true, &env));
        assert_eq!(inv.args[0], "/c");
    }

    #[test]
    fn test_windows_powershell_forms() {
        let env = BTreeMap::new();
        let cmds = commands();
        let ps = profile("PowerShell 7", ProfileKind::PowerShell, "pwsh.exe");

        let inv = build_windows_invocation(Some(&ps), &request(&cmds, false, &env));
        assert_eq!(inv.args, vec!["-NoExit", "-Command", "cd app; npm start"]);
        assert!(!inv.verbatim);

        let inv = build_windows_invocation(Some(&ps), &request(&cmds, true, &env));
        assert_eq!(inv.args, vec!["-Command", "cd app; npm start"]);
    }

    #[test]
    fn test_windows_without_profile_uses_cmd() {
        let env = BTreeMap::new();
        let cmds = commands();
        let inv = build_windows_invocation(None, &request(&cmds, false, &env));
        assert_eq!(inv.program, "cmd.exe");
    }

    #[test]
    fn test_elevated_escapes_quotes() {
        let env = BTreeMap::new();
        let cmds = vec![r#"echo "it's done""#.to_string()];
        let ps = profile("PowerShell", ProfileKind::PowerShell, "powershell.exe");
        let inv = build_elevated_invocation(Some(&ps), &request(&cmds, false, &env));

        assert_eq!(inv.program, "powershell.exe");
        assert_eq!(inv.args[..2], ["-NoProfile", "-Command"]);
        assert_eq!(
            inv.args[2],
            "Start-Process -FilePath 'powershell.exe' -ArgumentList '-NoExit -Command `\"echo `\"it''s done`\"`\"' -Verb RunAs"
        );
    }

    #[test]
    fn test_macos_terminal_applescript() {
        let env = BTreeMap::new();
        let cmds = vec![r#"echo "hi" 'there' \n"#.to_string()];
        let inv = build_macos_invocation(None, &request(&cmds, true, &env));
        assert_eq!(inv.program, "osascript");
        assert_eq!(
            inv.args,
            vec![
                "-e",
                "tell application \"Terminal\"",
                "-e",
                r#"do script "echo \"hi\" \'there\' \\n; exit""#,
                "-e",
                "activate",
                "-e",
                "end tell",
            ]
        );
    }

    #[test]
    fn test_macos_iterm() {
        let env = BTreeMap::new();
        let cmds = commands();
        let iterm = profile("iTerm", ProfileKind::ITerm, "/Applications/iTerm.app");
        let inv = build_macos_invocation(Some(&iterm), &request(&cmds, false, &env));
        assert!(inv.args.iter().any(|a| a == "tell application \"iTerm\""));
        assert!(inv
            .args
            .iter()
            .any(|a| a == "tell current session of current window to write text \"cd app && npm start\""));
    }

    #[test]
    fn test_linux_emulator_styles() {
        let env = BTreeMap::new();
        let cmds = commands();
        let req = request(&cmds, false, &env);

        let gnome = profile("GNOME Terminal", ProfileKind::Emulator(EmulatorStyle::DoubleDash), "/usr/bin/gnome-terminal");
        let inv = build_linux_invocation(Some(&gnome), None, &req);
        assert_eq!(inv.program, "/usr/bin/gnome-terminal");
        assert_eq!(inv.args, vec!["--", "bash", "-c", "cd app && npm start; exec bash"]);

        let xterm = profile("XTerm", ProfileKind::Emulator(EmulatorStyle::ExecArgs), "/usr/bin/xterm");
        let inv = build_linux_invocation(Some(&xterm), None, &req);
        assert_eq!(inv.args[..2], ["-e", "bash"]);

        let xfce = profile("Xfce Terminal", ProfileKind::Emulator(EmulatorStyle::ExecString), "/usr/bin/xfce4-terminal");
        let cmds = vec!["echo \"a\" 'b'".to_string()];
        let inv = build_linux_invocation(Some(&xfce), None, &request(&cmds, true, &env));
        assert_eq!(inv.args[0], "-e");
        let split = shlex::split(&inv.args[1]).unwrap();
        assert_eq!(split, vec!["bash", "-c", "echo \"a\" 'b'"]);
    }

    #[test]
    fn test_linux_shell_profile_hosted_in_emulator() {
        let env = BTreeMap::new();
        let cmds = commands();
        let sh = profile("sh", ProfileKind::Posix, "/bin/sh");
        let konsole = profile("Konsole", ProfileKind::Emulator(EmulatorStyle::ExecArgs), "/usr/bin/konsole");
        let inv = build_linux_invocation(Some(&sh), Some(&konsole), &request(&cmds, false, &env));
        assert_eq!(inv.program, "/usr/bin/konsole");
        assert_eq!(inv.args, vec!["-e", "/bin/sh", "-c", "cd app && npm start; exec /bin/sh"]);
    }

    #[test]
    fn test_linux_falls_back_to_shell_kept_open() {
        let env = BTreeMap::new();
        let cmds = commands();
        let inv = build_linux_invocation(None, None, &request(&cmds, true, &env));
        assert_eq!(inv.program, "bash");
        assert_eq!(inv.args, vec!["-c", "cd app && npm start; exec bash"]);
    }
}
