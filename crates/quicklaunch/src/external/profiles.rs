//! Terminal profiles available on this machine.
//!
//! Profiles are discovered once per process by probing `PATH` and a few
//! well-known install locations.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::shell::ShellFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Family of the shell the internal terminal runs.
    pub fn host_shell_family(self) -> ShellFamily {
        match self {
            Platform::Windows => ShellFamily::PowerShell,
            Platform::MacOs | Platform::Linux => ShellFamily::Posix,
        }
    }
}

/// How a Linux terminal emulator takes the command it should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorStyle {
    /// `gnome-terminal -- bash -c <script>`
    DoubleDash,
    /// `xterm -e bash -c <script>`
    ExecArgs,
    /// `xfce4-terminal -e "bash -c '<script>'"`, a single string re-split by the emulator
    ExecString,
    /// `kitty bash -c <script>`
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    Cmd,
    PowerShell,
    Posix,
    MacTerminal,
    ITerm,
    Emulator(EmulatorStyle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalProfile {
    pub name: String,
    pub kind: ProfileKind,
    pub path: PathBuf,
}

impl TerminalProfile {
    fn new(name: &str, kind: ProfileKind, path: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            kind,
            path,
        }
    }

    pub fn family(&self) -> ShellFamily {
        match self.kind {
            ProfileKind::Cmd => ShellFamily::Cmd,
            ProfileKind::PowerShell => ShellFamily::PowerShell,
            ProfileKind::Posix
            | ProfileKind::MacTerminal
            | ProfileKind::ITerm
            | ProfileKind::Emulator(_) => ShellFamily::Posix,
        }
    }

    pub fn program(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Filesystem lookups used while discovering profiles.
pub trait Probe {
    fn which(&self, binary: &str) -> Option<PathBuf>;
    fn exists(&self, path: &Path) -> bool;
}

pub struct SystemProbe;

impl Probe for SystemProbe {
    fn which(&self, binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

const LINUX_EMULATORS: &[(&str, &str, EmulatorStyle)] = &[
    ("GNOME Terminal", "gnome-terminal", EmulatorStyle::DoubleDash),
    ("Konsole", "konsole", EmulatorStyle::ExecArgs),
    ("Xfce Terminal", "xfce4-terminal", EmulatorStyle::ExecString),
    ("MATE Terminal", "mate-terminal", EmulatorStyle::ExecString),
    ("Terminator", "terminator", EmulatorStyle::ExecString),
    ("Alacritty", "alacritty", EmulatorStyle::ExecArgs),
    ("kitty", "kitty", EmulatorStyle::Direct),
    ("foot", "foot", EmulatorStyle::Direct),
    ("XTerm", "xterm", EmulatorStyle::ExecArgs),
    ("Default Terminal", "x-terminal-emulator", EmulatorStyle::ExecArgs),
];

/// First hit wins: `PATH` lookup, then the listed install paths.
fn probe_profile(
    probe: &dyn Probe,
    name: &str,
    kind: ProfileKind,
    binary: &str,
    fallbacks: &[&str],
) -> Option<TerminalProfile> {
    let path = probe.which(binary).or_else(|| {
        fallbacks
            .iter()
            .map(PathBuf::from)
            .find(|p| probe.exists(p))
    })?;
    Some(TerminalProfile::new(name, kind, path))
}

/// Discover the profiles of `platform` through `probe`.
pub fn enumerate_profiles(platform: Platform, probe: &dyn Probe) -> Vec<TerminalProfile> {
    let mut profiles = Vec::new();

    match platform {
        Platform::Windows => {
            profiles.extend(probe_profile(
                probe,
                "Command Prompt",
                ProfileKind::Cmd,
                "cmd.exe",
                &[r"C:\Windows\System32\cmd.exe"],
            ));
            profiles.extend(probe_profile(
                probe,
                "PowerShell",
                ProfileKind::PowerShell,
                "powershell.exe",
                &[r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe"],
            ));
            profiles.extend(probe_profile(
                probe,
                "PowerShell 7",
                ProfileKind::PowerShell,
                "pwsh.exe",
                &[r"C:\Program Files\PowerShell\7\pwsh.exe"],
            ));
            profiles.extend(probe_profile(
                probe,
                "Git Bash",
                ProfileKind::Posix,
                "bash.exe",
                &[r"C:\Program Files\Git\bin\bash.exe"],
            ));
            profiles.extend(probe_profile(
                probe,
                "WSL",
                ProfileKind::Posix,
                "wsl.exe",
                &[r"C:\Windows\System32\wsl.exe"],
            ));
        }
        Platform::MacOs => {
            for (name, kind, app) in [
                ("Terminal", ProfileKind::MacTerminal, "/System/Applications/Utilities/Terminal.app"),
                ("Terminal", ProfileKind::MacTerminal, "/Applications/Utilities/Terminal.app"),
                ("iTerm", ProfileKind::ITerm, "/Applications/iTerm.app"),
            ] {
                let path = PathBuf::from(app);
                if probe.exists(&path) && !profiles.iter().any(|p: &TerminalProfile| p.name == name) {
                    profiles.push(TerminalProfile::new(name, kind, path));
                }
            }
            profiles.extend(probe_profile(probe, "zsh", ProfileKind::Posix, "zsh", &["/bin/zsh"]));
            profiles.extend(probe_profile(probe, "bash", ProfileKind::Posix, "bash", &["/bin/bash"]));
            profiles.extend(probe_profile(
                probe,
                "PowerShell 7",
                ProfileKind::PowerShell,
                "pwsh",
                &["/usr/local/bin/pwsh"],
            ));
        }
        Platform::Linux => {
            for (name, binary, style) in LINUX_EMULATORS {
                profiles.extend(probe_profile(probe, name, ProfileKind::Emulator(*style), binary, &[]));
            }
            profiles.extend(probe_profile(probe, "bash", ProfileKind::Posix, "bash", &["/bin/bash"]));
            profiles.extend(probe_profile(probe, "sh", ProfileKind::Posix, "sh", &["/bin/sh"]));
            profiles.extend(probe_profile(probe, "PowerShell 7", ProfileKind::PowerShell, "pwsh", &[]));
        }
    }

    profiles
}

static PROFILES: OnceLock<Vec<TerminalProfile>> = OnceLock::new();

/// Profiles of the current machine, probed on first use.
pub fn available_profiles() -> &'static [TerminalProfile] {
    PROFILES.get_or_init(|| {
        let profiles = enumerate_profiles(Platform::current(), &SystemProbe);
        tracing::info!(
            "Detected terminal profiles: {:?}",
            profiles.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
        );
        profiles
    })
}

/// Platform default used when an action names no profile.
pub fn default_profile(profiles: &[TerminalProfile], platform: Platform) -> Option<&TerminalProfile> {
    let preferred = match platform {
        Platform::Windows => profiles.iter().find(|p| p.name == "PowerShell"),
        Platform::MacOs => profiles.iter().find(|p| p.kind == ProfileKind::MacTerminal),
        Platform::Linux => profiles
            .iter()
            .find(|p| matches!(p.kind, ProfileKind::Emulator(_))),
    };
    preferred.or_else(|| profiles.first())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileResolution {
    pub profile: Option<TerminalProfile>,
    /// Set when the requested profile was missing and a default was used.
    pub missing: Option<String>,
}

/// Resolve `requested` (then the configured default, then the platform
/// default) by case-insensitive name.
pub fn resolve_profile(
    profiles: &[TerminalProfile],
    requested: Option<&str>,
    configured_default: Option<&str>,
    platform: Platform,
) -> ProfileResolution {
    let by_name = |name: &str| {
        profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
    };

    if let Some(name) = requested {
        if let Some(profile) = by_name(name) {
            return ProfileResolution {
                profile: Some(profile),
                missing: None,
            };
        }
    }

    let fallback = configured_default
        .and_then(by_name)
        .or_else(|| default_profile(profiles, platform).cloned());

    ProfileResolution {
        profile: fallback,
        missing: requested.map(str::to_string),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;

    use super::*;

    /// Probe backed by fixed sets of binaries and paths.
    pub(crate) struct FakeProbe {
        pub binaries: HashSet<String>,
        pub paths: HashSet<PathBuf>,
    }

    impl FakeProbe {
        pub(crate) fn new(binaries: &[&str], paths: &[&str]) -> Self {
            Self {
                binaries: binaries.iter().map(|b| b.to_string()).collect(),
                paths: paths.iter().map(PathBuf::from).collect(),
            }
        }
    }

    impl Probe for FakeProbe {
        fn which(&self, binary: &str) -> Option<PathBuf> {
            self.binaries
                .contains(binary)
                .then(|| PathBuf::from(format!("/usr/bin/{}", binary)))
        }

        fn exists(&self, path: &Path) -> bool {
            self.paths.contains(path)
        }
    }

    #[test]
    fn test_windows_probes_install_paths() {
        let probe = FakeProbe::new(
            &["cmd.exe", "powershell.exe"],
            &[r"C:\Program Files\PowerShell\7\pwsh.exe"],
        );
        let profiles = enumerate_profiles(Platform::Windows, &probe);
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Command Prompt", "PowerShell", "PowerShell 7"]);
        assert_eq!(profiles[2].path, PathBuf::from(r"C:\Program Files\PowerShell\7\pwsh.exe"));
        assert_eq!(profiles[0].family(), ShellFamily::Cmd);
    }

    #[test]
    fn test_macos_terminal_app_detected_once() {
        let probe = FakeProbe::new(
            &["zsh"],
            &[
                "/System/Applications/Utilities/Terminal.app",
                "/Applications/Utilities/Terminal.app",
            ],
        );
        let profiles = enumerate_profiles(Platform::MacOs, &probe);
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Terminal", "zsh"]);
    }

    #[test]
    fn test_linux_emulators_in_preference_order() {
        let probe = FakeProbe::new(&["xterm", "konsole", "bash"], &[]);
        let profiles = enumerate_profiles(Platform::Linux, &probe);
        let names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Konsole", "XTerm", "bash"]);
        assert_eq!(
            default_profile(&profiles, Platform::Linux).map(|p| p.name.as_str()),
            Some("Konsole")
        );
    }

    #[test]
    fn test_resolve_requested_case_insensitive() {
        let probe = FakeProbe::new(&["cmd.exe", "powershell.exe"], &[]);
        let profiles = enumerate_profiles(Platform::Windows, &probe);
        let resolved = resolve_profile(&profiles, Some("command prompt"), None, Platform::Windows);
        assert_eq!(resolved.profile.unwrap().kind, ProfileKind::Cmd);
        assert!(resolved.missing.is_none());
    }

    #[test]
    fn test_resolve_missing_falls_back_to_default() {
        let probe = FakeProbe::new(&["cmd.exe", "powershell.exe"], &[]);
        let profiles = enumerate_profiles(Platform::Windows, &probe);

        let resolved = resolve_profile(&profiles, Some("PowerShell 7"), None, Platform::Windows);
        assert_eq!(resolved.profile.unwrap().name, "PowerShell");
        assert_eq!(resolved.missing.as_deref(), Some("PowerShell 7"));

        let resolved = resolve_profile(&profiles, Some("Nope"), Some("Command Prompt"), Platform::Windows);
        assert_eq!(resolved.profile.unwrap().name, "Command Prompt");
    }

    #[test]
    fn test_resolve_with_nothing_available() {
        let resolved = resolve_profile(&[], None, None, Platform::Linux);
        assert!(resolved.profile.is_none());
        assert!(resolved.missing.is_none());
    }
}
