//! Shell-family specific command joining and lifecycle wrapping.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFamily {
    /// sh, bash, zsh, Git Bash, WSL
    Posix,
    /// Windows PowerShell and PowerShell 7
    PowerShell,
    /// cmd.exe
    Cmd,
}

impl ShellFamily {
    /// Separator that runs commands one after another.
    ///
    /// PowerShell 5 has no `&&`, so it gets the plain statement separator.
    pub fn separator(self) -> &'static str {
        match self {
            ShellFamily::Posix | ShellFamily::Cmd => " && ",
            ShellFamily::PowerShell => "; ",
        }
    }
}

pub fn join_commands<S: AsRef<str>>(commands: &[S], family: ShellFamily) -> String {
    commands
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(family.separator())
}

/// Make the shell exit once `script` is done, including after Ctrl+C.
pub fn wrap_auto_close(script: &str, family: ShellFamily) -> String {
    match family {
        ShellFamily::Posix => format!("trap 'exit' INT TERM; {}; exit", script),
        ShellFamily::PowerShell => format!("try {{ {} }} finally {{ exit }}", script),
        ShellFamily::Cmd => format!("{} & exit", script),
    }
}

/// Leave an interactive shell behind after `script`.
///
/// Only POSIX shells need this spelled out in the script; PowerShell and cmd
/// keep the session through `-NoExit` and `/k`.
pub fn keep_open(script: &str, family: ShellFamily, shell: &str) -> String {
    match family {
        ShellFamily::Posix => format!("{}; exec {}", script, shell),
        ShellFamily::PowerShell | ShellFamily::Cmd => script.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_posix_and_powershell() {
        let cmds = ["cd app", "npm start"];
        assert_eq!(join_commands(&cmds, ShellFamily::Posix), "cd app && npm start");
        assert_eq!(join_commands(&cmds, ShellFamily::PowerShell), "cd app; npm start");
        assert_eq!(join_commands(&cmds, ShellFamily::Cmd), "cd app && npm start");
    }

    #[test]
    fn test_join_skips_blank_commands() {
        let cmds = ["ls", "  ", ""];
        assert_eq!(join_commands(&cmds, ShellFamily::Posix), "ls");
    }

    #[test]
    fn test_auto_close_wrapping() {
        assert_eq!(
            wrap_auto_close("make", ShellFamily::Posix),
            "trap 'exit' INT TERM; make; exit"
        );
        assert_eq!(
            wrap_auto_close("make", ShellFamily::PowerShell),
            "try { make } finally { exit }"
        );
        assert_eq!(wrap_auto_close("make", ShellFamily::Cmd), "make & exit");
    }

    #[test]
    fn test_keep_open() {
        assert_eq!(keep_open("make", ShellFamily::Posix, "bash"), "make; exec bash");
        assert_eq!(keep_open("make", ShellFamily::PowerShell, "pwsh"), "make");
    }
}
