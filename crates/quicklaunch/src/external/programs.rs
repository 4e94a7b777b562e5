use utils::shell::quote_if_whitespace;

use crate::state::ProgramEntry;

use super::profiles::Platform;
use super::terminal_spawn::Invocation;

/// Command line for one program entry: the path (quoted only when it holds
/// whitespace) followed by the user's args verbatim.
pub fn program_command_line(entry: &ProgramEntry) -> String {
    let path = quote_if_whitespace(entry.path.trim());
    match entry.args.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        Some(args) => format!("{} {}", path, args),
        None => path.into_owned(),
    }
}

/// Launch the program through the platform shell so the args keep the
/// tokenization the user wrote.
pub fn build_program_invocation(platform: Platform, entry: &ProgramEntry) -> Invocation {
    let line = program_command_line(entry);
    match platform {
        Platform::Windows => Invocation::new("cmd").arg("/C").arg(line).verbatim(),
        Platform::MacOs | Platform::Linux => Invocation::new("sh").arg("-c").arg(line),
    }
}
