use std::path::Path;

use projtree_core::event::Command;

/// What a line of user input asks for.
#[derive(Debug)]
pub enum InputAction {
    /// Dispatch a core Command.
    Command(Command),
    /// Cancel the file operation in flight.
    Cancel,
    /// Print the usage summary.
    Help,
    /// Stop reading input and shut down.
    Quit,
    /// Blank line.
    Nothing,
}

pub const HELP: &str = "\
commands:
  select <path>   target a node (relative paths start at projects/)
  cut | copy      put the selection on the clipboard
  paste           paste into the selected folder
  delete          delete the selection
  rename <name>   rename the selection
  cancel          stop the running operation
  help | quit";

/// Parses one input line. Relative `select` paths are joined onto `projects`.
pub fn parse_line(line: &str, projects: &Path) -> Result<InputAction, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let action = match (word, rest) {
        ("", _) => InputAction::Nothing,
        ("select" | "s", "") => return Err("select needs a path".to_string()),
        ("select" | "s", path) => InputAction::Command(Command::Select(projects.join(path))),
        ("rename" | "mv", "") => return Err("rename needs a new name".to_string()),
        ("rename" | "mv", name) => InputAction::Command(Command::Rename(name.to_string())),
        ("cut" | "x", "") => InputAction::Command(Command::Cut),
        ("copy" | "c", "") => InputAction::Command(Command::Copy),
        ("paste" | "p", "") => InputAction::Command(Command::Paste),
        ("delete" | "rm", "") => InputAction::Command(Command::Delete),
        ("cancel", "") => InputAction::Cancel,
        ("help" | "?", "") => InputAction::Help,
        ("quit" | "q" | "exit", "") => InputAction::Quit,
        (word, "") => return Err(format!("unknown command: {word}")),
        (word, _) => return Err(format!("{word} takes no arguments")),
    };
    Ok(action)
}
