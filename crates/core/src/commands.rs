//! # Slash Commands
//!
//! Users drive DonkeyOps by writing a line such as `/donkeyops label Core` in a
//! comment. The first line starting with `/donkeyops` is the command; every
//! other line of the comment is ignored.

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;

/// Token that starts a command line.
pub const COMMAND_PREFIX: &str = "/donkeyops";

/// A command line split into its name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// Finds and splits the command line in a comment or issue body.
///
/// Returns `None` when no line starts with `/donkeyops`, or when the first such
/// line has nothing after the prefix. The command name keeps its casing.
///
/// # Examples
///
/// ```
/// use donkeyops_core::commands::parse_slash_command;
///
/// let command = parse_slash_command("Thanks!\n/donkeyops label Core").unwrap();
/// assert_eq!(command.name, "label");
/// assert_eq!(command.args, vec!["Core".to_string()]);
///
/// assert!(parse_slash_command("/donkeyops").is_none());
/// ```
pub fn parse_slash_command(body: &str) -> Option<SlashCommand> {
    if body.trim().is_empty() {
        return None;
    }

    let line = body
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with(COMMAND_PREFIX))?;

    let mut tokens = line.split_whitespace().skip(1);
    let name = tokens.next()?.to_string();
    let args = tokens.map(|t| t.to_string()).collect();

    Some(SlashCommand { name, args })
}

/// The commands DonkeyOps understands.
///
/// Arguments that a command needs but did not get are kept as `None` so the
/// dispatcher can answer with usage help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Approve,
    Ask { question: Option<String> },
    Assign { user: Option<String> },
    Close,
    Label { label: Option<String> },
    Review,
    Summary,
    Unassign { user: Option<String> },
    Unlabel { label: Option<String> },

    /// Any name DonkeyOps does not know.
    Unknown { name: String },
}

impl Command {
    /// The command name as users type it.
    pub fn name(&self) -> &str {
        match self {
            Command::Approve => "approve",
            Command::Ask { .. } => "ask",
            Command::Assign { .. } => "assign",
            Command::Close => "close",
            Command::Label { .. } => "label",
            Command::Review => "review",
            Command::Summary => "summary",
            Command::Unassign { .. } => "unassign",
            Command::Unlabel { .. } => "unlabel",
            Command::Unknown { name } => name,
        }
    }
}

impl From<SlashCommand> for Command {
    fn from(command: SlashCommand) -> Self {
        let first = command.args.first().cloned();
        let user = first
            .as_deref()
            .map(|u| u.strip_prefix('@').unwrap_or(u).to_string())
            .filter(|u| !u.is_empty());

        match command.name.as_str() {
            "approve" => Command::Approve,
            "ask" => Command::Ask {
                question: if command.args.is_empty() {
                    None
                } else {
                    Some(command.args.join(" "))
                },
            },
            "assign" => Command::Assign { user },
            "close" => Command::Close,
            "label" => Command::Label { label: first },
            "review" => Command::Review,
            "summary" => Command::Summary,
            "unassign" => Command::Unassign { user },
            "unlabel" => Command::Unlabel { label: first },
            _ => Command::Unknown { name: command.name },
        }
    }
}
