use std::str::FromStr;

use crate::config::SAMPLE_QUESTIONS;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Clear the conversation history
    Clear,
    /// Put a sample question into the input
    Sample,
    /// Re-check the Snowflake connection
    Status,
    /// Show help
    Help,
    /// Exit the application
    Quit,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Zero-based sample index for `/sample <n>`, where n counts from 1
    pub fn sample_index(&self) -> Option<usize> {
        if self.command != SlashCommand::Sample {
            return None;
        }

        let number: usize = self.argument()?.trim().parse().ok()?;
        (1..=SAMPLE_QUESTIONS.len())
            .contains(&number)
            .then(|| number - 1)
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Clear => "clear the conversation",
            SlashCommand::Sample => "use a sample question (1-5)",
            SlashCommand::Status => "re-check the Snowflake connection",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim_start().strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let head = parts.next()?.to_lowercase();
    let remainder: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "q" | "exit" | "bye" => Some(SlashCommand::Quit),
        "cls" | "reset" => Some(SlashCommand::Clear),
        "s" => Some(SlashCommand::Sample),
        "h" | "?" => Some(SlashCommand::Help),
        _ => None,
    })?;

    let argument = if remainder.is_empty() {
        None
    } else {
        Some(remainder.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// One-line help for the footer
pub fn get_help_text() -> String {
    let commands: Vec<String> = SlashCommand::iter()
        .map(|command| format!("/{}", command.command()))
        .collect();

    format!(
        "Enter send · Tab samples · PgUp/PgDn scroll · Ctrl+L clear · Esc quit · {}",
        commands.join(" ")
    )
}
