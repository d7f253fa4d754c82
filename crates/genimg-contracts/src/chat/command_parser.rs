use super::command_registry::{
    CommandKind, CommandSpec, NO_ARG_COMMANDS, OPTIONAL_ARG_COMMANDS, REQUIRED_ARG_COMMANDS,
};

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Noop,
    Quit,
    Help,
    Status,
    History,
    Clear,
    Save(Option<String>),
    Aspect(String),
    /// Upper-cased resolution tier.
    Size(String),
    /// Lower-cased model tier.
    Model(String),
    Thinking(bool),
    Message(String),
}

fn find_kind(command: &str, specs: &[CommandSpec]) -> Option<CommandKind> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.kind)
}

fn parse_file_arg(arg: &str) -> Option<String> {
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return None;
    }
    let joined = match shell_words::split(trimmed) {
        Ok(parts) => parts.join(" "),
        Err(_) => trimmed.to_string(),
    };
    Some(joined).filter(|value| !value.trim().is_empty())
}

fn command_for(kind: CommandKind, arg: &str) -> ChatCommand {
    match kind {
        CommandKind::Quit => ChatCommand::Quit,
        CommandKind::Help => ChatCommand::Help,
        CommandKind::Status => ChatCommand::Status,
        CommandKind::History => ChatCommand::History,
        CommandKind::Clear => ChatCommand::Clear,
        CommandKind::Save => ChatCommand::Save(parse_file_arg(arg)),
        CommandKind::Aspect => ChatCommand::Aspect(arg.to_string()),
        CommandKind::Size => ChatCommand::Size(arg.to_ascii_uppercase()),
        CommandKind::Model => ChatCommand::Model(arg.to_ascii_lowercase()),
        CommandKind::Thinking => ChatCommand::Thinking(arg.eq_ignore_ascii_case("on")),
    }
}

pub fn parse_command(text: &str) -> ChatCommand {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ChatCommand::Noop;
    }

    let lowered = trimmed.to_ascii_lowercase();
    if let Some(kind) = find_kind(&lowered, NO_ARG_COMMANDS) {
        return command_for(kind, "");
    }

    let (head, tail) = match trimmed.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (trimmed, ""),
    };
    let head = head.to_ascii_lowercase();

    if let Some(kind) = find_kind(&head, OPTIONAL_ARG_COMMANDS) {
        return command_for(kind, tail);
    }

    if !tail.is_empty() {
        if let Some(kind) = find_kind(&head, REQUIRED_ARG_COMMANDS) {
            return command_for(kind, tail);
        }
    }

    ChatCommand::Message(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{parse_command, ChatCommand};
    use crate::chat::command_registry::{
        CommandKind, NO_ARG_COMMANDS, OPTIONAL_ARG_COMMANDS, REQUIRED_ARG_COMMANDS,
    };

    #[test]
    fn blank_lines_are_noops() {
        assert_eq!(parse_command("   \n"), ChatCommand::Noop);
    }

    #[test]
    fn quit_aliases_are_case_insensitive() {
        for line in ["quit", "EXIT", " q "] {
            assert_eq!(parse_command(line), ChatCommand::Quit);
        }
    }

    #[test]
    fn save_with_and_without_filename() {
        assert_eq!(parse_command("save"), ChatCommand::Save(None));
        assert_eq!(
            parse_command("save coffee_shop.png"),
            ChatCommand::Save(Some("coffee_shop.png".to_string()))
        );
        assert_eq!(
            parse_command("save \"my shop.png\""),
            ChatCommand::Save(Some("my shop.png".to_string()))
        );
    }

    #[test]
    fn setting_commands_normalise_their_argument() {
        assert_eq!(parse_command("aspect 16:9"), ChatCommand::Aspect("16:9".to_string()));
        assert_eq!(parse_command("size 2k"), ChatCommand::Size("2K".to_string()));
        assert_eq!(parse_command("Model PRO"), ChatCommand::Model("pro".to_string()));
        assert_eq!(parse_command("thinking on"), ChatCommand::Thinking(true));
        assert_eq!(parse_command("thinking off"), ChatCommand::Thinking(false));
    }

    #[test]
    fn bare_setting_words_are_messages() {
        assert_eq!(
            parse_command("aspect"),
            ChatCommand::Message("aspect".to_string())
        );
        assert_eq!(
            parse_command("saved the best for last"),
            ChatCommand::Message("saved the best for last".to_string())
        );
    }

    #[test]
    fn free_text_is_a_message() {
        assert_eq!(
            parse_command("  Add warm morning light  "),
            ChatCommand::Message("Add warm morning light".to_string())
        );
    }

    #[test]
    fn every_registered_word_maps_to_its_own_command() {
        let expected = |kind: CommandKind| match kind {
            CommandKind::Quit => ChatCommand::Quit,
            CommandKind::Help => ChatCommand::Help,
            CommandKind::Status => ChatCommand::Status,
            CommandKind::History => ChatCommand::History,
            CommandKind::Clear => ChatCommand::Clear,
            CommandKind::Save => ChatCommand::Save(Some("on".to_string())),
            CommandKind::Aspect => ChatCommand::Aspect("on".to_string()),
            CommandKind::Size => ChatCommand::Size("ON".to_string()),
            CommandKind::Model => ChatCommand::Model("on".to_string()),
            CommandKind::Thinking => ChatCommand::Thinking(true),
        };
        for spec in NO_ARG_COMMANDS {
            assert_eq!(parse_command(spec.command), expected(spec.kind), "{}", spec.command);
        }
        for spec in OPTIONAL_ARG_COMMANDS.iter().chain(REQUIRED_ARG_COMMANDS) {
            let line = format!("{} on", spec.command);
            assert_eq!(parse_command(&line), expected(spec.kind), "{line}");
        }
        assert_eq!(parse_command("clear"), ChatCommand::Clear);
        assert_eq!(parse_command("thinking maybe"), ChatCommand::Thinking(false));
    }
}
