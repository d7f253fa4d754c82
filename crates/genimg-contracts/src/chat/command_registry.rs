#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandKind {
    Quit,
    Help,
    Status,
    History,
    Clear,
    Save,
    Aspect,
    Size,
    Model,
    Thinking,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub kind: CommandKind,
}

/// Only recognised when the whole line is the command word.
pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "quit",
        kind: CommandKind::Quit,
    },
    CommandSpec {
        command: "exit",
        kind: CommandKind::Quit,
    },
    CommandSpec {
        command: "q",
        kind: CommandKind::Quit,
    },
    CommandSpec {
        command: "help",
        kind: CommandKind::Help,
    },
    CommandSpec {
        command: "status",
        kind: CommandKind::Status,
    },
    CommandSpec {
        command: "history",
        kind: CommandKind::History,
    },
    CommandSpec {
        command: "clear",
        kind: CommandKind::Clear,
    },
];

pub(crate) const OPTIONAL_ARG_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "save",
    kind: CommandKind::Save,
}];

/// Without an argument these fall through to a plain message.
pub(crate) const REQUIRED_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "aspect",
        kind: CommandKind::Aspect,
    },
    CommandSpec {
        command: "size",
        kind: CommandKind::Size,
    },
    CommandSpec {
        command: "model",
        kind: CommandKind::Model,
    },
    CommandSpec {
        command: "thinking",
        kind: CommandKind::Thinking,
    },
];

pub const CHAT_HELP: &str = "\
Commands:
  save [filename]     Save current image (optional filename)
  aspect <ratio>      Set aspect ratio (1:1, 16:9, 9:16, etc.)
  size <1K|2K|4K>     Set image size (pro model only)
  model <flash|pro>   Switch model
  thinking on|off     Toggle thinking mode (pro only)
  status              Show current settings
  history             Show conversation history
  clear               Start fresh conversation
  help                Show this help
  quit|exit           Exit chat

Changing aspect, size, model or thinking restarts the conversation.";
