#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is a settings value.
pub(crate) const SETTINGS_COMMANDS: &[(CommandSpec, &str)] = &[
    (
        CommandSpec {
            command: "size",
            action: "set_size",
        },
        "selected_size",
    ),
    (
        CommandSpec {
            command: "model",
            action: "set_model",
        },
        "selected_model",
    ),
];

pub(crate) const RECORD_ID_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "show",
        action: "show_record",
    },
    CommandSpec {
        command: "delete",
        action: "delete_record",
    },
    CommandSpec {
        command: "share",
        action: "share_record",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "surprise",
        action: "surprise",
    },
    CommandSpec {
        command: "history",
        action: "list_history",
    },
    CommandSpec {
        command: "clear",
        action: "clear_history",
    },
    CommandSpec {
        command: "stats",
        action: "stats",
    },
    CommandSpec {
        command: "models",
        action: "list_models",
    },
    CommandSpec {
        command: "settings",
        action: "show_settings",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const DOWNLOAD_COMMAND: CommandSpec = CommandSpec {
    command: "download",
    action: "download_record",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/size",
    "/model",
    "/surprise",
    "/history",
    "/show",
    "/delete",
    "/clear",
    "/download",
    "/share",
    "/stats",
    "/models",
    "/settings",
    "/help",
    "/quit",
];
