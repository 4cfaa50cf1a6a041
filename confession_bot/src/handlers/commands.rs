use teloxide::types::{BotCommand, Me};

pub const COMMANDS: &[Command] = &[START, HELP, RULES, PENDING];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Help,
    Rules,
    /// Moderators only, in the admin chat.
    Pending,
}

pub struct Command {
    pub callname: &'static str,
    pub description: &'static str,
    pub kind: CommandKind,
    /// Not shown in the command list or the help message.
    hidden: bool,
}

impl Command {
    pub fn is_matching_callname(&self, command: &str) -> bool {
        self.callname.eq_ignore_ascii_case(command)
    }

    /// Find the command this message text starts with, if it's one of ours.
    ///
    /// `/rules@Some_Bot` only matches if `Some_Bot` is this bot.
    pub fn parse(text: &str, me: &Me) -> Option<&'static Command> {
        let command = text.split_whitespace().next()?;

        // Commands shouldn't have an "@" in their callnames.
        let callname = if let Some(username_start) = command.find('@') {
            // Bot names are guaranteed ASCII, so ignore ASCII case specifically.
            if !command[username_start + '@'.len_utf8()..].eq_ignore_ascii_case(me.username()) {
                return None;
            }
            &command[..username_start]
        } else {
            command
        };

        COMMANDS
            .iter()
            .find(|command| command.is_matching_callname(callname))
    }

    pub fn generate_help() -> String {
        let mut response = String::from("❓ <b>Help</b>\n\n");
        for command in COMMANDS.iter().filter(|x| !x.hidden) {
            response.push_str(command.callname);
            response.push_str(" - ");
            response.push_str(command.description);
            response.push('\n');
        }
        response.push_str(concat!(
            "\nAnything else you send me, text or a photo with an optional caption, ",
            "is a confession. It will be reviewed by the moderators before it's posted."
        ));
        response
    }

    pub fn generate_bot_commands() -> Vec<BotCommand> {
        COMMANDS
            .iter()
            .filter(|command| !command.hidden)
            .map(|command| BotCommand {
                // Cut off the /
                command: command.callname[1..].to_string(),
                description: command.description.to_string(),
            })
            .collect()
    }
}

const START: Command = Command {
    callname: "/start",
    description: "What this bot is about.",
    kind: CommandKind::Start,
    hidden: false,
};

const HELP: Command = Command {
    callname: "/help",
    description: "This help message.",
    kind: CommandKind::Help,
    hidden: false,
};

const RULES: Command = Command {
    callname: "/rules",
    description: "What you can and can't post, and what happens if you do.",
    kind: CommandKind::Rules,
    hidden: false,
};

const PENDING: Command = Command {
    callname: "/pending",
    description: "Amount of confessions waiting for review.",
    kind: CommandKind::Pending,
    hidden: true,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_commands_skip_hidden_ones() {
        let commands = Command::generate_bot_commands();
        let names: Vec<&str> = commands.iter().map(|x| x.command.as_str()).collect();
        assert_eq!(names, ["start", "help", "rules"]);

        let help = Command::generate_help();
        assert!(help.contains("/rules - "));
        assert!(!help.contains("/pending"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(RULES.is_matching_callname("/Rules"));
        assert!(!RULES.is_matching_callname("/rule"));
    }
}
