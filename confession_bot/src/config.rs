use std::fs;

use teloxide::types::ChatId;

use crate::filter::ContentFilter;

const DEFAULT_DATABASE_PATH: &str = "confessions.sqlite";
const DEFAULT_WEEKLY_LIMIT: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no bot token: set BOT_TOKEN or put it into the {0} file")]
    NoToken(&'static str),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{key} is not a valid {kind}: {value:?}")]
    Invalid {
        key: &'static str,
        kind: &'static str,
        value: String,
    },
    #[error("could not read banned words file {path}: {source}")]
    WordsFile {
        path: String,
        source: std::io::Error,
    },
    #[error("banned words file {path} has a bad term: {source}")]
    WordsFileTerm {
        path: String,
        source: regex::Error,
    },
}

/// Everything the bot is configured with, loaded once at startup.
pub struct Config {
    pub bot_token: String,
    /// Private group where moderators review submissions.
    pub admin_chat: ChatId,
    /// Channel approved submissions are posted to.
    pub channel: ChatId,
    pub database_path: String,
    /// Accepted submissions allowed per submitter in one quota window.
    pub weekly_limit: u32,
    pub filter: ContentFilter,
}

impl Config {
    /// Load the config from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Self::from_lookup`].
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the config with `lookup` standing in for the environment.
    ///
    /// The bot token is taken from `BOT_TOKEN`, or otherwise from the `key`
    /// file in the working directory (`key_debug` in debug builds).
    ///
    /// # Errors
    ///
    /// Errors if a required value is missing or doesn't parse, or if the
    /// banned words file can't be read.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let key_file = match cfg!(debug_assertions) {
            true => "key_debug",
            false => "key",
        };

        let bot_token = lookup("BOT_TOKEN")
            .or_else(|| fs::read_to_string(key_file).ok())
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::NoToken(key_file))?;

        let admin_chat = ChatId(parse_required(&lookup, "ADMIN_GROUP_ID", "chat ID")?);
        let channel = ChatId(parse_required(&lookup, "CHANNEL_ID", "chat ID")?);

        let database_path =
            lookup("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        let weekly_limit = match lookup("WEEKLY_LIMIT") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "WEEKLY_LIMIT",
                        kind: "positive number",
                        value,
                    })
                }
            },
            None => DEFAULT_WEEKLY_LIMIT,
        };

        let filter = match lookup("BANNED_WORDS_FILE") {
            Some(path) => {
                let list = match fs::read_to_string(&path) {
                    Ok(list) => list,
                    Err(source) => return Err(ConfigError::WordsFile { path, source }),
                };
                match ContentFilter::from_list(&list) {
                    Ok(filter) => filter,
                    Err(source) => return Err(ConfigError::WordsFileTerm { path, source }),
                }
            }
            None => ContentFilter::default_list(),
        };

        Ok(Config {
            bot_token,
            admin_chat,
            channel,
            database_path,
            weekly_limit,
            filter,
        })
    }
}

fn parse_required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    kind: &'static str,
) -> Result<i64, ConfigError> {
    let value = lookup(key).ok_or(ConfigError::Missing(key))?;
    value.trim().parse().map_err(|_| ConfigError::Invalid { key, kind, value })
}
