//! Boilerplate shared by Telegram bots in this workspace: logger and runtime
//! setup, retrying requests, and a few extension methods over teloxide types.

use std::future::Future;

pub mod useful_methods;

#[doc(hidden)]
pub mod __private {
    pub use log;
    pub use teloxide::RequestError;
    pub use tokio::time::sleep;
}

/// How many times [`teloxide_retry`] attempts a request before giving up.
pub const RETRY_ATTEMPTS: u8 = 3;

/// Initialize logging and run `closure` to completion in a multithreaded
/// async runtime.
///
/// Logging goes through [pretty_env_logger][], on level `info` unless
/// overridden by the environment variable `RUST_LOG`. Timestamps are left out
/// when running as a systemd service, because the journal adds its own.
///
/// # Panics
///
/// Panics if the async runtime fails to start.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(closure: impl Future<Output = ()>) {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("info"));

    let mut builder = if std::env::var_os("JOURNAL_STREAM").is_some() {
        pretty_env_logger::formatted_builder()
    } else {
        pretty_env_logger::formatted_timed_builder()
    };

    builder.parse_filters(&filters);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::info!("Logger is up, starting the runtime.");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to start the async runtime!")
        .block_on(closure);
}

/// Evaluate a teloxide request expression (ending in `.await`) and retry it
/// up to [`RETRY_ATTEMPTS`] times if Telegram asks to wait or the network
/// hiccups. Any other result is returned as is.
///
/// The expression is evaluated anew for every attempt, so it should build the
/// request from scratch, i.e. `teloxide_retry!(bot.send_message(chat, &text).await)`.
#[macro_export]
macro_rules! teloxide_retry {
    ($request:expr) => {{
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match $request {
                Err($crate::__private::RequestError::RetryAfter(wait))
                    if attempt < $crate::RETRY_ATTEMPTS =>
                {
                    $crate::__private::log::debug!("Flood wait of {:?}, retrying...", wait.duration());
                    $crate::__private::sleep(wait.duration()).await;
                }
                Err($crate::__private::RequestError::Network(e))
                    if attempt < $crate::RETRY_ATTEMPTS =>
                {
                    $crate::__private::log::debug!("Network error, retrying: {e}");
                    $crate::__private::sleep(::std::time::Duration::from_secs(1)).await;
                }
                result => break result,
            }
        }
    }};
}
