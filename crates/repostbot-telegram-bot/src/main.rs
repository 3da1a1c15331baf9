use dotenvy::dotenv;
use regex::Regex;
use repostbot_core::config::RepostSettings;
use repostbot_transport_telegram::config::{BotSettings, TelegramSettings};
use repostbot_transport_telegram::runner::run_bot;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str =
    "repostbot_core=info,repostbot_transport_telegram=info,teloxide=warn,hyper=warn,h2=error,aws_config=warn,aws_smithy_runtime=warn";

/// Secrets masked out of every log line
struct RedactionPatterns {
    rules: Vec<(Regex, &'static str)>,
}

impl RedactionPatterns {
    /// # Errors
    ///
    /// Returns an error if any pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        let rules = [
            (r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)", "$1[TELEGRAM_TOKEN]$3"),
            (r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+", "$1[TELEGRAM_TOKEN]"),
            (r"([0-9]{8,10}:[A-Za-z0-9_-]{35})", "[TELEGRAM_TOKEN]"),
            (r"R2_ACCESS_KEY_ID=[^\s&]+", "R2_ACCESS_KEY_ID=[MASKED]"),
            (r"R2_SECRET_ACCESS_KEY=[^\s&]+", "R2_SECRET_ACCESS_KEY=[MASKED]"),
        ];
        let rules = rules
            .into_iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, replacement)))
            .collect::<Result<_, regex::Error>>()?;
        Ok(Self { rules })
    }

    fn redact(&self, input: &str) -> String {
        self.rules
            .iter()
            .fold(input.to_string(), |text, (pattern, replacement)| {
                pattern.replace_all(&text, *replacement).into_owned()
            })
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let redacted = self.patterns.redact(&String::from_utf8_lossy(buf));
        self.inner.write_all(redacted.as_bytes())?;
        // Report the caller's length; the redacted text may differ.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: self.patterns.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting Repost Bot...");

    let settings = init_settings();
    run_bot(settings).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    let fallback = if debug_mode { "debug" } else { DEFAULT_LOG_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<BotSettings> {
    let repost_settings = match RepostSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load repost configuration: {}", e);
            std::process::exit(1);
        }
    };
    let telegram_settings = match TelegramSettings::new() {
        Ok(settings) if !settings.telegram_token.is_empty() => settings,
        Ok(_) => {
            error!("TELEGRAM_TOKEN is not set");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        backend = ?repost_settings.storage_backend,
        style = %repost_settings.callout_style,
        "Configuration loaded successfully."
    );
    Arc::new(BotSettings::new(repost_settings, telegram_settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> RedactionPatterns {
        RedactionPatterns::new().expect("patterns compile")
    }

    #[test]
    fn test_token_in_api_url_is_masked() {
        let line = "GET https://api.telegram.org/bot123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw0/getMe";
        let out = patterns().redact(line);
        assert!(!out.contains("AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw0"));
        assert!(out.contains("[TELEGRAM_TOKEN]"));
    }

    #[test]
    fn test_r2_keys_are_masked() {
        let out = patterns().redact("R2_ACCESS_KEY_ID=abc R2_SECRET_ACCESS_KEY=def&x");
        assert_eq!(
            out,
            "R2_ACCESS_KEY_ID=[MASKED] R2_SECRET_ACCESS_KEY=[MASKED]&x"
        );
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(patterns().redact("Bot is running..."), "Bot is running...");
    }
}
