use std::sync::Arc;

use clap::{Parser, Subcommand};
use qpmatrix::client::{
    ApiError, FixedColorScheme, HeadlessDocument, HttpClient, PersistError, PersistOutcome, PreferencePersister,
    PreferenceStore, StoreError, ThemeService,
};
use qpmatrix::config::{ClientConfig, DEFAULT_BASE_URL};
use qpmatrix::preference::{Direction, Preference, ThemeMode};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http request failed: {0}")]
    Api(#[from] ApiError),
    #[error("store setup failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Parser, Debug)]
#[command(name = "prefctl", about = "Drive theme and direction preferences against a qpmatrix server")]
struct Cli {
    #[arg(long, env = "QPMATRIX_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// `Cookie` header carrying the saved preferences, e.g. from a browser.
    #[arg(long, env = "QPMATRIX_COOKIE")]
    cookie: Option<String>,

    /// Treat the OS color scheme as dark when resolving `system`.
    #[arg(long)]
    prefers_dark: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set the theme mode: dark, light or system.
    Theme {
        #[arg(value_parser = parse_value::<ThemeMode>)]
        mode: ThemeMode,
    },
    /// Set the text direction: ltr or rtl.
    Direction {
        #[arg(value_parser = parse_value::<Direction>)]
        dir: Direction,
    },
    /// Print the preferences decoded from `--cookie`.
    Show,
}

fn parse_value<P: Preference>(raw: &str) -> Result<P, String> {
    P::parse(raw).ok_or_else(|| format!("must be {}", P::ACCEPTED))
}

/// Headless store seeded from a `Cookie` header.
fn seed_store(
    cookie: Option<&str>,
    prefers_dark: bool,
    persister: Arc<dyn PreferencePersister>,
) -> Result<(PreferenceStore, Arc<HeadlessDocument>), StoreError> {
    let document = Arc::new(HeadlessDocument::new());
    let store = PreferenceStore::builder()
        .initial_from_cookies(cookie)
        .document(document.clone())
        .color_scheme(Arc::new(FixedColorScheme { prefers_dark }))
        .persister(persister)
        .build()?;
    Ok((store, document))
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().with_base_url(&cli.base_url);
    let service = ThemeService::new(HttpClient::internal(config)?);

    let (store, document) = seed_store(cli.cookie.as_deref(), cli.prefers_dark, Arc::new(service))?;

    let outcome = match cli.command {
        Command::Theme { mode } => Some(store.set_theme(mode).outcome().await?),
        Command::Direction { dir } => Some(store.set_direction(dir).outcome().await?),
        Command::Show => None,
    };
    match outcome {
        Some(PersistOutcome::Persisted) => eprintln!("persisted"),
        Some(PersistOutcome::Superseded) => eprintln!("write superseded by a newer value"),
        None => {}
    }

    println!("<html {}>", document.root_attributes());
    println!("theme={} direction={}", store.theme(), store.direction());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Arc<dyn PreferencePersister> {
        let http = HttpClient::internal(ClientConfig::internal(DEFAULT_BASE_URL)).unwrap();
        Arc::new(ThemeService::new(http))
    }

    #[test]
    fn show_reads_preferences_from_cookie_flag() {
        let cli = Cli::try_parse_from([
            "prefctl",
            "--cookie",
            "session=abc; qpmatrix-theme=dark; qpmatrix-direction=rtl",
            "show",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Show));

        let (store, document) = seed_store(cli.cookie.as_deref(), cli.prefers_dark, service()).unwrap();
        assert_eq!(store.theme(), ThemeMode::Dark);
        assert_eq!(store.direction(), Direction::Rtl);
        assert_eq!(document.root_attributes(), r#"class="dark" dir="rtl""#);
    }

    #[test]
    fn missing_cookie_seeds_defaults() {
        let (store, document) = seed_store(None, true, service()).unwrap();
        assert_eq!(store.theme(), ThemeMode::System);
        assert_eq!(document.root_attributes(), r#"class="dark" dir="ltr""#);
    }

    #[test]
    fn theme_argument_is_strict() {
        assert!(Cli::try_parse_from(["prefctl", "theme", "Dark"]).is_err());
        let cli = Cli::try_parse_from(["prefctl", "theme", "light"]).unwrap();
        assert!(matches!(cli.command, Command::Theme { mode: ThemeMode::Light }));
    }
}
