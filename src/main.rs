use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{debug, info};

use cio_terminal::{
    app, logging, run_exchange, Config, ExchangeEvent, ExchangeId, HttpTransport, PromptRequest,
    ERROR_TEXT,
};

#[derive(Parser)]
#[command(name = "cio-terminal", version)]
#[command(about = "Chat terminal that streams answers from a CIO Brain server")]
struct Cli {
    /// Server base URL (overrides CIO_SERVER_URL and the config file)
    #[arg(long, global = true)]
    server: Option<String>,
    /// Start with retrieval-augmented answers enabled
    #[arg(long, global = true)]
    rag: bool,
    /// Start with retrieval-augmented answers disabled
    #[arg(long, global = true, conflicts_with = "rag")]
    no_rag: bool,
    /// Path to the JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path of the diagnostic log file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat terminal (default)
    Chat,
    /// Send one prompt and stream the answer to stdout
    Ask {
        /// Your question
        prompt: String,
    },
    /// Print the resolved configuration
    Config {
        /// Write the config file with command-line overrides applied
        /// (CIO_SERVER_URL is never saved)
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    let command = cli.command.take().unwrap_or(Commands::Chat);
    let config = resolve_config(&cli, |key| std::env::var(key).ok())?;

    logging::init(&config.log_path()?)?;
    debug!(config = ?config, "Configuration resolved");

    match command {
        Commands::Chat => app::run(&config).await?,
        Commands::Ask { prompt } => ask(&config, &prompt).await?,
        Commands::Config { save } => show_config(&config, &cli, save)?,
    }

    Ok(())
}

fn load_file_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

fn apply_cli(config: &mut Config, cli: &Cli) {
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    if cli.rag {
        config.use_rag = true;
    }
    if cli.no_rag {
        config.use_rag = false;
    }
    if let Some(log_file) = &cli.log_file {
        config.log_file = Some(log_file.clone());
    }
}

/// Precedence: command line, then environment, then config file.
fn resolve_config<F>(cli: &Cli, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = load_file_config(cli)?;
    config.apply_env(env);
    apply_cli(&mut config, cli);
    config.validate()?;
    Ok(config)
}

/// What `config --save` writes: the file plus explicit flags, never the environment.
fn persisted_config(cli: &Cli) -> Result<Config> {
    let mut config = load_file_config(cli)?;
    apply_cli(&mut config, cli);
    config.validate()?;
    Ok(config)
}

async fn ask(config: &Config, prompt: &str) -> Result<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(anyhow!("prompt must not be empty"));
    }

    let transport = Arc::new(HttpTransport::new(&config.server_url)?);
    let request = PromptRequest {
        prompt: prompt.to_string(),
        use_rag: config.use_rag,
    };
    info!(endpoint = %transport.endpoint(), "One-shot prompt");

    let (tx, mut rx) = mpsc::unbounded_channel::<ExchangeEvent>();
    tokio::spawn(run_exchange(transport, ExchangeId::default(), request, tx));

    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        match event {
            ExchangeEvent::Opened { .. } => {}
            ExchangeEvent::Chunk { text, .. } => {
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            ExchangeEvent::Finished { .. } => {
                writeln!(stdout)?;
                return Ok(());
            }
            ExchangeEvent::Failed { .. } => {
                writeln!(stdout)?;
                return Err(anyhow!(ERROR_TEXT));
            }
        }
    }
    Err(anyhow!(ERROR_TEXT))
}

fn show_config(config: &Config, cli: &Cli, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        let persisted = persisted_config(cli)?;
        let saved = match &cli.config {
            Some(path) => {
                persisted.save_to(path)?;
                path.clone()
            }
            None => persisted.save()?,
        };
        println!("Saved to {}", saved.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn cli_with_config(dir: &TempDir, contents: &str, args: &[&str]) -> Cli {
        let path = dir.path().join("config.json");
        fs::write(&path, contents).unwrap();
        let path = path.to_string_lossy().to_string();
        let mut argv = vec!["cio-terminal", "--config", path.as_str()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_no_rag_overrides_config_file() {
        let dir = TempDir::new().unwrap();
        let cli = cli_with_config(&dir, r#"{ "use_rag": true }"#, &["--no-rag"]);
        assert!(!resolve_config(&cli, no_env).unwrap().use_rag);

        let cli = cli_with_config(&dir, r#"{ "use_rag": true }"#, &[]);
        assert!(resolve_config(&cli, no_env).unwrap().use_rag);
    }

    #[test]
    fn test_rag_flags_conflict() {
        assert!(Cli::try_parse_from(["cio-terminal", "--rag", "--no-rag"]).is_err());
    }

    #[test]
    fn test_cli_beats_env_beats_file() {
        let dir = TempDir::new().unwrap();
        let file = r#"{ "server_url": "http://file:1" }"#;
        let env = |_: &str| Some("http://env:2".to_string());

        let cli = cli_with_config(&dir, file, &[]);
        assert_eq!(resolve_config(&cli, env).unwrap().server_url, "http://env:2");

        let cli = cli_with_config(&dir, file, &["--server", "http://cli:3"]);
        assert_eq!(resolve_config(&cli, env).unwrap().server_url, "http://cli:3");
    }

    #[test]
    fn test_save_ignores_environment_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let cli = cli_with_config(&dir, r#"{ "server_url": "http://file:1" }"#, &["--rag"]);
        let resolved = resolve_config(&cli, |_| Some("http://env:2".to_string())).unwrap();
        assert_eq!(resolved.server_url, "http://env:2");

        show_config(&resolved, &cli, true).unwrap();

        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.server_url, "http://file:1");
        assert!(saved.use_rag);
    }
}
