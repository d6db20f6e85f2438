mod client;
mod command;
mod config;
mod error;
mod handlers;
mod printer;
mod ssh;
mod usage;

use crate::client::ApiClient;
use crate::command::{Context, Dispatcher};
use crate::config::{API_KEY, DEFAULT_PROFILE, Profile, ProfileStore};
use crate::error::CliError;
use crate::ssh::RusshShell;
use anyhow::{Context as _, Result, anyhow};
use clap::{CommandFactory, FromArgMatches, Parser};
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const API_KEY_PROMPT: &str = "your api key(https://my.vultr.com/settings API Information): ";

#[derive(Parser)]
#[command(
    name = "vultrctl",
    version,
    about = "CLI for the Vultr VPS API",
    override_usage = "vultrctl [OPTIONS] <COMMAND> [ARGS]..."
)]
struct Cli {
    #[arg(
        long,
        env = "VULTR_API_KEY",
        hide_env_values = true,
        help = "API key override for this invocation (otherwise read from the profile)"
    )]
    api_key: Option<String>,

    #[arg(
        long,
        env = "VULTR_ENDPOINT",
        value_name = "URL",
        help = "Base URL for the API (defaults to https://api.vultr.com/)"
    )]
    endpoint: Option<String>,

    #[arg(
        long,
        value_name = "NAME",
        default_value = DEFAULT_PROFILE,
        help = "Credential profile to read and store the API key in"
    )]
    profile: String,

    #[arg(short, long, help = "Log requests and responses at debug level")]
    verbose: bool,

    #[arg(value_name = "COMMAND", trailing_var_arg = true, num_args = 0..)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // A declined confirmation has already been answered on the terminal.
            if !matches!(err.downcast_ref::<CliError>(), Some(CliError::Aborted)) {
                eprintln!("Error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let dispatcher = Dispatcher::new(handlers::registry())?;
    let matches = Cli::command()
        .after_help(dispatcher.summary())
        .get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    init_tracing(cli.verbose);
    dispatcher.check(&cli.command)?;

    let store = ProfileStore::locate()?;
    let settings = store.resolve(&cli.profile, cli.api_key, cli.endpoint)?;
    let api_key = match settings.api_key {
        Some(key) => key,
        None => prompt_api_key(&store, &cli.profile)?,
    };

    let client = ApiClient::new(&settings.endpoint, &api_key)?;
    tracing::info!("endpoint: {}", client.endpoint());

    // Unlocked handles: the SSH bridge reads and writes the same streams
    // from its own runtime threads.
    let mut input = BufReader::new(io::stdin());
    let mut output = io::stdout();
    let shell = RusshShell;
    let mut ctx = Context {
        client: &client,
        shell: &shell,
        input: &mut input,
        output: &mut output,
    };
    dispatcher.dispatch(&mut ctx, &cli.command)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("VULTRCTL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn prompt_api_key(store: &ProfileStore, profile: &str) -> Result<String> {
    let key = if io::stdin().is_terminal() {
        rpassword::prompt_password(API_KEY_PROMPT).context("reading API key")?
    } else {
        read_api_key(&mut io::stdin().lock(), &mut io::stderr())?
    };
    let key = key.trim().to_string();
    if key.is_empty() {
        return Err(anyhow!("an API key is required"));
    }

    let path = store.set(profile, Profile::from([(API_KEY.to_string(), key.clone())]))?;
    tracing::info!("saved API key to {}", path.display());
    Ok(key)
}

/// Reads one line from piped input; there is no terminal echo to hide.
fn read_api_key(input: &mut dyn BufRead, prompt: &mut dyn Write) -> Result<String> {
    prompt.write_all(API_KEY_PROMPT.as_bytes())?;
    prompt.flush()?;
    let mut key = String::new();
    input.read_line(&mut key).context("reading API key")?;
    Ok(key)
}
