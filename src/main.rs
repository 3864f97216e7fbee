use clap::Parser;
use pmvault::cli::{commands, Cli, Commands};
use tracing_subscriber::EnvFilter;

/// Env var holding the log filter, e.g. `PMVAULT_LOG=pmvault=debug`.
const LOG_ENV: &str = "PMVAULT_LOG";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("pmvault=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli),
        Commands::Unlock => commands::unlock::execute(&cli),
        Commands::Lock => commands::lock::execute(&cli),
        Commands::Set {
            ref site,
            ref username,
            ref password,
            ref notes,
        } => commands::set::execute(
            &cli,
            site,
            username.as_deref(),
            password.as_deref(),
            notes,
        ),
        Commands::Get {
            ref site,
            show,
            copy,
        } => commands::get::execute(&cli, site, show, copy),
        Commands::List { ref search } => commands::list::execute(&cli, search.as_deref()),
        Commands::Delete { ref site, force } => commands::delete::execute(&cli, site, force),
        Commands::Passwd => commands::passwd::execute(&cli),
        Commands::Encrypt { ref value } => {
            commands::secret::execute_encrypt(&cli, value.as_deref())
        }
        Commands::Decrypt { ref envelope } => {
            commands::secret::execute_decrypt(&cli, envelope.as_deref())
        }
        Commands::Import { ref csv } => commands::import::execute(&cli, csv),
        Commands::Completions { shell } => commands::completions::execute(shell),
    };

    if let Err(e) = result {
        pmvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
