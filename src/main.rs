use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use tuition_receipts::args::{Args, Command};
use tuition_receipts::{commands, Config, Mode, Result};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().receipts_home().path();

    // This allows for running the program without calling Gemini. When RECEIPTS_IN_TEST_MODE is
    // set and non-zero in length, then the mode will be Mode::Testing, otherwise it will be
    // Mode::Gemini.
    let mode = Mode::from_env();
    let today = chrono::Local::now().date_naive();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args).await?.print(),

        Command::Batch(batch_args) => {
            let config = Config::load(home).await?;
            commands::batch(&config, mode, batch_args, today)
                .await?
                .print()
        }

        Command::Single(single_args) => {
            let config = Config::load(home).await?;
            commands::single(&config, mode, single_args, today)
                .await?
                .print()
        }

        Command::Signature(signature_args) => {
            let config = Config::load(home).await?;
            commands::signature(&config, mode, signature_args)
                .await?
                .print()
        }

        Command::Mcp(_mcp_args) => commands::mcp(Config::load(home).await?, mode)
            .await?
            .print(),
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for the library and the binary only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_CRATE_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
