use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::chains;
use chains::{available_chains, load_registry, parse_chain};
use clap::{Arg, ArgMatches, Command, value_parser};
use tracing::debug;
use walletsession::controller::SessionControllerParams;
use walletsession::{
    ChainRegistry, FileMarkerStore, RegistryError, SessionConfig, SessionController, SessionError,
    StatusView,
};
use walletsession_rpc::RpcWallet;

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Failures surfaced to the user by the CLI
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// `--rpc-url` is not a valid URL
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The chain table could not be built
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A session operation failed
    #[error(transparent)]
    Session(#[from] SessionError),
    /// `--chain` names no configured chain
    #[error("Unknown chain '{chain}' (expected a chain ID or one of: {known})")]
    UnknownChain {
        /// The argument as given
        chain: String,
        /// Comma separated chain names
        known: String,
    },
    /// JSON output could not be produced
    #[error("Failed to serialize output as JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The async runtime could not be created
    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn from_matches(matches: &ArgMatches) -> Self {
        match matches.get_one::<String>("output").map(String::as_str) {
            Some("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

fn print_status(view: &StatusView, output: OutputFormat) -> Result<(), CliError> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(view)?),
        OutputFormat::Text => println!("{view}"),
    }
    Ok(())
}

fn print_chains(registry: &ChainRegistry, output: OutputFormat) -> Result<(), CliError> {
    match output {
        OutputFormat::Json => {
            let chains: Vec<_> = registry.chains().collect();
            println!("{}", serde_json::to_string_pretty(&chains)?);
        }
        OutputFormat::Text => {
            for descriptor in registry.chains() {
                println!(
                    "{} [{}] {}",
                    registry.resolve(descriptor.chain_id).network_label(),
                    descriptor.hex_chain_id,
                    descriptor.native_coin_symbol
                );
            }
        }
    }
    Ok(())
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir().map_or_else(
        || PathBuf::from(".walletsession"),
        |dir| dir.join("walletsession"),
    )
}

fn build_controller(
    matches: &ArgMatches,
    registry: ChainRegistry,
    config: SessionConfig,
) -> Result<SessionController, CliError> {
    let rpc_url = matches
        .get_one::<String>("rpc-url")
        .map_or(DEFAULT_RPC_URL, String::as_str);
    let data_dir = matches
        .get_one::<PathBuf>("data-dir")
        .cloned()
        .unwrap_or_else(default_data_dir);
    debug!(rpc_url, data_dir = %data_dir.display(), "building session controller");

    let provider = RpcWallet::from_url_str(rpc_url)?;
    Ok(SessionController::new(SessionControllerParams {
        provider: Arc::new(provider),
        registry,
        markers: Arc::new(FileMarkerStore::in_dir(data_dir)),
        config,
    }))
}

async fn connect_or_restore(controller: &SessionController) -> Result<(), CliError> {
    if controller.restore().await.is_none() {
        controller.connect().await?;
    }
    Ok(())
}

async fn watch(controller: &SessionController, output: OutputFormat) -> Result<(), CliError> {
    let mut updates = controller.subscribe();
    controller.start();
    connect_or_restore(controller).await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_printed = None;
    loop {
        let view = updates.borrow_and_update().view(controller.registry());
        if last_printed.as_ref() != Some(&view) {
            print_status(&view, output)?;
            last_printed = Some(view);
        }
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }
    controller.shutdown();
    Ok(())
}

async fn run(matches: &ArgMatches) -> Result<(), CliError> {
    let output = OutputFormat::from_matches(matches);
    let registry = load_registry(matches.get_one::<PathBuf>("chains").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("chains", _)) => print_chains(&registry, output),
        Some(("status", _)) => {
            let controller = build_controller(matches, registry, SessionConfig::default())?;
            connect_or_restore(&controller).await?;
            print_status(&controller.snapshot().view(controller.registry()), output)
        }
        Some(("switch", sub)) => {
            let chain = sub.get_one::<String>("chain").map_or("", String::as_str);
            let Some(target) = parse_chain(chain, &registry) else {
                return Err(CliError::UnknownChain {
                    chain: chain.to_string(),
                    known: available_chains(&registry).join(", "),
                });
            };
            let controller = build_controller(matches, registry, SessionConfig::default())?;
            connect_or_restore(&controller).await?;
            controller.switch_network(target).await?;
            print_status(&controller.snapshot().view(controller.registry()), output)
        }
        Some(("watch", sub)) => {
            let mut config = SessionConfig::default();
            if let Some(secs) = sub.get_one::<u64>("interval") {
                config = config.with_poll_interval(Duration::from_secs(*secs));
            }
            let controller = build_controller(matches, registry, config)?;
            watch(&controller, output).await
        }
        Some(("disconnect", _)) => {
            let controller = build_controller(matches, registry, SessionConfig::default())?;
            controller.disconnect().await;
            print_status(&controller.snapshot().view(controller.registry()), output)
        }
        Some(("restore", _)) => {
            let controller = build_controller(matches, registry, SessionConfig::default())?;
            controller.restore().await;
            print_status(&controller.snapshot().view(controller.registry()), output)
        }
        _ => Ok(()),
    }
}

fn command() -> Command {
    Command::new("walletsession")
        .version("1.0")
        .about("Connects to an EVM wallet and reports account, balance and network")
        .subcommand_required(true)
        .arg(
            Arg::new("rpc-url")
                .long("rpc-url")
                .value_name("URL")
                .help("Wallet JSON-RPC endpoint")
                .env("WALLETSESSION_RPC_URL")
                .global(true),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding the reconnect marker")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("chains")
                .long("chains")
                .value_name("FILE")
                .help("JSON file with extra chain descriptors")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FORMAT")
                .help("Output format")
                .value_parser(["text", "json"])
                .default_value("text")
                .global(true),
        )
        .subcommand(Command::new("chains").about("List the configured chains"))
        .subcommand(Command::new("status").about("Connect and print the session status"))
        .subcommand(
            Command::new("switch")
                .about("Switch the wallet to another chain")
                .arg(
                    Arg::new("chain")
                        .short('c')
                        .long("chain")
                        .value_name("CHAIN")
                        .help("Chain ID, hex chain ID or chain name")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Connect and print the status whenever it changes")
                .arg(
                    Arg::new("interval")
                        .long("interval")
                        .value_name("SECS")
                        .help("Balance polling interval in seconds")
                        .value_parser(value_parser!(u64)),
                ),
        )
        .subcommand(Command::new("disconnect").about("End the session and forget the wallet"))
        .subcommand(Command::new("restore").about("Silently reconnect a remembered wallet"))
}

/// app cli
pub struct Cli;
impl Cli {
    /// Parses the command line, runs the chosen subcommand and reports failures on stderr
    #[must_use]
    pub fn execute() -> ExitCode {
        let matches = command().get_matches();

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                eprintln!("Error: {}", CliError::from(err));
                return ExitCode::FAILURE;
            }
        };

        match runtime.block_on(run(&matches)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {err}");
                ExitCode::FAILURE
            }
        }
    }
}
