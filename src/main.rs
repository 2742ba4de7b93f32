use std::{error::Error, ffi::OsString, process, sync::Arc};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, LevelFilter};

use spotdeck::{
    actions::Services,
    api,
    auth::Authenticator,
    config::Config,
    host::{websocket::WebSocketHost, Host},
    http::Client as HttpClient,
    plugin::Plugin,
    signal,
    tokens::TokenStore,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Options the Stream Deck software passes with a single dash.
const HOST_OPTIONS: &[&str] = &["-port", "-pluginUUID", "-registerEvent", "-info"];

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port of the host WebSocket on the loopback interface
    #[arg(long)]
    port: u16,

    /// Identifier the host assigned to this plugin instance
    #[arg(long = "pluginUUID", value_name = "UUID")]
    plugin_uuid: String,

    /// Event name to register with
    #[arg(long = "registerEvent", value_name = "EVENT")]
    register_event: String,

    /// JSON description of the host application and devices
    #[arg(long, value_name = "JSON")]
    info: Option<String>,

    /// Port of the authorization callback
    ///
    /// Must match the redirect URI registered for your Spotify client id,
    /// which is `http://127.0.0.1:<PORT>/callback`.
    #[arg(long, value_name = "PORT", value_hint = ValueHint::Other, env = "SPOTDECK_REDIRECT_PORT", default_value_t = Config::DEFAULT_REDIRECT_PORT)]
    redirect_port: u16,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Rewrites the single-dash options of the host into long options.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some(option) if HOST_OPTIONS.contains(&option) => format!("-{option}").into(),
            _ => arg,
        })
        .collect()
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            // Quiet and verbose are mutually exclusive.
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module("spotdeck", level);
    }

    logger.init();
}

/// Connects to the host and serves controls until the host disconnects or
/// a shutdown signal arrives.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = Config::new();
    config.redirect_port = args.redirect_port;

    if let Some(info) = &args.info {
        debug!("host info: {info}");
    }

    let http = Arc::new(HttpClient::new(&config)?);
    let (host, mut envelopes) =
        WebSocketHost::connect(args.port, &args.plugin_uuid, &args.register_event).await?;
    let host: Arc<dyn Host> = Arc::new(host);

    let authenticator = Arc::new(Authenticator::new(
        http.clone(),
        config.clone(),
        Arc::new(TokenStore::new()),
        host.clone(),
    ));
    let remote = Arc::new(api::Client::new(&config, http, authenticator.clone()));

    let mut plugin = Plugin::new(Services {
        host,
        remote,
        tokens: authenticator,
    });
    let mut signals = signal::Handler::new()?;

    tokio::select! {
        // Prioritize shutdown signals.
        biased;

        signal = signals.recv() => {
            info!("received {signal}, shutting down");
        }

        () = plugin.run(&mut envelopes) => {}
    }

    plugin.shutdown().await;
    Ok(())
}

/// Main entry point of the application.
#[tokio::main]
async fn main() {
    let args = Args::parse_from(normalize_args(std::env::args_os()));
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
