use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use log::{debug, error, info, warn};
use serde_json::json;
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;

use tiledeck::admission::generate_token;
use tiledeck::api::{AppState, create_router};
use tiledeck::config::paths::{APP_NAME, PathSources, resolve_config_path};
use tiledeck::config::{ConfigStore, LoadSource, MergeOptions, merge_with_defaults};
use tiledeck::exec::{ProcessStatusCache, SystemProcessProbe, SystemSpawner};
use tiledeck::logging::{FileLog, LogOptions, init_logging};
use tiledeck::programs::{ProgramCatalog, resolve_program_path, search};

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(ctx: RuntimeContext, command: Command) -> Result<()> {
    match command {
        Command::Serve(cmd) => handle_serve(ctx, cmd).await,
        Command::Config { command } => handle_config(&ctx, command).await,
        Command::Token { command } => handle_token(&ctx, command).await,
        Command::Programs { command } => handle_programs(&ctx, command).await,
        Command::Completions { shell } => handle_completions(shell),
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    if let Command::Completions { shell } = &cli.command {
        return handle_completions(*shell);
    }

    let ctx = RuntimeContext::new(cli.common)?;
    async_main(ctx, cli.command)
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Tiledeck - token-gated tile launcher server.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<String>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -v)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON
    #[arg(long, global = true)]
    json: bool,
    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true)]
    no_color: bool,
    /// Emit additional diagnostics for troubleshooting
    #[arg(long = "diagnostics", global = true)]
    diagnostics: bool,
}

impl CommonOpts {
    fn log_options(&self) -> LogOptions {
        LogOptions {
            quiet: self.quiet,
            verbose: self.verbose,
            debug: self.debug,
            trace: self.trace,
            json: self.json,
            no_color: self.no_color,
            diagnostics: self.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP API server
    Serve(ServeCommand),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Show or rotate the API token
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },
    /// Search the program index
    Programs {
        #[command(subcommand)]
        command: ProgramsCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to (overrides the config file)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
    /// Directory with the web UI assets
    #[arg(long, default_value = "public", value_name = "DIR")]
    static_dir: PathBuf,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration (token redacted)
    Show {
        /// Print YAML instead of JSON
        #[arg(long)]
        yaml: bool,
    },
    /// Print the resolved config file path
    Path,
    /// Rewrite the default configuration, keeping the current token
    Reset,
}

#[derive(Debug, Subcommand)]
enum TokenCommand {
    /// Print the current token
    Show,
    /// Generate and persist a new token
    Rotate,
}

#[derive(Debug, Subcommand)]
enum ProgramsCommand {
    /// Resolve a program name to an executable path
    Resolve {
        #[arg(value_name = "INPUT")]
        input: String,
    },
    /// List indexed programs
    List {
        /// Filter by name
        #[arg(long, short)]
        query: Option<String>,
        /// Maximum number of entries
        #[arg(long, short, default_value = "50")]
        limit: usize,
    },
}

struct RuntimeContext {
    common: CommonOpts,
    store: ConfigStore,
    _log_guard: Option<WorkerGuard>,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let path = resolve_config_path(&PathSources::from_process(common.config.clone()))
            .context("resolving config path")?;
        let (store, report) = ConfigStore::load(&path, MergeOptions::default());

        let logging = store.read_blocking(|c| c.logging.clone());
        let file = FileLog::from_config(&logging, &path);
        let log_guard = init_logging(&common.log_options(), &logging, file.as_ref())?;

        for problem in &report.problems {
            error!("{problem}");
        }
        match report.source {
            LoadSource::File => debug!("loaded config from {}", path.display()),
            LoadSource::Created => info!("created default config at {}", path.display()),
            LoadSource::Backup => warn!(
                "config at {} was unreadable; loaded the backup copy",
                path.display()
            ),
            LoadSource::Defaults => warn!(
                "config at {} was unreadable; running on defaults",
                path.display()
            ),
        }

        Ok(Self {
            common,
            store,
            _log_guard: log_guard,
        })
    }
}

async fn handle_serve(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    let (config_host, config_port) = ctx.store.read(|c| (c.host.clone(), c.port)).await;
    let host = cmd.host.unwrap_or(config_host);
    let port = cmd.port.unwrap_or(config_port);

    let static_dir = if cmd.static_dir.is_dir() {
        Some(cmd.static_dir)
    } else {
        warn!(
            "static directory {} not found; serving the API only",
            cmd.static_dir.display()
        );
        None
    };

    let processes = ProcessStatusCache::new(Arc::new(SystemProcessProbe::default()));
    let state = AppState::new(
        Arc::new(ctx.store),
        Arc::new(ProgramCatalog::system()),
        Arc::new(SystemSpawner),
        Arc::new(processes),
    );
    let app = create_router(state, static_dir);

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("binding to {host}:{port}"))?;
    info!(
        "Listening on http://{}",
        listener.local_addr().context("reading bound address")?
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("running server")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

async fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show { yaml } => {
            let config = ctx.store.read(|c| c.redacted()).await;
            if yaml {
                print!(
                    "{}",
                    serde_yaml::to_string(&config).context("serializing config to YAML")?
                );
            } else {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config).context("serializing config to JSON")?
                );
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.store.path().display());
            Ok(())
        }
        ConfigCommand::Reset => {
            let token = ctx.store.read(|c| c.token.clone()).await;
            let defaults = merge_with_defaults(&json!({ "token": token }), MergeOptions::default());
            ctx.store.replace(defaults).await;
            ctx.store
                .persist()
                .await
                .with_context(|| format!("writing {}", ctx.store.path().display()))?;
            info!("reset config at {}", ctx.store.path().display());
            Ok(())
        }
    }
}

async fn handle_token(ctx: &RuntimeContext, command: TokenCommand) -> Result<()> {
    match command {
        TokenCommand::Show => {
            println!("{}", ctx.store.read(|c| c.token.clone()).await);
        }
        TokenCommand::Rotate => {
            let token = generate_token();
            ctx.store.mutate(|c| c.token = token.clone()).await;
            ctx.store
                .persist()
                .await
                .with_context(|| format!("writing {}", ctx.store.path().display()))?;
            info!("rotated API token");
            println!("{token}");
        }
    }
    Ok(())
}

async fn handle_programs(ctx: &RuntimeContext, command: ProgramsCommand) -> Result<()> {
    let launchers = ctx.store.read(|c| c.launchers.clone()).await;
    let catalog = Arc::new(ProgramCatalog::system());
    let index = catalog.index(&launchers).await;

    match command {
        ProgramsCommand::Resolve { input } => {
            let path = resolve_program_path(&input, &index);
            if path.is_empty() {
                bail!("no confident match for '{input}'");
            }
            println!("{path}");
        }
        ProgramsCommand::List { query, limit } => {
            let entries = search(&index, query.as_deref().unwrap_or_default(), limit);
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&entries).context("serializing programs")?
                );
            } else {
                for entry in entries {
                    println!("{}\t{}\t{:?}", entry.label, entry.path, entry.source);
                }
            }
        }
    }
    Ok(())
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}
