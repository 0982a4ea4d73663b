//! CLI entrypoint for nbkernel
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use nbkernel_application::{
    JupyterSession, KernelConnectionFactory, MessageBuilder, MessageLogger, NoMessageLogger,
};
use nbkernel_domain::{ExecuteRequest, InputReply, JupyterMessage, KernelSelection};
use nbkernel_infrastructure::launcher::connection_file::read_connection_file;
use nbkernel_infrastructure::{ConfigLoader, FileConfig, JsonlMessageLogger};
use nbkernel_presentation::{
    Cli, Command, ConsoleFormatter, JsonFormatter, MessageFormatter, OutputFormat, StatusReporter,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources();
        return Ok(ExitCode::SUCCESS);
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    config.validate()?;

    let log_file = cli.log_file.clone().or_else(|| config.logging.log_file.clone());
    let _log_guard = init_logging(cli.verbose, log_file.as_deref())?;

    info!("Starting nbkernel");

    let formatter: Box<dyn MessageFormatter> = match cli.output {
        OutputFormat::Text => Box::new(ConsoleFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    };

    let Some(command) = cli.command else {
        bail!("No command given. Run `nbkernel --help` for usage.");
    };

    let (selection, code, shutdown) = match command {
        Command::Kernelspecs => {
            let specs = config.kernel.spec_store().list();
            println!("{}", formatter.format_kernelspecs(&specs));
            return Ok(ExitCode::SUCCESS);
        }
        Command::Run { kernel, file, code } => {
            let name = kernel
                .or_else(|| config.kernel.default.clone())
                .context("No kernel given. Use --kernel or set kernel.default in the config file")?;
            let code = read_code(code, file.as_deref()).await?;
            (select_kernel(&config, &name)?, code, true)
        }
        Command::Connect {
            connection_file,
            code,
            shutdown,
        } => {
            let info = read_connection_file(&connection_file)?;
            let code = read_code(code, None).await?;
            (KernelSelection::Running(info), code, shutdown)
        }
    };

    let reporter = Arc::new(if cli.quiet || cli.output == OutputFormat::Json {
        StatusReporter::hidden()
    } else {
        StatusReporter::new()
    });

    // === Dependency Injection ===
    let message_log = cli.message_log.clone().or_else(|| config.logging.message_log.clone());
    let logger: Arc<dyn MessageLogger> = match message_log
        .as_deref()
        .and_then(|path| JsonlMessageLogger::new(path))
    {
        Some(logger) => Arc::new(logger),
        None => Arc::new(NoMessageLogger),
    };
    let builder: Arc<dyn MessageBuilder> = Arc::new(config.kernel.message_builder());
    let factory = build_factory(&config, builder, logger)?;
    let session = JupyterSession::new(factory, config.session.to_session_config());
    let status_task = reporter.follow(session.on_status_changed());

    reporter.set_prefix(selection.display_name());
    let outcome = run_session(&session, selection, code, formatter.as_ref(), &reporter).await;

    let released = if shutdown {
        session.shutdown().await
    } else {
        session.detach()
    };
    if let Err(e) = released {
        warn!("Failed to release kernel: {}", e);
    }
    status_task.abort();
    reporter.finish();

    if outcome? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Initialize logging based on verbosity level.
///
/// With a log file, output goes through a non-blocking writer whose guard
/// must live until exit.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn build_factory(
    config: &FileConfig,
    builder: Arc<dyn MessageBuilder>,
    logger: Arc<dyn MessageLogger>,
) -> Result<Arc<dyn KernelConnectionFactory>> {
    #[cfg(feature = "server")]
    if let Some(url) = &config.server.url {
        use nbkernel_infrastructure::{JupyterServerClient, JupyterServerFactory};
        let server = JupyterServerClient::new(url, config.server.token.clone())?;
        return Ok(Arc::new(
            JupyterServerFactory::new(server, builder).with_logger(logger),
        ));
    }

    #[cfg(feature = "zmq")]
    {
        use nbkernel_infrastructure::{KernelLauncher, RawKernelFactory};
        let launcher = KernelLauncher::new(config.kernel.to_launch_config());
        Ok(Arc::new(
            RawKernelFactory::zmq(launcher, builder).with_logger(logger),
        ))
    }

    #[cfg(not(feature = "zmq"))]
    {
        let _ = (config, builder, logger);
        bail!("nbkernel was built without the `zmq` feature; set server.url to use a Jupyter server")
    }
}

/// Kernelspecs are local unless a Jupyter server is configured, in which
/// case the server resolves the name.
fn select_kernel(config: &FileConfig, name: &str) -> Result<KernelSelection> {
    #[cfg(feature = "server")]
    if config.server.url.is_some() {
        return Ok(KernelSelection::Spec(nbkernel_domain::KernelSpec {
            name: name.to_string(),
            argv: Vec::new(),
            display_name: name.to_string(),
            language: String::new(),
            interrupt_mode: nbkernel_domain::InterruptMode::Message,
            env: Default::default(),
            metadata: Default::default(),
        }));
    }
    Ok(KernelSelection::Spec(config.kernel.spec_store().find(name)?))
}

async fn read_code(code: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(code) = code {
        return Ok(code);
    }
    if let Some(path) = file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut code = String::new();
    tokio::io::stdin().read_to_string(&mut code).await?;
    Ok(code)
}

/// Connect, run `code`, and report whether it succeeded.
async fn run_session(
    session: &JupyterSession,
    selection: KernelSelection,
    code: String,
    formatter: &dyn MessageFormatter,
    reporter: &StatusReporter,
) -> Result<bool> {
    session.connect(selection).await?;
    session.wait_for_idle(session.config().idle_timeout).await?;

    let future = session
        .request_execute(ExecuteRequest::new(code), true, None)?
        .context("Session has no kernel")?;
    let mut messages = future
        .take_messages()
        .context("Execution output already taken")?;

    loop {
        tokio::select! {
            msg = messages.recv() => {
                let Some(msg) = msg else { break };
                if msg.msg_type() == "input_request" {
                    let value = prompt_for_input(&msg).await?;
                    session.send_input_reply(InputReply::ok(value))?;
                } else if let Some(text) = formatter.format_message(&msg) {
                    reporter.println(&text);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt requested");
                match session.interrupt_or_restart().await {
                    Ok(true) => warn!("Kernel did not respond to the interrupt and was restarted"),
                    Ok(false) => {}
                    Err(e) => warn!("Interrupt failed: {}", e),
                }
            }
        }
    }

    let reply = future.done().await?;
    if let Some(text) = formatter.format_reply(&reply) {
        reporter.println(&text);
    }
    Ok(reply.reply_status() == Some("ok"))
}

async fn prompt_for_input(request: &JupyterMessage) -> Result<String> {
    let prompt = request
        .content
        .get("prompt")
        .and_then(|p| p.as_str())
        .unwrap_or_default()
        .to_string();

    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

