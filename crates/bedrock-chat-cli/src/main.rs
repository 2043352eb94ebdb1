use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bedrock_chat_agents::{BedrockClient, invoker_from_config};
use bedrock_chat_config::{AppConfig, ConfigLoader, InvocationMode};
use bedrock_chat_gateway::{ChatDispatcher, GatewayServer, InboundEnvelope};
use bedrock_chat_security::{
    CredentialsProvider, EnvCredentialsProvider, RedactingWriter, RequestSigner,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "bedrock-chat",
    version,
    about = "Chat gateway for Amazon Bedrock models, knowledge bases and agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (TOML or YAML). Defaults to ./bedrock-chat.{toml,yaml,yml}.
    #[arg(long, short, global = true, env = "BEDROCK_CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway until Ctrl-C.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long, short)]
        port: Option<u16>,
        /// Backend strategy: converse, knowledge_base or agent.
        #[arg(long)]
        mode: Option<InvocationMode>,
    },
    /// Dispatch one API Gateway proxy event and print the response envelope.
    Invoke {
        /// Event file; stdin when omitted.
        #[arg(long)]
        event: Option<PathBuf>,
        #[arg(long)]
        mode: Option<InvocationMode>,
    },
    /// Print the resolved configuration.
    CheckConfig,
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match cli.log_format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(RedactingWriter::stderr()),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(RedactingWriter::stderr()),
            )
            .init(),
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    loader.load().context("failed to load configuration")
}

/// Build the one dispatcher the process uses: a single HTTP client and
/// signer shared by every request.
fn build_dispatcher(config: &AppConfig) -> Result<ChatDispatcher> {
    let credentials: Arc<dyn CredentialsProvider> = Arc::new(EnvCredentialsProvider::new());
    let signer = RequestSigner::new(credentials, config.bedrock.region.clone());
    let client = BedrockClient::new(signer, config.bedrock.request_timeout_secs)
        .context("failed to build bedrock client")?;
    let invoker = invoker_from_config(&config.bedrock, Arc::new(client))
        .context("invalid bedrock configuration")?;
    Ok(ChatDispatcher::new(invoker))
}

async fn serve(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
    mode: Option<InvocationMode>,
) -> Result<()> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Some(mode) = mode {
        config.bedrock.mode = mode;
    }

    let dispatcher = build_dispatcher(&config)?;
    let server = GatewayServer::new(config, dispatcher);
    info!("starting gateway on {}", server.addr());
    server.run().await.context("gateway server failed")
}

async fn invoke(
    mut config: AppConfig,
    event: Option<PathBuf>,
    mode: Option<InvocationMode>,
) -> Result<()> {
    if let Some(mode) = mode {
        config.bedrock.mode = mode;
    }

    let raw = match &event {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read event file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read event from stdin")?;
            buf
        }
    };
    let envelope: InboundEnvelope =
        serde_json::from_str(&raw).context("event is not a valid proxy event")?;

    let dispatcher = build_dispatcher(&config)?;
    let response = dispatcher.handle(envelope).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn check_config(config: &AppConfig) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    match config.bedrock.validate() {
        Ok(()) => println!("# mode {} is fully configured", config.bedrock.mode),
        Err(e) => println!("# {e}"),
    }
    let credentials = if std::env::var_os("AWS_ACCESS_KEY_ID").is_some() {
        "set"
    } else {
        "missing"
    };
    println!("# AWS credentials in environment: {credentials}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = load_config(&cli)?;
    match cli.command {
        Command::Serve { host, port, mode } => serve(config, host, port, mode).await,
        Command::Invoke { event, mode } => invoke(config, event, mode).await,
        Command::CheckConfig => check_config(&config),
    }
}
