//! rollup-dapp CLI: send, notice, status, view.

use clap::{Args, Parser, Subcommand};
use rollup_dapp::chain::decode_utf8_payload;
use rollup_dapp::{
    AlloyRollups, DappConfig, IndexConfig, LocalWallet, NoticeIndexClient, NoticeKeys, PollConfig,
    PollOutcome, ReceiptEvent, RollupSession,
};
use rollup_dapp_views::{render_to_file, HelloView, Router, SubmissionSummary, ViewContext};
use std::path::PathBuf;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tracing::info;

const DEFAULT_RPC_URL: &str = "http://localhost:8545";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    let cli = Cli::parse();
    match cli.command {
        Command::Send(args) => run_send(args),
        Command::Notice(args) => run_notice(args),
        Command::Status(args) => run_status(args),
        Command::View(args) => run_view(args),
    }
}

#[derive(Parser)]
#[command(name = "rollup-dapp")]
#[command(about = "Send inputs to a rollup dapp and read back their notices")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a text input and wait for its notice.
    Send(SendArgs),
    /// Query the notice index once.
    Notice(NoticeArgs),
    /// Show the dapp's epoch and input counters.
    Status(StatusArgs),
    /// Render a route of the shell to an HTML file.
    View(ViewArgs),
}

#[derive(Args)]
struct ConnectArgs {
    /// JSON-RPC endpoint; overrides the config file.
    #[arg(long, env = "ROLLUP_DAPP_RPC_URL")]
    rpc_url: Option<String>,
    #[arg(long, env = "ROLLUP_DAPP_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
    /// GraphQL endpoint of the notice index; overrides the config file.
    #[arg(long, env = "ROLLUP_DAPP_GRAPHQL_URL")]
    graphql_url: Option<String>,
    /// Config file; default lookup applies when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser)]
struct SendArgs {
    #[command(flatten)]
    connect: ConnectArgs,
    #[arg(long)]
    input: String,
    /// Give up on the notice after this many seconds.
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,
    /// Poll at a fixed interval instead of backing off.
    #[arg(long)]
    interval_ms: Option<u64>,
    #[arg(long)]
    max_attempts: Option<u32>,
    /// Also render the hello view with the result.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser)]
struct NoticeArgs {
    #[command(flatten)]
    connect: ConnectArgs,
    #[arg(long)]
    epoch: String,
    #[arg(long)]
    input: String,
    /// Print payloads as text instead of JSON.
    #[arg(long)]
    decode: bool,
}

#[derive(Parser)]
struct StatusArgs {
    #[command(flatten)]
    connect: ConnectArgs,
}

#[derive(Parser)]
struct ViewArgs {
    #[arg(long, default_value = "/")]
    path: String,
    #[arg(long, default_value = "/")]
    base: String,
    #[arg(long)]
    out: PathBuf,
}

struct Settings {
    config: DappConfig,
    rpc_url: String,
    graphql_url: String,
}

impl ConnectArgs {
    fn settings(&self) -> Result<Settings, Box<dyn std::error::Error>> {
        let config = match &self.config {
            Some(path) => DappConfig::load_from_path(path)?,
            None => DappConfig::load()?,
        };
        let rpc_url = self
            .rpc_url
            .clone()
            .or_else(|| config.rpc_url.clone())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let graphql_url = self
            .graphql_url
            .clone()
            .or_else(|| config.graphql_url.clone())
            .unwrap_or_else(|| IndexConfig::default().base_url);
        Ok(Settings {
            config,
            rpc_url,
            graphql_url,
        })
    }
}

impl Settings {
    fn index(&self) -> Result<NoticeIndexClient, Box<dyn std::error::Error>> {
        let config = IndexConfig {
            base_url: self.graphql_url.clone(),
            ..Default::default()
        };
        Ok(NoticeIndexClient::new(config)?)
    }

    fn session(
        &self,
        poll: PollConfig,
    ) -> Result<RollupSession<AlloyRollups>, Box<dyn std::error::Error>> {
        Ok(RollupSession::new(
            self.config.address_book()?,
            self.index()?,
            poll,
        ))
    }
}

fn poll_config(args: &SendArgs) -> PollConfig {
    let timeout = Duration::from_secs(args.timeout_secs);
    let config = match args.interval_ms {
        Some(ms) => PollConfig::fixed(Duration::from_millis(ms)),
        None => PollConfig::default(),
    }
    .with_max_duration(timeout);
    match args.max_attempts {
        Some(n) => config.with_max_attempts(n),
        None => config,
    }
}

fn run_send(args: SendArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = args.connect.settings()?;
    let mut session = settings.session(poll_config(&args))?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let connection =
            LocalWallet::connection(&settings.rpc_url, args.connect.private_key.as_deref())
                .await?;
        session.setup(&connection)?;
        let submission = session.add_input(&args.input).await?;
        println!("tx\t{}", submission.transaction.hash);
        println!("epoch\t{}", submission.keys.epoch_index);
        println!("input\t{}", submission.keys.input_index);
        if let Some(ts) = submission
            .receipt
            .find_event("InputAdded")
            .and_then(ReceiptEvent::added_at)
        {
            println!("added\t{}", ts.format(&Rfc3339)?);
        }

        let cancel = submission.response.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
        let outcome = submission.response.wait().await?;
        match &outcome {
            PollOutcome::Resolved(text) => println!("notice\t{}", text),
            PollOutcome::TimedOut { attempts, elapsed } => eprintln!(
                "no notice after {} queries in {}s",
                attempts,
                elapsed.as_secs()
            ),
            PollOutcome::Cancelled => eprintln!("cancelled"),
        }

        if let Some(out) = &args.out {
            let summary = SubmissionSummary::pending(
                &args.input,
                &submission.transaction.hash.to_string(),
                submission.keys.clone(),
            )
            .with_outcome(&outcome);
            let ctx = ViewContext {
                chain_id: connection.chain_id,
                dapp_address: session.binding().map(|b| b.address.to_string()),
                submission: Some(summary),
            };
            render_to_file(&HelloView, &ctx, out)?;
            info!(path = %out.display(), "hello view written");
        }
        if !matches!(outcome, PollOutcome::Resolved(_)) {
            std::process::exit(1);
        }
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}

fn run_notice(args: NoticeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = args.connect.settings()?;
    let index = settings.index()?;
    let keys = NoticeKeys {
        epoch_index: args.epoch.clone(),
        input_index: args.input.clone(),
    };
    let rt = tokio::runtime::Runtime::new()?;
    let notices = rt.block_on(async { index.notices_for(&keys).await })?;
    info!(count = notices.len(), endpoint = %index.endpoint(), "notices fetched");
    if args.decode {
        for notice in &notices {
            println!("{}", decode_utf8_payload(&notice.payload)?);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&notices)?);
    }
    Ok(())
}

fn run_status(args: StatusArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = args.connect.settings()?;
    let mut session = settings.session(PollConfig::default())?;
    let rt = tokio::runtime::Runtime::new()?;
    let status = rt.block_on(async {
        let connection =
            LocalWallet::connection(&settings.rpc_url, args.connect.private_key.as_deref())
                .await?;
        session.setup(&connection)?;
        Ok::<_, Box<dyn std::error::Error>>(session.status().await?)
    })?;
    println!(
        "chain\t{}",
        rollup_dapp::chain::format_chain_id(status.chain_id)
    );
    println!("dapp\t{}", status.address);
    println!("epoch\t{}", status.current_epoch);
    println!("inputs\t{}", status.input_count);
    println!("finalized\t{}", status.finalized_epochs);
    Ok(())
}

fn run_view(args: ViewArgs) -> Result<(), Box<dyn std::error::Error>> {
    let router = Router::new(&args.base);
    let route = router
        .resolve(&args.path)
        .ok_or_else(|| format!("no route for {}", args.path))?;
    let view = route.instantiate();
    render_to_file(view.as_ref(), &ViewContext::default(), &args.out)?;
    info!(route = route.name, path = %args.out.display(), "view written");
    Ok(())
}
