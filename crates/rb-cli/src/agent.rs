use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use rb_agent::{
    AgentConfig, ChannelSink, Collaborators, Command, FileStore, HttpPolicySource, HttpProbe,
    KeyValueStore, MemoryEngine, MemoryStore, NavigationEvent, Orchestrator,
};
use rb_core::gate::UnlockSession;

#[derive(Args)]
pub struct RunArgs {
    /// Agent configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Policy URL to store before starting
    #[arg(long)]
    policy_url: Option<String>,

    /// Password for a locked policy, needed to change the policy URL
    #[arg(long)]
    password: Option<String>,

    /// JSON state file (overrides the configuration)
    #[arg(long)]
    state: Option<PathBuf>,
}

pub fn cmd_run(args: RunArgs) -> Result<(), String> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)
            .map_err(|e| format!("Failed to load '{}': {}", path.display(), e))?,
        None => AgentConfig::default(),
    };
    if let Some(state) = args.state.clone() {
        config.state_path = Some(state);
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(run_async(config, args))
}

async fn run_async(config: AgentConfig, args: RunArgs) -> Result<(), String> {
    let fetch_client = reqwest::Client::builder()
        .timeout(config.fetch_timeout())
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
    let probe_client = reqwest::Client::builder()
        .timeout(config.probe_timeout())
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    let store: Arc<dyn KeyValueStore> = match &config.state_path {
        Some(path) => Arc::new(
            FileStore::open(path)
                .await
                .map_err(|e| format!("Failed to open '{}': {}", path.display(), e))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    let (sink, mut overrides) = ChannelSink::new();
    let agent = Arc::new(Orchestrator::new(
        config,
        Collaborators {
            source: Arc::new(HttpPolicySource::new(fetch_client)),
            probe: Arc::new(HttpProbe::new(probe_client)),
            engine: Arc::new(MemoryEngine::new()),
            sink: Arc::new(sink),
            store,
        },
    ));

    if let Some(url) = &args.policy_url {
        let mut session = UnlockSession::new();
        if let Some(password) = &args.password {
            agent
                .unlock(&mut session, password)
                .await
                .map_err(|e| e.to_string())?;
        }
        agent
            .set_policy_url(url, &session)
            .await
            .map_err(|e| e.to_string())?;
    }

    let (tx, rx) = mpsc::channel(64);
    let worker = tokio::spawn(agent.clone().run(rx));

    let printer = tokio::spawn(async move {
        while let Some(redirect) = overrides.recv().await {
            match serde_json::to_string(&redirect) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!("Failed to serialize override: {e}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| format!("Failed to read stdin: {}", e))?
    {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "refresh" => send(&tx, Command::Refresh).await?,
            "status" => {
                let (reply, answer) = oneshot::channel();
                send(&tx, Command::Status { reply }).await?;
                match answer.await {
                    Ok(Ok(status)) => match serde_json::to_string_pretty(&status) {
                        Ok(json) => println!("{json}"),
                        Err(e) => tracing::error!("Failed to serialize status: {e}"),
                    },
                    Ok(Err(e)) => tracing::error!("Status unavailable: {e}"),
                    Err(_) => tracing::error!("Agent stopped"),
                }
            }
            _ => match parse_navigation(line) {
                Some(event) => send(&tx, Command::Navigate(event)).await?,
                None => tracing::warn!("Expected '<tabId> <url>', got '{line}'"),
            },
        }
    }

    send(&tx, Command::Shutdown).await?;
    worker.await.map_err(|e| format!("Agent task failed: {}", e))?;

    // Every override has been sent once the agent is gone.
    drop(agent);
    printer.await.map_err(|e| format!("Output task failed: {}", e))?;
    Ok(())
}

async fn send(tx: &mpsc::Sender<Command>, command: Command) -> Result<(), String> {
    tx.send(command)
        .await
        .map_err(|_| "Agent stopped".to_string())
}

/// `<tabId> <url>` as a committed navigation.
fn parse_navigation(line: &str) -> Option<NavigationEvent> {
    let (tab, url) = line.split_once(char::is_whitespace)?;
    let tab_id = tab.parse().ok()?;
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    Some(NavigationEvent::loading(tab_id, url))
}
