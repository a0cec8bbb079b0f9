//! Roadblock CLI
//!
//! CLI tool for compiling and inspecting policies and for running the agent.

mod agent;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use rb_agent::{HttpProbe, TargetResolver};
use rb_compiler::{compile_policy, parse_policy, to_dnr_rules, CompiledPolicy};
use rb_core::gate;
use rb_core::hash::sha256_hex;
use rb_core::matcher::{RedirectMatcher, WildcardPattern};
use rb_core::resolver::{fallback_chain, resolve_with};

#[derive(Parser)]
#[command(name = "roadblock")]
#[command(about = "Roadblock policy compiler and URL interception agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Compiled block rules, redirect rules and lock
    #[default]
    Json,
    /// Block rules as declarative filtering rules
    Dnr,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a policy document
    Compile {
        /// Policy file (YAML or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Print the digest to use as a policy's `authn`
    Hash {
        secret: String,
    },

    /// Check a secret against a policy's lock
    Verify {
        /// Policy file
        #[arg(short, long)]
        input: PathBuf,

        secret: String,
    },

    /// Show how a policy treats a URL
    Check {
        /// Policy file
        #[arg(short, long)]
        input: PathBuf,

        url: String,

        /// Treat remote targets as reachable instead of probing them
        #[arg(long)]
        no_probe: bool,

        /// Probe timeout in milliseconds
        #[arg(long, default_value_t = 5000)]
        probe_timeout_ms: u64,
    },

    /// Run the agent; navigation events are read from stdin
    Run(agent::RunArgs),
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { input, format } => cmd_compile(&input, format),
        Commands::Hash { secret } => cmd_hash(&secret),
        Commands::Verify { input, secret } => cmd_verify(&input, &secret),
        Commands::Check {
            input,
            url,
            no_probe,
            probe_timeout_ms,
        } => cmd_check(&input, &url, no_probe, Duration::from_millis(probe_timeout_ms)),
        Commands::Run(args) => agent::cmd_run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_policy(input: &Path) -> Result<CompiledPolicy, String> {
    let text = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;

    let start = Instant::now();
    let doc = parse_policy(&text)
        .map_err(|e| format!("Invalid policy '{}': {}", input.display(), e))?;
    let (policy, stats) = compile_policy(&doc);

    tracing::info!(
        entries = stats.entries,
        skipped = stats.skipped,
        block = stats.block_rules,
        redirect = stats.redirect_rules,
        "Compiled '{}' in {:.1}ms",
        input.display(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(policy)
}

fn cmd_compile(input: &Path, format: OutputFormat) -> Result<(), String> {
    let policy = load_policy(input)?;

    let json = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&policy),
        OutputFormat::Dnr => serde_json::to_string_pretty(&to_dnr_rules(&policy.block_rules)),
    }
    .map_err(|e| format!("Failed to serialize: {}", e))?;

    println!("{json}");
    Ok(())
}

fn cmd_hash(secret: &str) -> Result<(), String> {
    if secret.is_empty() {
        return Err("Secret must not be empty".to_string());
    }
    println!("{}", sha256_hex(secret.as_bytes()));
    Ok(())
}

fn cmd_verify(input: &Path, secret: &str) -> Result<(), String> {
    let policy = load_policy(input)?;
    if !policy.lock.is_locked() {
        return Err("Policy is not locked".to_string());
    }
    if gate::verify(secret, policy.lock.digest_hex.as_deref()) {
        println!("Secret accepted");
        Ok(())
    } else {
        Err("Secret rejected".to_string())
    }
}

fn cmd_check(input: &Path, url: &str, no_probe: bool, probe_timeout: Duration) -> Result<(), String> {
    let policy = load_policy(input)?;

    let blocking = policy.block_rules.iter().find(|rule| {
        WildcardPattern::compile(&rule.pattern).map_or(false, |pattern| pattern.test(url))
    });
    if let Some(rule) = blocking {
        println!("Blocked by rule #{} ({})", rule.id, rule.pattern);
        return Ok(());
    }

    let matcher = RedirectMatcher::new(&policy.redirect_rules);
    if matcher.first_match(url).is_none() {
        println!("No rule matches");
        return Ok(());
    }

    if no_probe {
        for rule in matcher.matches(url) {
            let chain = fallback_chain(&rule.own, &rule.fallback);
            if let Some(target) = resolve_with(&chain, |_| true) {
                println!("Redirect by '{}' to {}", rule.pattern, target);
                return Ok(());
            }
        }
    } else {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        let resolver = TargetResolver::new(Arc::new(HttpProbe::new(client)), probe_timeout);

        let found = runtime.block_on(async {
            for rule in matcher.matches(url) {
                if let Some(target) = resolver.resolve(&rule.own, &rule.fallback).await {
                    return Some((rule.pattern.clone(), target));
                }
            }
            None
        });
        if let Some((pattern, target)) = found {
            println!("Redirect by '{}' to {}", pattern, target);
            return Ok(());
        }
    }

    println!("Matched, but no redirect target is available; navigation proceeds");
    Ok(())
}
