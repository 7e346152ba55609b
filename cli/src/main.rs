use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mailverify_core::batch::csv as batch_csv;
use mailverify_core::batch::{BatchExecutor, BatchStream, InMemoryJobQueue, InMemoryJobStore};
use mailverify_core::cache::InMemoryCacheStore;
use mailverify_core::clock::SystemClock;
use mailverify_core::config::EngineConfig;
use mailverify_core::dns::TrustDnsMxResolver;
use mailverify_core::enrich::Enricher;
use mailverify_core::governor::CacheBackedGovernor;
use mailverify_core::notify::NoopNotifier;
use mailverify_core::pipeline::{VerifierPipeline, VerifyOptions};

/// Check whether an email address exists, without sending any email.
#[derive(Parser)]
#[command(name = "mailverify", version, about)]
struct Cli {
	/// Path to a TOML config file. Falls back to built-in defaults.
	#[arg(long, env = "MAILVERIFY_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Verify a single email address and print the result as JSON.
	Verify { email: String },
	/// Verify a single email address and print enrichment alongside it.
	Enrich { email: String },
	/// Submit a list of emails for asynchronous bulk verification, run the
	/// worker loop to completion, and print the results.
	SubmitBulk {
		owner: String,
		#[arg(required = true)]
		emails: Vec<String>,
		/// Result format: `json` (the batch job record) or `csv` (per-email rows).
		#[arg(long, default_value = "json")]
		format: OutputFormat,
	},
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
	Json,
	Csv,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<EngineConfig> {
	match path {
		Some(path) => {
			let contents = std::fs::read_to_string(&path)?;
			EngineConfig::from_toml_str(&contents)
		}
		None => Ok(EngineConfig::default().validate()),
	}
}

fn build_pipeline(config: EngineConfig) -> anyhow::Result<VerifierPipeline> {
	let clock = Arc::new(SystemClock);
	let cache = Arc::new(InMemoryCacheStore::new(clock.clone()));
	let dns = Arc::new(TrustDnsMxResolver::new(
		&config.dns_servers,
		Duration::from_millis(config.dns_timeout_ms),
		cache.clone(),
		Duration::from_secs(config.cache_ttl_mx_secs),
	)?);
	let governor = Arc::new(CacheBackedGovernor::new(
		cache.clone(),
		config.rate_limits.clone(),
		config.ip_pool.clone(),
	));

	Ok(VerifierPipeline::new(cache, dns, governor, config, clock))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	env_logger::init();

	let cli = Cli::parse();
	let config = load_config(cli.config)?;

	match cli.command {
		Command::Verify { email } => {
			let pipeline = build_pipeline(config)?;
			let result = pipeline.verify(&email, &VerifyOptions::default()).await;
			println!("{}", serde_json::to_string_pretty(&result)?);
		}
		Command::Enrich { email } => {
			let pipeline = build_pipeline(config)?;
			let enricher = Enricher::new(&pipeline);
			let result = enricher.enrich(&email, &VerifyOptions::default()).await;
			println!("{}", serde_json::to_string_pretty(&result)?);
		}
		Command::SubmitBulk { owner, emails, format } => {
			let pipeline = Arc::new(build_pipeline(config)?);
			let executor = BatchExecutor::new(
				pipeline,
				Arc::new(InMemoryJobStore::default()),
				Arc::new(InMemoryJobQueue::default()),
				Arc::new(NoopNotifier),
			);
			let (batch_id, _job_id) = executor.submit_bulk(&owner, emails, None, None).await?;
			while executor.run_once(BatchStream::Bulk).await {}

			match format {
				OutputFormat::Json => {
					let job = executor.get_batch(&batch_id, &owner).await;
					println!("{}", serde_json::to_string_pretty(&job)?);
				}
				OutputFormat::Csv => {
					let results = executor.get_batch_results(&batch_id, &owner).await;
					print!("{}", batch_csv::export(&results)?);
				}
			}
		}
	}

	Ok(())
}
