//! vdlp-proof - proof of contribution for one voice submission
//!
//! Reads the submission from the input directory, evaluates it and writes
//! `results.json` to the output directory. Exit status is non-zero (and no
//! file is written) when the proof could not be produced.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vdlp_common::config::IdentityPolicy;
use vdlp_common::ProofConfig;
use vdlp_proof::db::fingerprints;
use vdlp_proof::{Collaborators, ProofOrchestrator, Submission};

#[derive(Parser, Debug)]
#[command(name = "vdlp-proof")]
#[command(about = "Proof of contribution for voice data pool submissions", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "VDLP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the submission
    #[arg(long, env = "VDLP_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Directory receiving results.json
    #[arg(long, env = "VDLP_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// SQLite database holding the corpus and identities
    #[arg(long, env = "VDLP_DATABASE")]
    database: Option<PathBuf>,

    /// Contributor identity when the submission carries none
    #[arg(long, env = "VDLP_IDENTITY")]
    identity: Option<String>,

    /// Data pool identifier
    #[arg(long, env = "VDLP_DLP_ID")]
    dlp_id: Option<u64>,

    /// Require identities to be registered beforehand
    #[arg(long)]
    strict_identity: bool,

    /// Inference service base URL
    #[arg(long, env = "VDLP_INFERENCE_URL")]
    inference_url: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ProofConfig) {
        if let Some(dir) = self.input_dir {
            config.input_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(path) = self.database {
            config.database_path = Some(path);
        }
        if let Some(identity) = self.identity {
            config.identity = Some(identity);
        }
        if let Some(dlp_id) = self.dlp_id {
            config.dlp_id = dlp_id;
        }
        if self.strict_identity {
            config.identity_policy = IdentityPolicy::Strict;
        }
        if let Some(url) = self.inference_url {
            config.inference.base_url = url;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vdlp_proof=info,vdlp_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Proof generation failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    info!(
        "Starting vdlp-proof {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("VDLP_GIT_HASH")
    );

    let mut config =
        ProofConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.apply_identity_env();
    config.validate().context("Invalid configuration")?;

    // Missing input must not touch the store, so resolve before opening it
    let submission = Submission::resolve(
        &config.input_dir,
        &config.audio_extensions,
        config.identity.as_deref(),
    )?;
    info!(
        "Submission {}: {}",
        submission.submission_id,
        submission.audio_path.display()
    );

    let db_path = config.resolved_database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!("Database: {}", db_path.display());

    let pool = vdlp_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    {
        let mut conn = pool.acquire().await?;
        fingerprints::purge_stale_reservations(&mut conn, config.reservation_ttl_secs).await?;
    }

    let collaborators =
        Collaborators::from_config(&config).context("Failed to set up collaborators")?;
    let output_dir = config.output_dir.clone();
    let orchestrator = ProofOrchestrator::new(pool.clone(), config, collaborators)?;

    let record = orchestrator.process(&submission).await?;
    record.write_results(&output_dir)?;

    pool.close().await;
    Ok(())
}
