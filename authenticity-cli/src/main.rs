//! Authenticity command line.
//!
//! Runs the detection engine over a YAML fixture world and prints JSON.
//!
//! # Usage
//!
//! ```bash
//! # Verify a product and print the record; --save appends it to world.yaml
//! authenticity verify --world world.yaml --product <uuid> --verifier <uuid> \
//!     --location "Lagos pharmacy" --fingerprint <hex> --save
//!
//! # Verdict, recent history and issuer for one product
//! authenticity report --world world.yaml --product <uuid>
//!
//! # Derive a new fingerprint
//! authenticity fingerprint --name "Amoxil 500mg" --batch B-2026-001
//! ```

mod world;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use authenticity_core::{fingerprint, EngineConfig, VerificationContext};

use crate::world::World;

/// Exit status when the verdict is negative.
const EXIT_NOT_AUTHENTIC: u8 = 2;

#[derive(Parser)]
#[command(name = "authenticity")]
#[command(version)]
#[command(about = "Multi-signal product authenticity checks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine config YAML (falls back to AUTHENTICITY_* variables)
    #[arg(long, global = true, env = "AUTHENTICITY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a product and print the resulting record (written back to the world with --save)
    Verify {
        #[arg(long)]
        world: PathBuf,

        #[arg(long)]
        product: Uuid,

        #[arg(long)]
        verifier: Uuid,

        #[arg(long)]
        location: String,

        /// Fingerprint read from the physical unit
        #[arg(long)]
        fingerprint: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Idempotency key; random when omitted
        #[arg(long)]
        attempt_id: Option<Uuid>,

        /// Reference instant (RFC 3339); now when omitted
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// IPFS-style API base URL for primary snapshots
        #[arg(long, env = "AUTHENTICITY_CONTENT_STORE_URL")]
        content_store_url: Option<String>,

        /// Append the verification record to the world file
        #[arg(long)]
        save: bool,
    },

    /// Print the verdict, recent verifications and issuer of a product
    Report {
        #[arg(long)]
        world: PathBuf,

        #[arg(long)]
        product: Uuid,

        #[arg(long)]
        at: Option<DateTime<Utc>>,

        #[arg(long, env = "AUTHENTICITY_CONTENT_STORE_URL")]
        content_store_url: Option<String>,
    },

    /// Derive a fingerprint for a new product unit
    Fingerprint {
        #[arg(long)]
        name: String,

        #[arg(long)]
        batch: String,

        #[arg(long)]
        manufactured: Option<DateTime<Utc>>,

        /// Fixed nonce for reproducible output
        #[arg(long)]
        nonce: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authenticity_core=info,authenticity=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::from_env()?,
    };
    tracing::debug!(?config, "engine config loaded");

    match cli.command {
        Commands::Verify {
            world,
            product,
            verifier,
            location,
            fingerprint,
            notes,
            attempt_id,
            at,
            content_store_url,
            save,
        } => {
            let mut fixture = World::from_file(&world)?;
            let (engine, store) = fixture.build_engine(config, content_store_url.as_deref())?;

            let mut ctx = VerificationContext::new(verifier, location);
            if let Some(notes) = notes {
                ctx = ctx.with_notes(notes);
            }
            if let Some(attempt_id) = attempt_id {
                ctx = ctx.with_attempt_id(attempt_id);
            }
            if let Some(at) = at {
                ctx = ctx.at(at);
            }

            let outcome = engine
                .verify(product, &ctx, fingerprint.as_deref())
                .await
                .with_context(|| format!("verifying product {product}"))?;
            if save {
                fixture.verifications = store.verifications().await;
                fixture.save(&world)?;
                tracing::info!(world = %world.display(), record_id = %outcome.record.id, "world updated");
            }
            print_json(&serde_json::json!({
                "verdict": outcome.verdict,
                "recommendation": outcome.verdict.recommendation(),
                "record": outcome.record,
            }))?;

            if outcome.verdict.is_authentic {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_NOT_AUTHENTIC))
            }
        }

        Commands::Report {
            world,
            product,
            at,
            content_store_url,
        } => {
            let (engine, _store) =
                World::from_file(&world)?.build_engine(config, content_store_url.as_deref())?;
            let report = engine
                .product_report(product, at.unwrap_or_else(Utc::now))
                .await
                .with_context(|| format!("reporting on product {product}"))?;
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Fingerprint {
            name,
            batch,
            manufactured,
            nonce,
        } => {
            let nonce = nonce.unwrap_or_else(Uuid::new_v4);
            let fp = fingerprint::derive(&name, &batch, manufactured, nonce);
            print_json(&serde_json::json!({ "fingerprint": fp, "nonce": nonce }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_verify_arguments() {
        let cli = Cli::try_parse_from([
            "authenticity",
            "verify",
            "--world",
            "world.yaml",
            "--product",
            "00000000-0000-0000-0000-000000000001",
            "--verifier",
            "00000000-0000-0000-0000-0000000001f4",
            "--location",
            "Lagos pharmacy",
            "--at",
            "2026-10-01T12:00:00Z",
        ])
        .unwrap();
        match cli.command {
            Commands::Verify {
                product,
                at,
                fingerprint,
                save,
                ..
            } => {
                assert_eq!(product, Uuid::from_u128(1));
                assert!(at.is_some());
                assert!(fingerprint.is_none());
                assert!(!save);
            }
            _ => panic!("expected verify"),
        }
    }

    #[test]
    fn verify_help_describes_save() {
        let cmd = Cli::command();
        let verify = cmd.find_subcommand("verify").unwrap();
        let about = verify.get_about().unwrap().to_string();
        assert!(about.contains("--save"), "{about}");
        assert!(verify.get_arguments().any(|a| a.get_id() == "save"));
    }
}
