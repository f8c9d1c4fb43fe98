//! RELX CLI - Command-line interface
//!
//! Usage:
//!   relx predict <file-or-dir>...
//!   relx serve
//!   relx deploy --model-uri <uri>

mod deploy;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use relx_api::{serve, state::AppState, telemetry::init_tracing};
use relx_core::{AppConfig, DeployMode};
use relx_pipeline::PredictionFacade;

use crate::deploy::{DeployRequest, DeploymentTarget, HttpDeploymentTarget};

#[derive(Parser)]
#[command(name = "relx")]
#[command(about = "Relation extraction from richly formatted documents")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML); environment variables override it
    #[arg(short, long, global = true, env = "RELX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the relations found in HTML documents, one per line
    Predict {
        /// HTML files or directories of HTML files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Emit predictions as JSON
        #[arg(long)]
        json: bool,
        /// Decision threshold on the positive-label probability
        #[arg(long)]
        threshold: Option<f32>,
        /// Worker threads per stage
        #[arg(long)]
        parallelism: Option<usize>,
    },
    /// Serve the model over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Register the model and its serving image with the hosting platform
    Deploy {
        #[arg(long)]
        app_name: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        model_uri: Option<String>,
        #[arg(long)]
        execution_role_arn: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        #[arg(long)]
        mode: Option<DeployMode>,
        /// Validate and print the request without sending it
        #[arg(long)]
        dry_run: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Predict {
            files,
            json,
            threshold,
            parallelism,
        } => {
            if let Some(threshold) = threshold {
                config.pipeline.threshold = threshold;
            }
            if let Some(parallelism) = parallelism {
                config.pipeline.parallelism = parallelism;
            }
            config.validate()?;
            init_tracing(&config.logging);

            let predictions = tokio::task::spawn_blocking(move || {
                let mut facade = PredictionFacade::from_config(&config)?;
                facade.predict(&files)
            })
            .await??;

            if json {
                println!("{}", serde_json::to_string_pretty(&predictions)?);
            } else {
                for prediction in &predictions {
                    for relation in &prediction.relations {
                        println!("{relation}");
                    }
                }
            }
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            init_tracing(&config.logging);

            let state = AppState::from_config(config).context("failed to load model artifacts")?;
            serve(Arc::new(state)).await?;
        }
        Commands::Deploy {
            app_name,
            region,
            model_uri,
            execution_role_arn,
            image_url,
            mode,
            dry_run,
        } => {
            init_tracing(&config.logging);
            let deploy = &mut config.deploy;
            if let Some(app_name) = app_name {
                deploy.app_name = app_name;
            }
            if let Some(region) = region {
                deploy.region = region;
            }
            if model_uri.is_some() {
                deploy.model_uri = model_uri;
            }
            if execution_role_arn.is_some() {
                deploy.execution_role_arn = execution_role_arn;
            }
            if image_url.is_some() {
                deploy.image_url = image_url;
            }
            if let Some(mode) = mode {
                deploy.mode = mode;
            }

            let request = DeployRequest::from_config(deploy)?;
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&request)?);
                return Ok(());
            }

            let target = HttpDeploymentTarget::from_config(deploy)?;
            let receipt = target.deploy(&request).await?;
            println!(
                "Deployed {} ({}){}",
                receipt.app_name,
                receipt.status,
                receipt
                    .deployment_id
                    .map(|id| format!(" as {id}"))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_predict_requires_files() {
        assert!(Cli::try_parse_from(["relx", "predict"]).is_err());

        let cli = Cli::try_parse_from(["relx", "predict", "a.html", "docs", "--threshold", "0.7"])
            .unwrap();
        match cli.command {
            Commands::Predict {
                files, threshold, ..
            } => {
                assert_eq!(files, vec![PathBuf::from("a.html"), PathBuf::from("docs")]);
                assert_eq!(threshold, Some(0.7));
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_deploy_mode_flag() {
        let cli = Cli::try_parse_from(["relx", "deploy", "--mode", "replace", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Deploy { mode, dry_run, .. } => {
                assert_eq!(mode, Some(DeployMode::Replace));
                assert!(dry_run);
            }
            _ => panic!("expected deploy"),
        }
        assert!(Cli::try_parse_from(["relx", "deploy", "--mode", "upsert"]).is_err());
    }
}
