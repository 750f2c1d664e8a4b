//! The `headcount estimate` command: one image, no server, no sink.

use anyhow::Context;
use clap::Args;
use headcount_core::{BackendOutcome, Config, CrowdLevel, Estimation, Headcount};
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the `estimate` command.
#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Image file to analyze
    #[arg(required = true)]
    pub image: PathBuf,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Serialize)]
struct BackendLine {
    backend: String,
    available: bool,
    count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct EstimateOutput {
    backends: Vec<BackendLine>,
    people_count: u32,
    crowd_level: CrowdLevel,
}

impl From<Estimation> for EstimateOutput {
    fn from(estimation: Estimation) -> Self {
        let backends = estimation
            .reports
            .into_iter()
            .map(|report| {
                let count = report.outcome.count();
                let (available, error) = match report.outcome {
                    BackendOutcome::Counted(_) => (true, None),
                    BackendOutcome::Unavailable(e) => (false, Some(e.to_string())),
                };
                BackendLine {
                    backend: report.backend,
                    available,
                    count,
                    error,
                }
            })
            .collect();

        Self {
            backends,
            people_count: estimation.estimate.count,
            crowd_level: estimation.estimate.level,
        }
    }
}

/// Execute the estimate command.
pub async fn execute(args: EstimateArgs, mut config: Config) -> anyhow::Result<()> {
    let image = std::fs::read(&args.image)
        .with_context(|| format!("Failed to read image: {}", args.image.display()))?;
    if image.is_empty() {
        anyhow::bail!("Image file is empty: {}", args.image.display());
    }

    // Local runs never write to the configured store.
    config.sink = Default::default();
    let headcount = Headcount::new(config)?;

    let output = EstimateOutput::from(headcount.estimate(&image).await);
    let json = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{json}");

    Ok(())
}
