//! `eil replay`: stream energy maps through one layer.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use eil_core::{EilConfig, EnergyIntelligenceLayer, DEFAULT_CLUSTER, DEFAULT_NODE};
use ndarray::Array2;
use serde::Deserialize;
use tracing::info;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines input; "-" reads stdin
    pub input: PathBuf,

    /// Override the MicroAdapt seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print layer stats as a final JSON line
    #[arg(long)]
    pub stats: bool,
}

/// One input line.
#[derive(Debug, Deserialize)]
struct ReplayRecord {
    energy_map: Vec<Vec<f64>>,
    domain: String,
    #[serde(default)]
    cluster: Option<String>,
    #[serde(default)]
    node: Option<String>,
    #[serde(default)]
    hypothesis: Option<serde_json::Value>,
}

pub fn execute(args: ReplayArgs, mut config: EilConfig) -> anyhow::Result<()> {
    if args.seed.is_some() {
        config.microadapt.seed = args.seed;
    }
    let mut layer = EnergyIntelligenceLayer::with_thermodynamic_detector(config)?;

    let reader: Box<dyn BufRead> = if args.input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open {}", args.input.display()))?;
        Box::new(BufReader::new(file))
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut ticks = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("failed to read line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(&line)
            .with_context(|| format!("line {line_no}: malformed record"))?;
        let energy_map =
            to_array(record.energy_map).with_context(|| format!("line {line_no}: bad energy_map"))?;

        let decision = layer
            .process(
                &energy_map,
                &record.domain,
                record.cluster.as_deref().unwrap_or(DEFAULT_CLUSTER),
                record.node.as_deref().unwrap_or(DEFAULT_NODE),
                record.hypothesis,
            )
            .with_context(|| format!("line {line_no}: processing failed"))?;

        serde_json::to_writer(&mut out, &decision)?;
        writeln!(out)?;
        ticks += 1;
    }

    if args.stats {
        serde_json::to_writer(&mut out, &layer.get_stats())?;
        writeln!(out)?;
    }
    info!(ticks, "replay complete");
    Ok(())
}

/// Rows of equal length into a 2D array.
fn to_array(rows: Vec<Vec<f64>>) -> anyhow::Result<Array2<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        bail!("row {i} has {} columns, expected {n_cols}", row.len());
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((n_rows, n_cols), flat)?)
}
