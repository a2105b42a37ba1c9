//! Hospital Outcomes - command line front-end
//!
//! A thin adapter over the cohort engine: it parses the selection, prints the
//! report and writes exports. All filtering lives in the library.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use hospital_outcomes::cohort::{hospital_options, idn_options};
use hospital_outcomes::stats::DatasetOverview;
use hospital_outcomes::{
    load_prepared, AnalyzerConfig, CohortEngine, CohortReport, CohortRequest, ComparatorSpec,
    Metric, Selection, SimilarityFilter,
};
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "hospital-outcomes",
    version,
    about = "Compare a hospital or health system against a peer cohort"
)]
#[command(group(ArgGroup::new("index").args(["hospital", "idn"])))]
#[command(group(ArgGroup::new("similarity").args(["similar_beds", "similar_volume"])))]
struct Cli {
    /// Hospital table (CSV with a header row)
    data: PathBuf,

    /// JSON settings file
    #[arg(long, value_name = "JSON")]
    config: Option<PathBuf>,

    /// Index hospital: provider id or "{provider id} - {name}" label
    #[arg(long)]
    hospital: Option<String>,

    /// Index health system (IDN)
    #[arg(long)]
    idn: Option<String>,

    /// Comparator group: all, same-idn or same-state
    #[arg(long, default_value = "all")]
    compare: ComparatorSpec,

    /// Keep comparators within PCT percent of the index bed count
    #[arg(long, value_name = "PCT")]
    similar_beds: Option<Option<f64>>,

    /// Keep comparators within PCT percent of the index Medicare claim volume
    #[arg(long, value_name = "PCT")]
    similar_volume: Option<Option<f64>>,

    /// Metric for the comparison, distribution and exported ranking
    #[arg(long, default_value = "readmission-rate")]
    metric: Metric,

    /// Export every comparator row instead of the index plus extremes
    #[arg(long)]
    show_all: bool,

    /// Write the displayed rows to a CSV file
    #[arg(long, value_name = "CSV")]
    export: Option<PathBuf>,

    /// Write the whole prepared table to a CSV file
    #[arg(long, value_name = "CSV")]
    export_all: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// List hospital labels and exit
    #[arg(long)]
    list_hospitals: bool,

    /// List IDNs and exit
    #[arg(long)]
    list_idns: bool,
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::from_json_file(path)?,
        None => AnalyzerConfig::default(),
    };
    config.display.sort_metric = cli.metric;
    if cli.show_all {
        config.display.show_all = true;
    }

    let table = load_prepared(&cli.data, &config)
        .with_context(|| format!("loading {}", cli.data.display()))?;

    if cli.list_hospitals {
        for label in hospital_options(&table) {
            println!("{}", label);
        }
        return Ok(());
    }
    if cli.list_idns {
        for idn in idn_options(&table) {
            println!("{}", idn);
        }
        return Ok(());
    }

    if let Some(path) = &cli.export_all {
        table.write_csv(create_output(path)?)?;
        info!("Exported {} hospitals to {}", table.len(), path.display());
    }

    let selection = match (&cli.hospital, &cli.idn) {
        (Some(label), _) => Selection::from_hospital_label(label),
        (None, Some(idn)) => Selection::System(idn.clone()),
        (None, None) => {
            let overview = DatasetOverview::from_table(&table);
            if cli.json {
                print_json(&overview)?;
            } else {
                print!("{}", overview);
                println!("Select a hospital (--hospital) or IDN (--idn) to begin analysis");
            }
            return Ok(());
        }
    };

    if !ComparatorSpec::available_for(&selection).contains(&cli.compare) {
        warn!(
            "{} is only available for a single hospital; comparing against all hospitals",
            cli.compare
        );
    }

    let mut request = CohortRequest::new(selection, cli.compare);
    if let Some(pct) = cli.similar_beds {
        request = request.with_similarity(SimilarityFilter::BedCount {
            tolerance_pct: pct.unwrap_or(config.similarity_tolerance_pct),
        });
    }
    if let Some(pct) = cli.similar_volume {
        request = request.with_similarity(SimilarityFilter::ProcedureVolume {
            tolerance_pct: pct.unwrap_or(config.similarity_tolerance_pct),
        });
    }

    let cohort = CohortEngine::build(&table, &request);
    if cohort.index.is_empty() {
        warn!("No data found for {:?}", request.selection);
    }

    let report = CohortReport::from_cohort(&cohort, request.comparator, cli.metric, &config);
    if cli.json {
        print_json(&report)?;
    } else {
        print!("{}", report);
    }

    if let Some(path) = &cli.export {
        let rows = CohortEngine::display_rows(&cohort.index, &cohort.comparator, &config.display);
        rows.write_csv(create_output(path)?)?;
        info!("Exported {} hospitals to {}", rows.len(), path.display());
    }

    Ok(())
}
