//! One-shot export of the client map to a static HTML file.

use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use clientmap::config::Config;
use clientmap::models::{ClientRecord, DepartmentSelection};
use clientmap::pipeline::{MapView, PipelineError, Session};
use clientmap::render::render_map;

#[derive(Parser, Debug)]
#[command(name = "export")]
#[command(about = "Geocode the client export and write the map as HTML")]
struct Args {
    /// Department to show, or "all"
    #[arg(short, long)]
    department: Option<String>,

    /// Output HTML file (defaults to map.output_file from the config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OpenCage API key
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the available departments and exit
    #[arg(long)]
    list_departments: bool,

    /// Also print the enriched table as CSV on stdout
    #[arg(long)]
    table: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load(args.config.as_deref())?.with_api_key(args.api_key);
    let (clients, boundaries, geocoder) = config.build()?;
    let mut session = Session::new(clients, boundaries, geocoder);

    if args.list_departments {
        for department in session.departments().await? {
            println!("{}", department);
        }
        return Ok(());
    }

    let selection = DepartmentSelection::from_param(args.department.as_deref());
    let selected = match session.select(&selection).await {
        Ok(s) => s,
        Err(PipelineError::SelectionRequired) => {
            bail!("Select a department with --department (see --list-departments), or pass --department all")
        }
        Err(e) => return Err(e.into()),
    };

    info!("Geocoding {} clients for {}", selected.len(), selection);

    let pb = ProgressBar::new(selected.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let enriched = session.enrich_selected(selected, |_| pb.inc(1)).await;
    pb.finish_and_clear();
    let enriched = enriched?;

    for address in &enriched.unresolved {
        warn!("Not on the map: {}", address);
    }

    let boundaries = session.boundaries().await?;
    let view = MapView {
        selection,
        clients: enriched,
        boundaries,
    };

    let output = args.output.unwrap_or_else(|| config.map.output_file.clone());
    let html = render_map(&view, &config.render_options());
    fs::write(&output, html)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Wrote map with {} clients to {}",
        view.clients.records.len(),
        output.display()
    );

    if args.table {
        write_table(&view.clients.records)?;
    }

    Ok(())
}

/// Enriched rows as CSV on stdout
fn write_table(records: &[ClientRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "Name",
        "Address",
        "PostalCode",
        "Locality",
        "AdministrativeArea2",
        "lat",
        "lng",
    ])?;

    for r in records {
        writer.write_record([
            r.name.clone(),
            r.address.clone(),
            r.postal_code.clone(),
            r.locality.clone(),
            r.administrative_area.clone(),
            r.latitude.map(|v| v.to_string()).unwrap_or_default(),
            r.longitude.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
