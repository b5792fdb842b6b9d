use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use gearmotor_qc::fetch::{FileFetcher, HttpFetcher, SourceFetcher, DEFAULT_FETCH_TIMEOUT};
use gearmotor_qc::qr;
use gearmotor_qc::record::{ArtifactLinks, InspectionRecord, SerialNumber};
use gearmotor_qc::report::{RenderedDocument, ReportAssets, ReportBuilder};
use gearmotor_qc::store::{JsonDirStore, RecordStore};
use gearmotor_qc::warranty::{coverage_window, CoverageStatus};

/// Gear-motor QC inspection reports from the command line.
///
/// Fonts must be present under `assets/fonts` next to the binary or in the
/// crate sources, or be provided via the `QC_REPORT_FONTS_DIR` environment
/// variable before rendering.
#[derive(Parser)]
#[command(author, version, about = "Gear-motor QC inspection reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a record JSON file to a PDF.
    Render {
        /// Inspection record as JSON.
        record: PathBuf,

        /// Output PDF path; defaults to `<serial>.pdf`.
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Render a stored record, write its PDF and QR code and link them to the record.
    Publish {
        /// Serial of the record to publish.
        serial: String,

        /// Directory holding `<serial>.json` records.
        #[arg(long, default_value = "records")]
        store: PathBuf,

        /// Directory receiving `<serial>.pdf` and `<serial>.png`.
        #[arg(long, default_value = "published")]
        out_dir: PathBuf,

        /// Public URL prefix the output directory is served under.
        #[arg(long)]
        base_url: Option<String>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Print the warranty window for a document date and term.
    Warranty {
        /// Document date, e.g. `2025-01-24`; defaults to today.
        #[arg(long)]
        date: Option<String>,

        /// Warranty term in months (18, 24 or 36).
        #[arg(long)]
        term: String,

        /// Day to evaluate coverage on; defaults to today.
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Encode text as a QR code PNG.
    Qr {
        data: String,

        #[arg(short, long, default_value = "qr.png")]
        out: PathBuf,
    },

    /// Print a serial number for an inspection submitted now.
    Serial,
}

#[derive(Args)]
struct RenderArgs {
    /// Directory relative image paths are resolved against.
    #[arg(long)]
    images_root: Option<PathBuf>,

    /// Header logo image.
    #[arg(long)]
    logo: Option<PathBuf>,

    /// "Passed" badge image.
    #[arg(long)]
    badge: Option<PathBuf>,

    /// Explicit photo captions in document order.
    #[arg(long = "label")]
    labels: Vec<String>,

    /// Timeout for downloading remote photos, in seconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT.as_secs())]
    timeout: u64,
}

impl RenderArgs {
    fn render(&self, record: &InspectionRecord) -> Result<RenderedDocument, Box<dyn Error>> {
        let mut assets = ReportAssets::load_default()?;
        if let Some(logo) = &self.logo {
            assets = assets.with_logo(fs::read(logo)?);
        }
        if let Some(badge) = &self.badge {
            assets = assets.with_badge(fs::read(badge)?);
        }

        let mut files = FileFetcher::new();
        if let Some(root) = &self.images_root {
            files = files.with_root(root);
        }
        let http = HttpFetcher::new(Duration::from_secs(self.timeout))?;
        let fetcher = SourceFetcher::new(files, Some(http));

        let document = ReportBuilder::new(&assets, &fetcher)
            .with_labels(self.labels.iter().cloned())
            .render(record)?;

        for report in document.images.iter().filter(|report| !report.is_placed()) {
            eprintln!("Skipped photo {} ({})", report.index + 1, report.label);
        }
        Ok(document)
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render {
            record,
            out,
            render,
        } => render_record(&record, out, &render),
        Commands::Publish {
            serial,
            store,
            out_dir,
            base_url,
            render,
        } => publish(
            &SerialNumber::new(serial),
            &store,
            &out_dir,
            base_url.as_deref(),
            &render,
        ),
        Commands::Warranty { date, term, today } => {
            warranty(date.as_deref(), &term, today.unwrap_or_else(|| Local::now().date_naive()))
        }
        Commands::Qr { data, out } => write_qr(&data, &out),
        Commands::Serial => {
            println!("{}", SerialNumber::from_timestamp(Local::now().naive_local()));
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn render_record(
    path: &Path,
    out: Option<PathBuf>,
    args: &RenderArgs,
) -> Result<(), Box<dyn Error>> {
    let record: InspectionRecord = serde_json::from_str(&fs::read_to_string(path)?)?;
    let out = out.unwrap_or_else(|| {
        let stem = record
            .serial
            .as_ref()
            .map(|serial| serial.as_str())
            .unwrap_or("report");
        PathBuf::from(format!("{stem}.pdf"))
    });

    let document = args.render(&record)?;
    fs::write(&out, &document.bytes)?;
    println!(
        "Generated {} ({} pages, {} bytes)",
        out.display(),
        document.page_count,
        document.bytes.len()
    );
    Ok(())
}

fn publish(
    serial: &SerialNumber,
    store_dir: &Path,
    out_dir: &Path,
    base_url: Option<&str>,
    args: &RenderArgs,
) -> Result<(), Box<dyn Error>> {
    let store = JsonDirStore::open(store_dir)?;
    let record = store.get(serial)?;
    let document = args.render(&record)?;

    fs::create_dir_all(out_dir)?;
    let pdf_name = format!("{serial}.pdf");
    let qr_name = format!("{serial}.png");
    let pdf_path = out_dir.join(&pdf_name);
    fs::write(&pdf_path, &document.bytes)?;

    let link = |name: &str| match base_url {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), name),
        None => out_dir.join(name).display().to_string(),
    };
    let pdf_url = link(&pdf_name);
    fs::write(out_dir.join(&qr_name), qr::encode_png(&pdf_url)?)?;

    let record = store.attach_artifacts(
        serial,
        &ArtifactLinks {
            pdf_url: Some(pdf_url),
            qr_url: Some(link(&qr_name)),
        },
    )?;
    println!(
        "Published {} ({} pages)\n  pdf: {}\n  qr:  {}",
        serial,
        document.page_count,
        record.artifacts.pdf_url.as_deref().unwrap_or_default(),
        record.artifacts.qr_url.as_deref().unwrap_or_default()
    );
    Ok(())
}

fn warranty(date: Option<&str>, term: &str, today: NaiveDate) -> Result<(), Box<dyn Error>> {
    let window = coverage_window(date, Some(term), today)
        .ok_or_else(|| format!("Unsupported warranty term {term:?}; expected 18, 24 or 36 months"))?;

    println!("Term:  {}", window.term());
    println!("Start: {}", window.start().format("%d-%m-%Y"));
    println!("End:   {}", window.end().format("%d-%m-%Y"));
    match window.status(today) {
        CoverageStatus::Active { days_left } => println!("Status: active, {days_left} days left"),
        CoverageStatus::Expired => println!("Status: expired"),
    }
    Ok(())
}

fn write_qr(data: &str, out: &Path) -> Result<(), Box<dyn Error>> {
    let png = qr::encode_png(data)?;
    fs::write(out, &png)?;
    println!("Generated {} ({} bytes)", out.display(), png.len());
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
