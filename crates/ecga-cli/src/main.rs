mod view;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ecga_client::{
    AnalysisService, ClientConfig, HttpService, Orchestrator, ReportHandle, SubmissionOutcome,
};
use ecga_lib::io::csv::write_table_csv;
use ecga_lib::state::{FileStateStore, StateStore};
use env_logger::Env;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use view::TerminalView;

#[derive(Parser)]
#[command(
    name = "ecga",
    version,
    about = "ECG analyzer client: submit WFDB records and view HRV and beat results"
)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Client config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Analysis server base URL, overriding the config file
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OutputArgs {
    /// Directory for the plot image and downloaded report
    #[arg(long, default_value = ".")]
    out: PathBuf,
    /// Write hrv_metrics.csv and predictions.csv into this directory
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Print the raw analysis result as JSON instead of tables
    #[arg(long)]
    json: bool,
    /// Fetch the generated PDF report into --out
    #[arg(long)]
    download_report: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload record files (.dat + .hea, optionally .atr) for analysis
    Analyze {
        files: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run the server's bundled sample record
    Sample {
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Download a report by its server handle
    DownloadReport {
        #[arg(long)]
        path: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the stored client state
    State,
    /// Update display preferences
    Prefs {
        #[arg(long, value_enum)]
        dark_mode: Toggle,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    match cli.command {
        Commands::State => cmd_state(),
        Commands::Prefs { dark_mode } => cmd_prefs(dark_mode),
        Commands::Analyze { files, output } => {
            let config = load_config(cli.config.as_deref(), cli.server)?;
            runtime()?.block_on(cmd_analyze(&config, &files, &output))
        }
        Commands::Sample { output } => {
            let config = load_config(cli.config.as_deref(), cli.server)?;
            runtime()?.block_on(cmd_sample(&config, &output))
        }
        Commands::DownloadReport { path, out } => {
            let config = load_config(cli.config.as_deref(), cli.server)?;
            runtime()?.block_on(cmd_download_report(&config, &path, out.as_deref()))
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}

fn load_config(path: Option<&Path>, server: Option<String>) -> Result<ClientConfig> {
    let mut config = ClientConfig::resolve(path)?;
    if let Some(url) = server {
        config.server_url = url;
    }
    info!("using server {}", config.server_url);
    Ok(config)
}

fn orchestrator(config: &ClientConfig) -> Result<Orchestrator<HttpService, FileStateStore>> {
    let service = HttpService::new(config).context("building HTTP client")?;
    Orchestrator::new(service, FileStateStore::from_env()?, config)
}

async fn cmd_analyze(config: &ClientConfig, files: &[PathBuf], output: &OutputArgs) -> Result<ExitCode> {
    let mut orchestrator = orchestrator(config)?;
    let mut view = TerminalView::new(
        orchestrator.state().dark_mode,
        !output.json,
        output.download_report,
    );
    let outcome = match orchestrator.submit(files, &mut view).await {
        Ok(outcome) => outcome,
        Err(_) => return Ok(ExitCode::FAILURE),
    };
    let record = outcome.record.clone().unwrap_or_else(|| "record".to_string());
    emit(&orchestrator, &outcome, output, &record).await?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_sample(config: &ClientConfig, output: &OutputArgs) -> Result<ExitCode> {
    let mut orchestrator = orchestrator(config)?;
    let mut view = TerminalView::new(
        orchestrator.state().dark_mode,
        !output.json,
        output.download_report,
    );
    let outcome = match orchestrator.run_sample(&mut view).await {
        Ok(outcome) => outcome,
        Err(_) => return Ok(ExitCode::FAILURE),
    };
    emit(&orchestrator, &outcome, output, "sample").await?;
    Ok(ExitCode::SUCCESS)
}

async fn emit<S: AnalysisService, T: StateStore>(
    orchestrator: &Orchestrator<S, T>,
    outcome: &SubmissionOutcome,
    output: &OutputArgs,
    record: &str,
) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    } else if let Some(counts) = outcome.result.annotation_counts() {
        let summary: Vec<String> = counts.iter().map(|(s, n)| format!("{}={}", s, n)).collect();
        println!();
        println!("Reference annotations: {}", summary.join(", "));
    }

    if let Some(dir) = &output.csv {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        write_table_csv(&dir.join("hrv_metrics.csv"), &outcome.hrv_table)?;
        write_table_csv(&dir.join("predictions.csv"), &outcome.predictions_table)?;
        eprintln!("Tables written to {}", dir.display());
    }

    if let Some(image) = &outcome.plot {
        let path = output.out.join(format!("{}_plot.png", record));
        write_output(&path, image)?;
        eprintln!("Plot saved to {}", path.display());
    }

    if output.download_report {
        match &outcome.report {
            Some(report) => match orchestrator.fetch_report(report).await {
                Ok(bytes) => {
                    let path = output.out.join(report.file_name());
                    write_output(&path, &bytes)?;
                    eprintln!("Report saved to {}", path.display());
                }
                Err(err) => {
                    warn!("report download failed: {}", err);
                    eprintln!("Report unavailable: {}", err);
                }
            },
            None => eprintln!("The server did not produce a report."),
        }
    }
    Ok(())
}

async fn cmd_download_report(config: &ClientConfig, path: &str, out: Option<&Path>) -> Result<ExitCode> {
    let service = HttpService::new(config).context("building HTTP client")?;
    let report = ReportHandle::new(path);
    let bytes = service
        .download_report(report.path())
        .await
        .with_context(|| format!("downloading report {}", path))?;
    let target = match out {
        Some(file) => file.to_path_buf(),
        None => PathBuf::from(report.file_name()),
    };
    write_output(&target, &bytes)?;
    eprintln!("Report saved to {}", target.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_state() -> Result<ExitCode> {
    let store = FileStateStore::from_env()?;
    let state = store.load()?;
    println!("{}", store.path().display());
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(ExitCode::SUCCESS)
}

fn cmd_prefs(dark_mode: Toggle) -> Result<ExitCode> {
    let store = FileStateStore::from_env()?;
    let mut state = store.load()?;
    state.dark_mode = matches!(dark_mode, Toggle::On);
    store.save(&state)?;
    println!("dark mode {}", if state.dark_mode { "on" } else { "off" });
    Ok(ExitCode::SUCCESS)
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}
