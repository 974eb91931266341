use agendashot::agenda::AgendaRequest;
use agendashot::config::{Config, JobConfig, SourceConfig};
use agendashot::job::DailyAgendaJob;
use agendashot::server::{start_server, AppState};
use agendashot::source::RestSource;
use agendashot::storage::{HttpObjectStore, MemoryStore, ObjectStore};
use agendashot::{RenderOptions, SharedBrowser};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agendashot")]
#[command(version, about = "HTML to PNG service with a daily agenda job")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Settings {
    #[arg(long, env = "HOST", default_value = "0.0.0.0", global = true)]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 3000, global = true)]
    port: u16,

    /// HTTP worker threads (defaults to the number of CPUs)
    #[arg(long, env = "WORKERS", global = true)]
    workers: Option<usize>,

    /// Object storage REST root; images stay in memory when unset
    #[arg(long, env = "STORAGE_URL", global = true)]
    storage_url: Option<String>,

    #[arg(long, env = "STORAGE_BUCKET", default_value = "images", global = true)]
    storage_bucket: String,

    #[arg(long, env = "STORAGE_KEY", default_value = "", hide_env_values = true, global = true)]
    storage_key: String,

    /// Appointment source REST root; the daily job is disabled when unset
    #[arg(long, env = "SOURCE_URL", global = true)]
    source_url: Option<String>,

    #[arg(long, env = "SOURCE_KEY", default_value = "", hide_env_values = true, global = true)]
    source_key: String,

    /// Webhook for organizations that do not configure their own
    #[arg(long, env = "WEBHOOK_URL", global = true)]
    webhook_url: Option<String>,

    #[arg(long, env = "CHROME_PATH", global = true)]
    chrome_path: Option<PathBuf>,

    /// Disable the browser sandbox (needed in most containers)
    #[arg(long, env = "NO_SANDBOX", global = true)]
    no_sandbox: bool,

    #[arg(long, env = "RENDER_TIMEOUT_MS", default_value_t = 30000, global = true)]
    render_timeout_ms: u64,

    /// Offset for organizations whose timezone cannot be resolved
    #[arg(long, env = "FALLBACK_UTC_OFFSET", default_value = "-03:00", global = true)]
    fallback_offset: String,

    /// Seconds between agenda trigger checks
    #[arg(long, env = "JOB_INTERVAL_SECS", default_value_t = 900, global = true)]
    job_interval: u64,

    /// 0 sends today's agenda, 1 tomorrow's
    #[arg(long, env = "AGENDA_DAY_OFFSET", default_value_t = 0, global = true)]
    day_offset: i64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server, plus the daily agenda job when a source is configured
    Serve {
        /// Do not start the agenda job loop
        #[arg(long)]
        no_job: bool,
    },
    /// Run the daily agenda job without the HTTP server
    Job {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
        /// Ignore send hours and the once-per-day guard
        #[arg(long, requires = "once")]
        force: bool,
    },
    /// Lay out an agenda from a JSON file
    Render {
        /// JSON with `organization`, `date` and `membersWithAppointments`
        input: PathBuf,
        /// Where to write the HTML (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also rasterize to this PNG file
        #[arg(long)]
        png: Option<PathBuf>,
    },
}

impl Settings {
    fn to_config(&self) -> Result<Config> {
        let mut config = Config::default();

        config.server.host = self.host.clone();
        config.server.port = self.port;
        if let Some(workers) = self.workers {
            config.server.workers = workers;
        }

        config.renderer.chrome_path = self.chrome_path.clone();
        config.renderer.sandbox = !self.no_sandbox;
        config.renderer.timeout_ms = self.render_timeout_ms;

        config.storage.base_url = self.storage_url.clone().filter(|u| !u.trim().is_empty());
        config.storage.bucket = self.storage_bucket.clone();
        config.storage.api_key = self.storage_key.clone();

        config.source = self
            .source_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .map(|base_url| SourceConfig {
                base_url,
                api_key: self.source_key.clone(),
            });

        config.job.fallback_offset = JobConfig::parse_fallback(&self.fallback_offset)?;
        config.job.interval_secs = self.job_interval;
        config.job.day_offset = self.day_offset;
        config.job.default_webhook_url = self.webhook_url.clone().filter(|u| !u.trim().is_empty());

        config.validate()?;
        Ok(config)
    }
}

fn build_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    match &config.storage.base_url {
        Some(url) => Ok(Arc::new(HttpObjectStore::new(url, &config.storage.bucket, &config.storage.api_key)?)),
        None => {
            warn!("no storage url configured; images are kept in memory");
            Ok(Arc::new(MemoryStore::default()))
        }
    }
}

fn build_job(config: &Config, store: Arc<dyn ObjectStore>, browser: SharedBrowser) -> Result<Option<Arc<DailyAgendaJob>>> {
    let Some(source) = &config.source else {
        return Ok(None);
    };
    let source = Arc::new(RestSource::new(&source.base_url, &source.api_key)?);
    let job = DailyAgendaJob::new(source, store, browser, config.job.clone(), &config.storage.agenda_prefix)?;
    Ok(Some(Arc::new(job)))
}

async fn serve(config: Config, no_job: bool) -> Result<()> {
    let browser = SharedBrowser::with_default_backend(config.renderer.clone());
    let store = build_store(&config)?;

    let mut state = AppState::new(browser.clone(), store.clone(), &config.storage.image_prefix);
    if let Some(job) = build_job(&config, store, browser)? {
        if no_job {
            info!("agenda job loop disabled; manual runs remain available");
        } else {
            tokio::spawn(job.clone().run_forever());
        }
        state = state.with_job(job);
    } else {
        info!("no appointment source configured; agenda job disabled");
    }

    start_server(&config.server, state).await?;
    Ok(())
}

async fn run_job(config: Config, once: bool, force: bool) -> Result<()> {
    let browser = SharedBrowser::with_default_backend(config.renderer.clone());
    let store = build_store(&config)?;
    let job = build_job(&config, store, browser.clone())?
        .ok_or_else(|| anyhow!("the agenda job needs an appointment source (--source-url / SOURCE_URL)"))?;

    if once {
        let results = job.run_cycle(Utc::now(), force).await?;
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        job.run_forever().await;
    }

    browser.close().await?;
    Ok(())
}

async fn render(config: Config, input: PathBuf, out: Option<PathBuf>, png: Option<PathBuf>) -> Result<()> {
    let raw = std::fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
    let request: AgendaRequest =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;
    let html = request.render();

    match out {
        Some(path) => std::fs::write(&path, &html).with_context(|| format!("writing {}", path.display()))?,
        None if png.is_none() => println!("{}", html),
        None => {}
    }

    if let Some(path) = png {
        let browser = SharedBrowser::with_default_backend(config.renderer.clone());
        let bytes = browser.render(&html, RenderOptions::agenda()).await;
        browser.close().await?;
        std::fs::write(&path, bytes?).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.settings.to_config()?;

    match cli.command {
        Commands::Serve { no_job } => serve(config, no_job).await,
        Commands::Job { once, force } => run_job(config, once, force).await,
        Commands::Render { input, out, png } => render(config, input, out, png).await,
    }
}
