use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use streamgrab::core::browser::{ChromiumEngine, EngineGate};
use streamgrab::core::http_client::{self, HttpFetcher};
use streamgrab::core::pipeline::Pipeline;
use streamgrab::core::prober::YtdlpProber;
use streamgrab::core::resolver::Resolver;
use streamgrab::core::traits::{FfprobeInspector, YtdlpEngine};
use streamgrab::core::{ffprobe, upload, vpn, ytdlp};
use streamgrab::storage::config;
use streamgrab::ui::{Console, Presenter};

#[derive(Parser, Debug)]
#[command(name = "streamgrab", about = "Resolve and download streams from media pages")]
struct Cli {
    /// Page or direct stream URLs to process.
    urls: Vec<String>,

    /// File with one URL per line; blank lines are skipped.
    #[arg(long)]
    urls_file: Option<PathBuf>,

    /// Output directory for finished downloads.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Minimum acceptable stream height in pixels.
    #[arg(long)]
    min_height: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let urls = collect_urls(&cli)?;
    if urls.is_empty() {
        anyhow::bail!("no URLs given; pass them as arguments or via --urls-file");
    }

    let mut settings = config::load_settings();
    if let Some(out) = cli.out {
        settings.download.output_dir = out;
    }
    if let Some(min_height) = cli.min_height {
        settings.download.min_height = min_height;
    }

    let ytdlp = ytdlp::find_ytdlp()
        .await
        .context("yt-dlp not found on PATH or in the data directory")?;
    if !ffprobe::is_ffprobe_available().await {
        tracing::warn!("ffprobe not found, downloads will not be quality-checked");
    }
    tokio::fs::create_dir_all(&settings.download.output_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create {}",
                settings.download.output_dir.display()
            )
        })?;

    let ui = Console;
    let client = http_client::build_client()?;
    let fetcher = HttpFetcher::new(client.clone());
    let prober = YtdlpProber::new(ytdlp.clone(), client.clone());
    let browser = ChromiumEngine::new();
    let gate = EngineGate::new();
    let engine = YtdlpEngine::new(ytdlp, settings.download.clone());
    let inspector = FfprobeInspector;

    vpn::connect(&settings.vpn, &ui).await;

    for url in &urls {
        ui.log(&format!("Processing {}", url));
        let result = process_url(
            url, &fetcher, &prober, &browser, &gate, &engine, &inspector, &settings, &client, &ui,
        )
        .await;
        if let Err(e) = result {
            tracing::warn!("{} failed: {:#}", url, e);
            ui.log(&format!("Giving up on {}: {:#}", url, e));
        }
    }

    vpn::disconnect(&settings.vpn, &ui).await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn process_url(
    url: &str,
    fetcher: &HttpFetcher,
    prober: &YtdlpProber,
    browser: &ChromiumEngine,
    gate: &EngineGate,
    engine: &YtdlpEngine,
    inspector: &FfprobeInspector,
    settings: &streamgrab::models::settings::AppSettings,
    client: &reqwest::Client,
    ui: &dyn Presenter,
) -> anyhow::Result<()> {
    let resolver = Resolver::new(
        fetcher,
        prober,
        browser,
        gate,
        ui,
        settings.download.min_height,
    );
    let resolution = resolver.resolve(url).await?;

    let pipeline = Pipeline::new(engine, inspector, browser, gate, prober, ui);
    let path = pipeline.run(resolution).await?;

    if settings.upload.is_configured() {
        upload::upload_file(client, &settings.upload, &path, ui).await?;
    } else {
        ui.log("Upload credentials not configured, keeping the file local");
    }
    Ok(())
}

fn collect_urls(cli: &Cli) -> anyhow::Result<Vec<String>> {
    let mut urls = cli.urls.clone();
    if let Some(file) = &cli.urls_file {
        let raw = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        urls.extend(
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    Ok(urls)
}
