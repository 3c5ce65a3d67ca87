mod audio;
mod config;
mod error;
mod http;
mod llm;
mod output;
mod song;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::BackendKind;
use config::defaults;
use config::secrets::CredentialResolver;
use llm::TextGenerator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "songsmith", version, about = "Lyrics and music from a one-line idea")]
struct Cli {
    /// Override config file path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write lyrics, then render audio on the configured backends.
    Compose {
        /// What the song is about.
        #[arg(long)]
        topic: String,
        #[arg(long, default_value = "Pop")]
        genre: String,
        #[arg(long, default_value = "Male")]
        vocal: String,
        #[arg(long, default_value = "Medium")]
        tempo: String,
        #[arg(long)]
        title: Option<String>,
        /// Use this model instead of picking one from the catalog.
        #[arg(long)]
        model: Option<String>,
        /// Lyrics only.
        #[arg(long)]
        no_audio: bool,
        /// Save lyrics and audio here (overrides `output.dir`).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the language models available to the configured key.
    Models,
    /// Check an audio job once and print its status.
    Poll {
        #[arg(value_enum)]
        backend: BackendKind,
        job_id: String,
    },
    /// Inspect or edit the config file.
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the config file location.
    Path,
    /// Print the effective config.
    Show,
    /// Set the audio backends, in fallback order. No arguments turns audio off.
    Backends {
        #[arg(value_enum)]
        backends: Vec<BackendKind>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load(cli.config.as_deref()).context("load config")?;
    let cfg_path = match cli.config.clone() {
        Some(p) => p,
        None => config::default_config_path().context("default config path")?,
    };

    match cli.command {
        Command::Compose {
            topic,
            genre,
            vocal,
            tempo,
            title,
            model,
            no_audio,
            out,
        } => {
            let request = song::GenerationRequest::new(&topic, &genre, &vocal, &tempo, title.as_deref())?;
            let creds = resolver(&cfg, &cfg_path)?;
            let api_key = creds.require(defaults::GEMINI_API_KEY)?;

            let chain = if no_audio {
                None
            } else {
                audio::build_chain(&cfg.audio, &creds)?
            };
            match &chain {
                Some(c) => tracing::info!(backends = ?c.names(), "audio enabled"),
                None => tracing::info!("audio disabled; lyrics only"),
            }
            let policy = cfg.audio.poll_policy()?;

            let mut selection = llm::ModelSelection::from(&cfg.llm);
            if model.is_some() {
                selection.model = model;
            }
            let text = llm::TextClient::connect(gemini(&cfg, api_key)?, &selection).await;
            tracing::debug!(model = text.model(), provider = text.provider(), "language model selected");

            let composer = song::Composer::new(text, chain, policy, cfg.song.language.clone());
            let report = composer.compose(&request).await?;
            print!("{}", output::render(&report, &cfg.output.handoff_url));

            if let Some(dir) = out.or_else(|| cfg.output.dir.clone()) {
                let http = http::client(Duration::from_secs(cfg.llm.request_timeout_secs.max(60)), None)?;
                let saved = output::save(&report, &request, &dir, &http).await?;
                if let Some(p) = saved.lyrics {
                    println!("Saved lyrics: {}", p.display());
                }
                if let Some(p) = saved.audio {
                    println!("Saved audio: {}", p.display());
                }
            }
        }
        Command::Models => {
            let creds = resolver(&cfg, &cfg_path)?;
            let api_key = creds.require(defaults::GEMINI_API_KEY)?;
            let generator = gemini(&cfg, api_key)?;
            let names = generator.list_models().await?;
            let selection = llm::ModelSelection::from(&cfg.llm);
            let picked = selection
                .model
                .clone()
                .unwrap_or_else(|| llm::pick_model(&names, &selection));
            for name in &names {
                let mark = if *name == picked { "*" } else { " " };
                println!("{mark} {name}");
            }
            if !names.contains(&picked) {
                println!("* {picked} (not listed)");
            }
        }
        Command::Poll { backend, job_id } => {
            let creds = resolver(&cfg, &cfg_path)?;
            let mut audio_cfg = cfg.audio.clone();
            audio_cfg.backends = vec![backend];
            let chain = audio::build_chain(&audio_cfg, &creds)?
                .context("audio backend unavailable")?;
            let client = chain.backend(0).context("audio backend unavailable")?;
            let resp = client.poll(&job_id).await?;
            print_poll(backend, &job_id, &resp);
        }
        Command::Config { cmd } => match cmd {
            ConfigCommand::Path => {
                println!("{}", cfg_path.display());
                println!(
                    "secrets: {}",
                    cfg.credentials.secrets_path(&cfg_path).display()
                );
            }
            ConfigCommand::Show => {
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
            ConfigCommand::Backends { backends } => {
                let mut cfg = cfg;
                cfg.audio.backends = backends;
                config::save(&cfg, cli.config.as_deref()).context("save config")?;
                if cfg.audio.backends.is_empty() {
                    println!("Audio generation turned off.");
                } else {
                    let names: Vec<&str> = cfg.audio.backends.iter().map(|b| b.as_str()).collect();
                    println!("Audio backends: {}", names.join(" -> "));
                }
            }
        },
    }

    Ok(())
}

fn resolver(cfg: &config::Config, cfg_path: &Path) -> anyhow::Result<CredentialResolver> {
    CredentialResolver::standard(
        &cfg.credentials.secrets_path(cfg_path),
        &cfg.credentials.dotenv_file,
    )
    .context("load credentials")
}

fn gemini(cfg: &config::Config, api_key: String) -> anyhow::Result<Arc<dyn TextGenerator>> {
    let client = llm::GeminiClient::new(
        &cfg.llm.base_url,
        api_key,
        Duration::from_secs(cfg.llm.request_timeout_secs),
    )?;
    Ok(Arc::new(client))
}

fn print_poll(backend: BackendKind, job_id: &str, resp: &audio::PollResponse) {
    let status = match resp.status {
        audio::JobStatus::Pending => "pending",
        audio::JobStatus::Complete => "complete",
        audio::JobStatus::Error => "error",
    };
    println!("{} {job_id}: {status}", backend.as_str());
    match &resp.audio {
        Some(audio::AudioRef::Url(url)) => println!("audio: {url}"),
        Some(audio::AudioRef::Bytes(b)) => println!("audio: {} bytes", b.len()),
        None => {}
    }
    if let Some(detail) = &resp.detail {
        println!("detail: {detail}");
    }
}
