use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, ArtifactResolver, ComparisonView, GenerationClient, LibraryView, ModifyOutcome, NoticeLevel,
    SessionController, SessionEvent, ShotBackend,
};
use serde::Serialize;
use shared::{
    domain::{AspectRatio, HdrPreset, ModifiableParameter, ShotId, ShotType},
    protocol::{Shot, ShotSpec},
};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "studio", about = "Create and refine cinematic shots")]
struct Args {
    /// Backend origin; overrides studio.toml and APP__BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Per-request ceiling in seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Print raw JSON instead of a summary.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the backend.
    Status,
    /// List the shot library.
    List,
    /// Show one shot and its HDR artifacts.
    Show { shot_id: String },
    /// Generate a new shot from a scene description.
    Create {
        #[arg(long)]
        scene: String,
        #[arg(long, default_value_t = ShotType::default().as_str().to_string())]
        shot_type: String,
        #[arg(long, default_value_t = AspectRatio::default().as_str().to_string())]
        aspect_ratio: String,
        #[arg(long, default_value_t = HdrPreset::default().as_str().to_string())]
        hdr_preset: String,
    },
    /// Change one camera, lighting or color parameter of a shot.
    Modify {
        shot_id: String,
        #[arg(long)]
        parameter: String,
        #[arg(long)]
        value: String,
    },
    /// Free-form refinement of a shot.
    Refine {
        shot_id: String,
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        no_hdr: bool,
    },
    /// Print every modifiable parameter and its allowed values.
    Parameters,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(base_url) = &args.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(timeout_secs) = args.timeout_secs {
        settings.request_timeout_secs = timeout_secs;
    }

    if let Command::Parameters = args.command {
        print_parameters();
        return Ok(());
    }

    if let Command::Status = args.command {
        let client = GenerationClient::new(&settings)
            .with_context(|| format!("invalid backend settings for {}", settings.base_url))?;
        let status = client.health().await.context("backend health probe failed")?;
        if !status.is_operational() {
            tracing::warn!(status = %status.status, "backend reports degraded status");
        }
        return emit(&status, args.json, |status| {
            let mut out = format!("{} v{} ({})", status.message, status.version, status.status);
            for (service, state) in &status.services {
                out.push_str(&format!("\n  {service}: {state}"));
            }
            out
        });
    }

    let (controller, artifacts) = client_core::connect(&settings)
        .with_context(|| format!("invalid backend settings for {}", settings.base_url))?;
    let mut events = controller.subscribe();

    match args.command {
        Command::List => {
            controller.bootstrap().await.context("failed to load shot library")?;
            let library = LibraryView::new(controller.store().clone());
            let entries = library.entries().await;
            let shots: Vec<&Shot> = entries.iter().map(|entry| &entry.shot).collect();
            emit(&shots, args.json, |shots| {
                if shots.is_empty() {
                    return "No shots yet".to_string();
                }
                shots.iter().map(|shot| summarize(shot)).collect::<Vec<_>>().join("\n")
            })?;
        }
        Command::Show { shot_id } => {
            let shot = controller
                .open_shot(&ShotId::new(shot_id))
                .await
                .context("failed to load shot")?;
            show_shot(&shot, &artifacts, args.json)?;
        }
        Command::Create {
            scene,
            shot_type,
            aspect_ratio,
            hdr_preset,
        } => {
            let spec = ShotSpec::new(scene)
                .with_shot_type(shot_type.parse()?)
                .with_aspect_ratio(aspect_ratio.parse()?)
                .with_hdr_preset(hdr_preset.parse()?);
            let result = controller.create_shot(spec).await;
            finish(&controller, &mut events).await;
            let shot = result.context("shot creation failed")?;
            show_shot(&shot, &artifacts, args.json)?;
        }
        Command::Modify {
            shot_id,
            parameter,
            value,
        } => {
            controller
                .open_shot(&ShotId::new(shot_id))
                .await
                .context("failed to load shot")?;
            let result = controller.modify_active_raw(&parameter, &value).await;
            finish(&controller, &mut events).await;
            match result.context("parameter modification failed")? {
                ModifyOutcome::Applied(shot) | ModifyOutcome::Discarded(shot) => {
                    show_shot(&shot, &artifacts, args.json)?
                }
            }
        }
        Command::Refine {
            shot_id,
            prompt,
            no_hdr,
        } => {
            let shot = controller
                .backend()
                .refine_shot(&ShotId::new(shot_id), &prompt, !no_hdr)
                .await
                .context("refinement failed")?;
            show_shot(&shot, &artifacts, args.json)?;
        }
        Command::Status | Command::Parameters => {}
    }

    Ok(())
}

/// Waits for background library refreshes, then prints queued notices.
async fn finish(controller: &SessionController, events: &mut broadcast::Receiver<SessionEvent>) {
    if tokio::time::timeout(SETTLE_TIMEOUT, controller.settle()).await.is_err() {
        tracing::warn!(
            timeout_secs = SETTLE_TIMEOUT.as_secs(),
            "library refresh still pending; listing may be stale"
        );
    }
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Notice(notice) => match notice.level {
                NoticeLevel::Success => eprintln!("✔ {}", notice.message),
                NoticeLevel::Error if notice.retryable => {
                    eprintln!("✘ {} (retry possible)", notice.message)
                }
                NoticeLevel::Error => eprintln!("✘ {}", notice.message),
            },
            SessionEvent::StaleResponseDiscarded { target, .. } => {
                eprintln!("! discarded late result for {target}")
            }
        }
    }
}

fn show_shot(shot: &Shot, artifacts: &ArtifactResolver, json: bool) -> Result<()> {
    let comparison = ComparisonView::derive(shot, artifacts)?;
    if json {
        #[derive(Serialize)]
        struct ShotReport<'a> {
            shot: &'a Shot,
            comparison_url: Option<String>,
            hdr_16bit_url: Option<String>,
            png_url: Option<String>,
        }
        let exports = comparison.as_ref().and_then(|view| view.exports.as_ref());
        let report = ShotReport {
            shot,
            comparison_url: comparison.as_ref().map(|view| view.comparison_url.to_string()),
            hdr_16bit_url: exports.map(|e| e.hdr_16bit_url.to_string()),
            png_url: exports.map(|e| e.png_url.to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", summarize(shot));
    for parameter in ModifiableParameter::ALL {
        if let Some(value) = shot.parameter(*parameter) {
            println!("  {:<20} {value}", parameter.title());
        }
    }
    if let Some(image_url) = &shot.image_url {
        println!("  image                {image_url}");
    }
    if let Some(view) = comparison {
        println!("  hdr comparison       {}", view.comparison_url);
        if let Some(exports) = view.exports {
            println!("  download 16-bit      {}", exports.hdr_16bit_url);
            println!("  download png         {}", exports.png_url);
        }
    }
    Ok(())
}

fn summarize(shot: &Shot) -> String {
    let seed = shot
        .seed
        .map(|seed| seed.to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "{}  [{} | {} | seed {}]  {}",
        shot.shot_id, shot.shot_type, shot.aspect_ratio, seed, shot.scene_description
    )
}

fn emit<T: Serialize>(value: &T, json: bool, human: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human(value));
    }
    Ok(())
}

fn print_parameters() {
    for parameter in ModifiableParameter::ALL {
        println!("{} ({})", parameter, parameter.title());
        for value in parameter.allowed_values() {
            println!("  - {value}");
        }
    }
}
