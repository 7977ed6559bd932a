use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate::auth::{AdminDirectory, NewAdmin};
use facegate::config::{self, Config};
use facegate::engine::MatchEngine;
use facegate::extractor::CommandExtractor;
use facegate::ledger::{EventFilter, EventLedger, Outcome};
use facegate::registry::{IdentityRegistry, IdentitySummary, IdentityUpdate, NewIdentity};
use facegate::{RawVectorExtractor, SignatureExtractor};
use log::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "facegate")]
#[command(
    version,
    about = "Face-based access control - enrollment, identification and audit"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage authorized identities
    Person {
        #[command(subcommand)]
        action: PersonCmd,
    },
    /// Attach a reference face to an identity
    Enroll {
        /// Identity to enroll
        #[arg(short, long)]
        person: Uuid,
        /// Image file; a raw signature file when no extractor is configured
        image: PathBuf,
    },
    /// Identify a probe against the enrolled set
    Identify {
        /// Probe image file
        image: PathBuf,
        /// Identifier of the capturing camera or door
        #[arg(short, long)]
        camera: Option<String>,
        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recorded access events, newest first
    Events {
        /// Keep only this outcome (authorized | unauthorized)
        #[arg(long)]
        outcome: Option<Outcome>,
        /// Keep only events from this camera
        #[arg(long)]
        camera: Option<String>,
        /// Number of events (default 100, capped at 500)
        #[arg(long)]
        limit: Option<usize>,
        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },
    /// List probes retained from rejected scans
    Rejected {
        /// Write the probe signature of this event to a file
        #[arg(long)]
        export: Option<u64>,
        /// Output path for --export (defaults to probe-<event>.sig)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Manage administrator accounts
    Admin {
        #[command(subcommand)]
        action: AdminCmd,
    },
    /// Open config file in editor
    Config,
}

#[derive(Subcommand)]
enum PersonCmd {
    /// Register a new authorized identity
    Add {
        #[arg(short, long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Defaults to "Staff"
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        room: Option<String>,
    },
    /// List authorized identities
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one identity
    Show { id: Uuid },
    /// Update profile fields; omitted flags stay as they are
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        room: Option<String>,
    },
    /// Remove an identity together with its signature
    Remove { id: Uuid },
    /// Detach the reference signature, keeping the identity
    Unenroll { id: Uuid },
}

#[derive(Subcommand)]
enum AdminCmd {
    /// Register an administrator account
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// Password hash produced by your external hashing tool
        #[arg(long)]
        password_hash: String,
    },
    /// List administrator accounts
    List,
    /// Disable an administrator account
    Deactivate { email: String },
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(None)?;

    match cli.command {
        Commands::Person { action } => person_cmd(&cfg, action),
        Commands::Enroll { person, image } => enroll(&cfg, person, &image),
        Commands::Identify {
            image,
            camera,
            json,
        } => identify(&cfg, &image, camera.as_deref(), json),
        Commands::Events {
            outcome,
            camera,
            limit,
            json,
        } => events(&cfg, EventFilter { outcome, camera, limit }, json),
        Commands::Rejected { export, out } => rejected(&cfg, export, out),
        Commands::Admin { action } => admin_cmd(&cfg, action),
        Commands::Config => open_config(),
    }
}

fn build_engine(cfg: &Config) -> MatchEngine {
    let data_dir = cfg.data_dir();
    let extractor: Arc<dyn SignatureExtractor> = match &cfg.extractor {
        Some(command) => Arc::new(CommandExtractor::new(command.clone())),
        None => Arc::new(RawVectorExtractor),
    };
    MatchEngine::new(
        extractor,
        IdentityRegistry::open(&data_dir),
        EventLedger::open(&data_dir),
        cfg.threshold,
    )
}

fn person_cmd(cfg: &Config, action: PersonCmd) -> Result<()> {
    let registry = IdentityRegistry::open(&cfg.data_dir());

    match action {
        PersonCmd::Add {
            name,
            email,
            phone,
            role,
            room,
        } => {
            let identity = registry.create(NewIdentity {
                name,
                email,
                phone,
                role,
                room,
            })?;
            info!("✓ Created identity {} ({})", identity.id, identity.name);
        }
        PersonCmd::List { json } => {
            let summaries: Vec<IdentitySummary> =
                registry.list()?.iter().map(IdentitySummary::from).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                info!("No identities registered");
            } else {
                for s in &summaries {
                    println!(
                        "{}  {:<24} {:<10} {}",
                        s.id,
                        s.name,
                        s.role,
                        if s.enrolled { "enrolled" } else { "-" }
                    );
                }
            }
        }
        PersonCmd::Show { id } => {
            let identity = registry.get(id)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&IdentitySummary::from(&identity))?
            );
        }
        PersonCmd::Update {
            id,
            name,
            email,
            phone,
            role,
            room,
        } => {
            let identity = registry.update(
                id,
                IdentityUpdate {
                    name,
                    email,
                    phone,
                    role,
                    room,
                },
            )?;
            info!("✓ Updated identity {} ({})", identity.id, identity.name);
        }
        PersonCmd::Remove { id } => {
            registry.delete(id)?;
            info!("✓ Removed identity {}", id);
        }
        PersonCmd::Unenroll { id } => {
            let identity = registry.clear_signature(id)?;
            info!("✓ Cleared signature for {} ({})", identity.id, identity.name);
        }
    }
    Ok(())
}

fn enroll(cfg: &Config, person: Uuid, image: &Path) -> Result<()> {
    let bytes = fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let engine = build_engine(cfg);
    let identity = engine.enroll(person, &bytes)?;
    info!(
        "✓ Reference signature enrolled for {} ({})",
        identity.name, identity.id
    );
    Ok(())
}

fn identify(cfg: &Config, image: &Path, camera: Option<&str>, json: bool) -> Result<()> {
    let probe = fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let engine = build_engine(cfg);
    let decision = engine.identify(&probe, camera)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    match &decision.matched {
        Some(m) => info!(
            "✓ {} (score {:.4}, event {})",
            m.name, decision.score, decision.event_id
        ),
        None => info!(
            "✗ No match (score {:.4}, event {})",
            decision.score, decision.event_id
        ),
    }
    Ok(())
}

fn events(cfg: &Config, filter: EventFilter, json: bool) -> Result<()> {
    let ledger = EventLedger::open(&cfg.data_dir());
    let events = ledger.events(&filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }
    if events.is_empty() {
        info!("No events recorded");
        return Ok(());
    }
    for e in &events {
        println!(
            "{:>6}  {}  {:<12}  {:.4}  camera={}  identity={}",
            e.id,
            e.at.format("%Y-%m-%d %H:%M:%S"),
            e.outcome,
            e.score,
            e.camera.as_deref().unwrap_or("-"),
            e.identity.map(|u| u.to_string()).unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}

fn rejected(cfg: &Config, export: Option<u64>, out: Option<PathBuf>) -> Result<()> {
    let ledger = EventLedger::open(&cfg.data_dir());
    let probes = ledger.rejected()?;

    if let Some(event_id) = export {
        let probe = probes
            .iter()
            .find(|p| p.event_id == event_id)
            .with_context(|| format!("no rejected probe for event {event_id}"))?;
        let path = out.unwrap_or_else(|| PathBuf::from(format!("probe-{event_id}.sig")));
        fs::write(&path, &probe.signature)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("✓ Wrote probe of event {} to {}", event_id, path.display());
        return Ok(());
    }

    if probes.is_empty() {
        info!("No rejected probes retained");
        return Ok(());
    }
    for p in &probes {
        println!(
            "event {:>6}  {}  signature {} bytes",
            p.event_id,
            p.at.format("%Y-%m-%d %H:%M:%S"),
            p.signature.len()
        );
    }
    Ok(())
}

fn admin_cmd(cfg: &Config, action: AdminCmd) -> Result<()> {
    let admins = AdminDirectory::open(&cfg.data_dir());

    match action {
        AdminCmd::Add {
            email,
            name,
            password_hash,
        } => {
            let admin = admins.create(NewAdmin {
                email,
                name,
                password_hash,
            })?;
            info!("✓ Created administrator {} ({})", admin.email, admin.id);
        }
        AdminCmd::List => {
            let all = admins.list()?;
            if all.is_empty() {
                info!("No administrators registered");
            }
            for a in &all {
                println!(
                    "{}  {:<28} {:<20} {}",
                    a.id,
                    a.email,
                    a.name,
                    if a.active { "active" } else { "disabled" }
                );
            }
        }
        AdminCmd::Deactivate { email } => {
            admins.deactivate(&email)?;
            info!("✓ Deactivated administrator {}", email);
        }
    }
    Ok(())
}

fn open_config() -> Result<()> {
    // Make sure there is a file with the defaults to edit.
    if !config::CONFIG_PATH.exists() {
        config::save_config(&Config::default(), None)?;
    }

    let config_path = config::CONFIG_PATH.as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
