use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relaynote::display::{format_note, format_relay};
use relaynote::nostr_core::{decode_event_id, decode_pubkey, short_hex, short_npub, LinkMarkup};
use relaynote::{probe_signer, Config, Draft, KeyFileSigner, Orchestrator, QueryLimits, RelayPool, View};
use std::collections::HashSet;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relaynote")]
#[command(about = "Read and post Nostr notes across several relays")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Relay to use instead of the configured ones (repeatable)
    #[arg(short, long = "relay")]
    relays: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show recent notes
    Feed,
    /// Show recent notes and keep refreshing until Ctrl+C
    Watch,
    /// Show a thread (hex id, note1 or nevent1)
    Thread { id: String },
    /// Show a profile and its notes (hex, npub or nprofile)
    Profile { pubkey: String },
    /// List relays with their information documents
    Relays,
    /// Publish a note
    Post {
        content: String,
        /// NIP-14 subject line
        #[arg(long)]
        subject: Option<String>,
        /// Event being replied to
        #[arg(long)]
        reply_to: Option<String>,
        /// Thread root, when different from the event being replied to
        #[arg(long)]
        root: Option<String>,
    },
    /// Validate configuration and probe the signer
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).with_context(|| "Failed to load config")?;
    config.expand_paths();
    if !cli.relays.is_empty() {
        config.relays.urls = cli.relays.clone();
    }

    init_logging(&config.logging.level)?;

    config
        .validate()
        .with_context(|| "Configuration validation failed")?;

    if let Commands::Check = cli.command {
        return check_config(&config).await;
    }

    let pool = RelayPool::new(config.fetch_timeout()).with_context(|| "Failed to create relay pool")?;
    let orchestrator = Orchestrator::new(Arc::new(pool.clone()), QueryLimits::from(&config));
    orchestrator.connect(config.relays.urls.clone()).await;

    let links = if std::io::stdout().is_terminal() {
        LinkMarkup::Terminal
    } else {
        LinkMarkup::Plain
    };

    let result = match cli.command {
        Commands::Feed => show_feed(&orchestrator, links).await,
        Commands::Watch => watch_feed(&orchestrator, &config, links).await,
        Commands::Thread { id } => show_thread(&orchestrator, &id, links).await,
        Commands::Profile { pubkey } => show_profile(&orchestrator, &pubkey, links).await,
        Commands::Relays => show_relays(&orchestrator).await,
        Commands::Post {
            content,
            subject,
            reply_to,
            root,
        } => post_note(&orchestrator, &config, content, subject, reply_to, root).await,
        Commands::Check => Ok(()),
    };

    pool.disconnect().await;
    result
}

async fn show_feed(orchestrator: &Orchestrator, links: LinkMarkup) -> Result<()> {
    orchestrator.set_view(View::Feed).await;
    let state = orchestrator.state().await;
    if let Some(error) = &state.last_error {
        anyhow::bail!("Feed unavailable: {}", error);
    }
    for event in state.events() {
        println!("{}\n", format_note(&event, orchestrator.cache(), links));
    }
    Ok(())
}

async fn watch_feed(orchestrator: &Orchestrator, config: &Config, links: LinkMarkup) -> Result<()> {
    orchestrator.set_view(View::Feed).await;
    let _refresh = orchestrator.start_auto_refresh(config.refresh_interval());

    let mut printed = HashSet::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C");
                break;
            }
            _ = ticker.tick() => {
                for event in orchestrator.state().await.events() {
                    if printed.insert(event.id.clone()) {
                        println!("{}\n", format_note(&event, orchestrator.cache(), links));
                    }
                }
            }
        }
    }
    Ok(())
}

async fn show_thread(orchestrator: &Orchestrator, id: &str, links: LinkMarkup) -> Result<()> {
    let event_id = decode_event_id(id).with_context(|| format!("Invalid event id: {}", id))?;
    orchestrator.open_thread(&event_id).await;

    let state = orchestrator.state().await;
    let (Some(thread), View::Thread(info)) = (state.thread(), &state.view) else {
        anyhow::bail!("Thread view was replaced before it loaded");
    };

    match &thread.root {
        Some(root) => println!("{}\n", format_note(root, orchestrator.cache(), links)),
        None => println!("(root {} not found on any relay)\n", short_hex(&info.root_id)),
    }
    println!("{} repl{}", thread.replies.len(), if thread.replies.len() == 1 { "y" } else { "ies" });
    for reply in &thread.replies {
        println!("\n{}", format_note(reply, orchestrator.cache(), links));
    }
    Ok(())
}

async fn show_profile(orchestrator: &Orchestrator, input: &str, links: LinkMarkup) -> Result<()> {
    let pubkey = decode_pubkey(input).with_context(|| format!("Invalid public key: {}", input))?;
    orchestrator.set_view(View::profile(pubkey.clone())).await;

    let metadata = orchestrator.cache().profile(&pubkey).unwrap_or_default();
    println!("{}", metadata.handle().unwrap_or("(unknown)"));
    println!("{}", short_npub(&pubkey));
    if let Some(about) = &metadata.about {
        println!("{}", about);
    }
    if let Some(nip05) = &metadata.nip05 {
        println!("nip05: {}", nip05);
    }
    println!();

    for event in orchestrator.state().await.events().iter().rev() {
        println!("{}\n", format_note(event, orchestrator.cache(), links));
    }
    Ok(())
}

async fn show_relays(orchestrator: &Orchestrator) -> Result<()> {
    orchestrator.set_view(View::RelayDirectory).await;
    for relay in orchestrator.relays().await {
        let metadata = orchestrator.cache().relay(&relay);
        println!("{}", format_relay(&relay, metadata.as_ref()));
    }
    Ok(())
}

async fn post_note(
    orchestrator: &Orchestrator,
    config: &Config,
    content: String,
    subject: Option<String>,
    reply_to: Option<String>,
    root: Option<String>,
) -> Result<()> {
    let signer = signer_from_config(config)?;
    probe_signer(&signer, config.signer.probe_attempts, config.probe_delay())
        .await
        .with_context(|| "Signer is not available")?;

    let decode = |id: Option<String>| -> Result<Option<String>> {
        id.map(|id| decode_event_id(&id).with_context(|| format!("Invalid event id: {}", id)))
            .transpose()
    };
    let draft = Draft {
        content,
        subject,
        reply_to: decode(reply_to)?,
        root: decode(root)?,
    };

    let event = orchestrator
        .publish(&signer, &draft)
        .await
        .with_context(|| "Failed to publish note")?;
    orchestrator.wait_for_broadcasts().await;

    println!("Published {}", event.id);
    Ok(())
}

fn signer_from_config(config: &Config) -> Result<KeyFileSigner> {
    let path = config
        .signer
        .identity_file
        .as_ref()
        .with_context(|| "No identity file configured (set signer.identity_file or RELAYNOTE_IDENTITY)")?;
    Ok(KeyFileSigner::new(path))
}

async fn check_config(config: &Config) -> Result<()> {
    println!("Testing configuration...");
    println!("✓ Configuration is valid");
    println!("  Relays: {}", config.relays.urls.join(", "));

    match signer_from_config(config) {
        Ok(signer) => {
            match probe_signer(&signer, config.signer.probe_attempts, config.probe_delay()).await {
                Ok(pubkey) => {
                    println!("✓ Signer is available");
                    println!("  Public key: {}", short_npub(&pubkey));
                }
                Err(e) => {
                    println!("⚠ Signer probe failed: {}", e);
                    println!("  (Reading still works, publishing will not)");
                }
            }
        }
        Err(e) => println!("⚠ {}", e),
    }

    println!("\nConfiguration test completed successfully!");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter.to_string())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    Ok(())
}
