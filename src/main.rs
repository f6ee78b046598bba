use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use festival_scoreboard::{
    compute_standings_with, import_drafts, load_results_csv, AdminGate, Config, EventStore,
    Identity, RankingRule, SqliteAuthenticator, SqliteStore, FESTIVAL_TITLE,
};

#[derive(Parser)]
#[command(name = "festival-scoreboard", version, about = "Live house standings for the festival")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Live terminal dashboard (default)
    Dashboard,

    /// Print the current standings once
    Standings {
        /// Skip ranks after ties (1, 1, 3, 4) instead of dense ranks
        #[arg(long)]
        competition: bool,
    },

    /// Import event results from a CSV export
    Import {
        csv: PathBuf,
        #[command(flatten)]
        admin: AdminArgs,
    },

    /// Delete one event by id
    Delete {
        id: String,
        #[command(flatten)]
        admin: AdminArgs,
    },

    /// Create or reset an admin credential
    AddAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Upload a winner photo and print its URL
    Upload {
        file: PathBuf,
        /// Attach the photo to this event...
        #[arg(long, requires = "position")]
        event: Option<String>,
        /// ...at this podium position
        #[arg(long, requires = "event")]
        position: Option<u8>,
        #[command(flatten)]
        admin: AdminArgs,
    },
}

#[derive(clap::Args)]
struct AdminArgs {
    #[arg(long, env = "FESTIVAL_ADMIN_EMAIL")]
    email: String,
    #[arg(long, env = "FESTIVAL_ADMIN_PASSWORD", hide_env_values = true)]
    password: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    let _guard = runtime.enter();

    match cli.command.unwrap_or(Command::Dashboard) {
        Command::Dashboard => run_dashboard(&config),
        Command::Standings { competition } => {
            init_logging_stderr();
            run_standings(&config, competition)
        }
        Command::Import { csv, admin } => {
            init_logging_stderr();
            run_import(&config, &csv, &admin)
        }
        Command::Delete { id, admin } => {
            init_logging_stderr();
            run_delete(&config, &id, &admin)
        }
        Command::AddAdmin { email, password } => {
            init_logging_stderr();
            run_add_admin(&config, &email, &password)
        }
        Command::Upload {
            file,
            event,
            position,
            admin,
        } => {
            init_logging_stderr();
            runtime.block_on(run_upload(&config, &file, event.zip(position), &admin))
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))
}

fn login(config: &Config, admin: &AdminArgs) -> Result<(AdminGate, Identity)> {
    let authenticator = SqliteAuthenticator::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    let gate = AdminGate::new(Arc::new(authenticator), config.admin_emails.clone());

    match gate.login(&admin.email, &admin.password) {
        Ok(identity) => Ok((gate, identity)),
        Err(err) => {
            eprintln!("❌ {}", err.title());
            eprintln!("   {}", err);
            bail!(err)
        }
    }
}

fn run_standings(config: &Config, competition: bool) -> Result<()> {
    let store = open_store(config)?;
    let events = store.list_events()?;

    let rule = if competition {
        RankingRule::Competition
    } else {
        RankingRule::Dense
    };
    let standings = compute_standings_with(&events, rule);

    println!("🏆 {} - House Standings", FESTIVAL_TITLE);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for entry in standings.iter() {
        println!("  #{}  {:<10} {:>5} pts", entry.rank, entry.house.name(), entry.score);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ {} events counted", events.len());

    Ok(())
}

fn run_import(config: &Config, csv_path: &Path, admin: &AdminArgs) -> Result<()> {
    let (gate, identity) = login(config, admin)?;

    println!("📂 Loading CSV...");
    let drafts = load_results_csv(csv_path)
        .with_context(|| format!("failed to read {}", csv_path.display()))?;
    println!("✓ Found {} events", drafts.len());

    println!("\n💾 Writing events...");
    let store = open_store(config)?;
    let imported = import_drafts(&store, drafts)?;
    println!("✓ Imported {} events", imported);
    println!("✓ Store now holds {} events", store.count()?);

    gate.logout(&identity);
    Ok(())
}

fn run_delete(config: &Config, id: &str, admin: &AdminArgs) -> Result<()> {
    let (gate, identity) = login(config, admin)?;

    let store = open_store(config)?;
    store
        .delete_event(id)
        .with_context(|| format!("failed to delete event {}", id))?;
    println!("🗑️  Deleted event {}", id);

    gate.logout(&identity);
    Ok(())
}

fn run_add_admin(config: &Config, email: &str, password: &str) -> Result<()> {
    let authenticator = SqliteAuthenticator::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    authenticator.register(email, password)?;

    println!("🔐 Credential saved for {}", email.trim());
    if !config.admin_emails.iter().any(|allowed| allowed == email.trim()) {
        println!("⚠️  {} is not in FESTIVAL_ADMIN_EMAILS; login will be denied", email.trim());
    }
    Ok(())
}

async fn run_upload(
    config: &Config,
    file: &Path,
    attach_to: Option<(String, u8)>,
    admin: &AdminArgs,
) -> Result<()> {
    let (gate, identity) = login(config, admin)?;

    let Some(cloudinary) = &config.cloudinary else {
        bail!("uploads are disabled: set CLOUDINARY_CLOUD_NAME and CLOUDINARY_UPLOAD_PRESET");
    };

    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());

    println!("📷 Uploading {}...", file_name);
    let url = cloudinary.image_host().upload(&file_name, bytes).await?;
    println!("✓ {}", url);

    if let Some((event_id, position)) = attach_to {
        let store = open_store(config)?;
        let event = store
            .get_event(&event_id)?
            .with_context(|| format!("event {} not found", event_id))?;

        let mut draft = event.to_draft();
        let Some(winner) = draft.winners.iter_mut().find(|w| w.position == position) else {
            bail!("event {} has no winner at position {}", event_id, position);
        };
        winner.photo = Some(url);
        store.update_event(&event_id, draft)?;
        println!("✓ Attached to {} ({} place)", event.name, festival_scoreboard::views::ordinal(position));
    }

    gate.logout(&identity);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_dashboard(config: &Config) -> Result<()> {
    use festival_scoreboard::{subscribe, ui};
    use std::sync::Mutex;
    use std::time::Instant;

    // The alternate screen owns the terminal; logs go to a file
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("failed to open {}", config.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();

    println!("🖥️  Loading {} dashboard...\n", FESTIVAL_TITLE);

    let store = Arc::new(open_store(config)?);
    let poller = store.spawn_change_poller(config.poll_interval);

    let (tx, rx) = std::sync::mpsc::channel();
    let subscription = subscribe(store.clone(), move |events| {
        // Receiver gone means the dashboard is closing
        let _ = tx.send(events);
    });

    info!(db = %config.db_path.display(), "dashboard started");

    let mut app = ui::App::new(config.carousel_interval, Instant::now());
    let result = ui::run_ui(&mut app, rx);

    subscription.unsubscribe();
    poller.abort();

    result?;
    println!("\n✅ Dashboard closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_dashboard(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the web API: cargo run --bin festival-server --features server");
    std::process::exit(1);
}
