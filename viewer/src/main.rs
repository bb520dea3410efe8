use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use livedrop_client::{Client, CredentialStore};
use livedrop_types::{api::InventoryItem, money::format_usd, Item};
use livedrop_viewer::{
    audio::JACKPOT_FALLBACK, AudioBackend, AudioEffectPlayer, CampaignDisplay, CatalogIndex, Clip,
    Config, Effect, Overlay, PlaybackError, Viewer,
};
use std::{path::PathBuf, time::Duration};
use tracing::{info, warn};

/// Terminals have no audio output; every clip fails softly.
struct TerminalAudio;

struct SilentClip {
    url: String,
}

impl Clip for SilentClip {
    fn rewind(&self) {}

    fn play(&self) -> Result<(), PlaybackError> {
        Err(PlaybackError(format!("no audio output for {}", self.url)))
    }

    fn pause(&self) {}
}

impl AudioBackend for TerminalAudio {
    type Clip = SilentClip;

    fn load(&self, url: &str) -> SilentClip {
        SilentClip {
            url: url.to_string(),
        }
    }
}

/// Renders the jackpot overlay as a banner.
struct Banner;

impl Overlay for Banner {
    fn engage(&self) {
        println!();
        println!("  ========================================");
        println!("  ||            J A C K P O T           ||");
        println!("  ========================================");
        println!();
    }

    fn release(&self) {
        println!("  (jackpot cleared)");
    }
}

type TerminalViewer = Viewer<Client, TerminalAudio, Banner>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch live case openings and crowdfunding campaigns.", long_about = None)]
struct Args {
    /// Path to a YAML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Authority base URL (overrides the config file).
    #[arg(long)]
    base_url: Option<String>,

    /// Stream invite code (overrides the config file).
    #[arg(long)]
    invite: Option<String>,

    /// Log level (overrides the config file).
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with a username or email.
    Login {
        identity: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Profile,
    Inventory,
    /// Open a case from the inventory.
    Open { item_id: i64 },
    Sell { item_id: i64 },
    /// Donate to the invite's open campaign.
    Contribute { amount_dollars: f64 },
    /// Follow the campaign and inventory until interrupted.
    Watch,
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(invite) = &args.invite {
        config.invite = invite.clone();
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Collapse any failure into the status line shown to the viewer.
fn status(err: impl Into<livedrop_viewer::Error>) -> anyhow::Error {
    let err = err.into();
    match &err {
        livedrop_viewer::Error::Client(client) if client.is_transport() => {
            warn!(?err, "authority unreachable");
        }
        _ if err.is_permission_denied() => {
            warn!("signed-in account is not allowed to do this");
        }
        _ => {}
    }
    anyhow!(err.status_message())
}

/// Reveal line, e.g. `You got: Slate (AK-47) [restricted]`.
fn describe_winner(winner: &Item) -> String {
    let (weapon, skin) = winner.display_parts();
    format!("You got: {skin} ({weapon}) [{}]", winner.rarity)
}

fn describe(viewer: &TerminalViewer, item: &InventoryItem) -> String {
    let tier = viewer.catalog().resolve_rarity(item);
    let mut line = format!(
        "#{:<6} {:<40} [{}] {} | market {}",
        item.id,
        item.name,
        tier,
        item.status,
        format_usd(item.price_cents)
    );
    if item.is_unopened_case() {
        line.push_str("  (open)");
    }
    if item.is_sellable() {
        line.push_str("  (sell)");
    }
    line
}

fn print_inventory(viewer: &TerminalViewer, items: &[InventoryItem]) {
    if items.is_empty() {
        println!("No rewards yet. Wait for stream triggers.");
        return;
    }
    for item in items {
        println!("{}", describe(viewer, item));
    }
}

fn print_campaign(display: Option<&CampaignDisplay>) {
    let Some(display) = display else {
        println!("Waiting for active campaign");
        return;
    };
    println!("{} ({}): {}", display.title, display.reward_label, display.reward_name);
    println!("  {}", display.status_hint);
    println!("  {}", display.progress_text);
    println!("  {}", display.chance_text);
}

fn remember(store: Option<&CredentialStore>, client: &Client) -> Result<()> {
    let (Some(store), Some(token)) = (store, client.token()) else {
        return Ok(());
    };
    store
        .save(&token)
        .with_context(|| format!("could not store credential at {}", store.path().display()))
}

async fn session(config: &Config, client: Client) -> TerminalViewer {
    let catalog = CatalogIndex::load(&client, &config.cases_url, &config.skins_url).await;
    let effects = AudioEffectPlayer::new(TerminalAudio, Banner);
    let (viewer, mut notifications) = Viewer::new(
        client,
        catalog,
        effects,
        config.invite.clone(),
        config.viewport_width,
    );
    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            println!("[toast] {notification}");
        }
    });
    viewer
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args)?;
    tracing_subscriber::fmt()
        .with_max_level(config.level()?)
        .init();

    let client = Client::new(&config.base_url).context("invalid base URL")?;
    let store = config.credential_store();
    if let Some(store) = &store {
        if let Some(token) = store.load()? {
            client.set_token(token);
        }
    } else {
        warn!("no data directory, credentials will not persist");
    }
    info!(base_url = %config.base_url, invite = %config.invite, "starting viewer");

    match args.command {
        Command::Login { identity, password } => {
            let auth = client.login(&identity, &password).await.map_err(status)?;
            remember(store.as_ref(), &client)?;
            println!("Logged in as {}.", auth.user.username);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let auth = client
                .register(&username, &email, &password)
                .await
                .map_err(status)?;
            remember(store.as_ref(), &client)?;
            println!("Registered {}.", auth.user.username);
        }
        Command::Logout => {
            if let Err(err) = client.logout().await {
                warn!(?err, "logout request failed, clearing local credential");
            }
            if let Some(store) = &store {
                store.clear()?;
            }
            println!("Logged out.");
        }
        Command::Profile => {
            let user = client.profile().await.map_err(status)?;
            println!("{} ({})", user.username, user.role);
            println!("Steam ID: {}", user.steam_id.as_deref().unwrap_or("-"));
            println!("Balance: {}", format_usd(user.balance_cents));
        }
        Command::Inventory => {
            let viewer = session(&config, client).await;
            let items = viewer.inventory().await.map_err(status)?;
            print_inventory(&viewer, &items);
        }
        Command::Open { item_id } => {
            let viewer = session(&config, client).await;
            println!("Opening...");
            let outcome = viewer.open_case(item_id).await.map_err(status)?;
            println!("{}", describe_winner(&outcome.winner));
            if outcome.effect == Effect::Jackpot {
                tokio::time::sleep(JACKPOT_FALLBACK + Duration::from_millis(50)).await;
            }
            if let Some(items) = outcome.inventory {
                print_inventory(&viewer, &items);
            }
        }
        Command::Sell { item_id } => {
            let viewer = session(&config, client).await;
            let sale = viewer.sell(item_id).await.map_err(status)?;
            println!(
                "Sold {} for {}. New balance: {}.",
                sale.response.item.name,
                format_usd(sale.response.credited_cents),
                format_usd(sale.response.balance_cents)
            );
            print_inventory(&viewer, &sale.items);
        }
        Command::Contribute { amount_dollars } => {
            let viewer = session(&config, client).await;
            viewer.sync().tick().await;
            let contribution = viewer.contribute(amount_dollars).await.map_err(status)?;
            println!(
                "Donated {} to campaign.",
                format_usd(contribution.amount_cents)
            );
            if let Some(reward) = &contribution.response.reward_item {
                println!("Campaign completed! Winner received {}.", reward.name);
            }
            print_campaign(contribution.display.as_ref());
        }
        Command::Watch => {
            let viewer = session(&config, client).await;
            let bootstrap = viewer.bootstrap().await.map_err(status)?;
            println!(
                "{} | balance {}",
                bootstrap.user.username,
                format_usd(bootstrap.user.balance_cents)
            );
            if !bootstrap.joined && !config.invite.is_empty() {
                println!("Invite join failed.");
            }
            print_campaign(bootstrap.campaign.as_ref());
            print_inventory(&viewer, &bootstrap.items);

            tokio::select! {
                _ = viewer.watch(|items| print_inventory(&viewer, &items)) => {}
                result = tokio::signal::ctrl_c() => {
                    result.context("could not listen for interrupt")?;
                }
            }
        }
    }

    // Let queued toasts print before exiting
    tokio::task::yield_now().await;
    Ok(())
}
