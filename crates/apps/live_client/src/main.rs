use std::sync::Arc;
use std::time::Duration;

use catalog::SnapshotStore;
use clap::{Args as ClapArgs, Parser, Subcommand};
use foundation::CountryId;
use scene::{BinderConfig, SceneBinder};
use streaming::{
    Endpoints, HttpSnapshotSource, LiveSyncController, SnapshotSource, SyncConfig, WsLiveConnector,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Live Political Stability Index client")]
struct Args {
    /// REST API base URL (default: $PSI_API_URL or http://localhost:8000)
    #[arg(long)]
    api_url: Option<String>,

    /// Live channel URL (default: $PSI_WS_URL or ws://localhost:8000/live)
    #[arg(long)]
    ws_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow live updates and log the globe state as it changes
    Watch(WatchArgs),

    /// Fetch one snapshot and print the leaderboard and upcoming elections
    Snapshot {
        /// Number of leaderboard rows
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Print the drill-down record for one country as JSON
    Detail {
        #[arg(long)]
        id: u64,
    },
}

#[derive(ClapArgs, Debug)]
struct WatchArgs {
    /// Poll instead of opening the live channel
    #[arg(long)]
    no_live: bool,

    /// Only patch on push; skip the follow-up snapshot fetch
    #[arg(long)]
    no_refresh_on_push: bool,

    /// Poll interval in seconds (overrides $PSI_POLL_INTERVAL_S)
    #[arg(long)]
    poll_interval: Option<f64>,

    /// Reconnect delay in seconds (overrides $PSI_RECONNECT_DELAY_S)
    #[arg(long)]
    reconnect_delay: Option<f64>,

    /// Country to select once the first snapshot is in
    #[arg(long)]
    select: Option<u64>,

    /// Number of leaderboard rows logged per update
    #[arg(long, default_value_t = 5)]
    top: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut endpoints = Endpoints::from_env();
    if let Some(url) = args.api_url {
        endpoints.api_base = url;
    }
    if let Some(url) = args.ws_url {
        endpoints.live_url = url;
    }

    match args.command {
        Command::Watch(watch_args) => watch(endpoints, watch_args).await?,
        Command::Snapshot { top } => snapshot(endpoints, top).await?,
        Command::Detail { id } => detail(endpoints, CountryId(id)).await?,
    }

    Ok(())
}

fn sync_config(args: &WatchArgs) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    let mut config = SyncConfig::from_env();
    if let Some(secs) = args.poll_interval {
        config.poll_interval = Duration::try_from_secs_f64(secs)?;
    }
    if let Some(secs) = args.reconnect_delay {
        config.reconnect_delay = Duration::try_from_secs_f64(secs)?;
    }
    if args.no_refresh_on_push {
        config.refresh_on_push = false;
    }
    Ok(config)
}

async fn watch(endpoints: Endpoints, args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = sync_config(&args)?;
    let store = SnapshotStore::new();
    let source = Arc::new(HttpSnapshotSource::new(endpoints.clone()));

    let mut controller = LiveSyncController::new(store.clone(), source.clone(), config);
    if !args.no_live {
        controller = controller.with_connector(Arc::new(WsLiveConnector::new(
            endpoints.live_url.clone(),
        )));
    }
    let handle = controller.spawn();
    info!(
        session = handle.session_id(),
        api = %endpoints.api_base,
        live = %endpoints.live_url,
        "watching"
    );

    let mut binder = SceneBinder::new(store.clone(), BinderConfig::default());
    let mut pending_select = args.select.map(CountryId);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = binder.changed() => {}
        }

        let set = binder.hotspots();
        info!(
            revision = set.revision,
            hotspots = set.len(),
            excluded = set.excluded.len(),
            crisis = set.pulsing().count(),
            state = ?handle.state(),
            "globe updated"
        );
        for entry in store.leaderboard(args.top) {
            info!(
                rank = entry.rank,
                country = %entry.country_name,
                psi = entry.psi_score,
                risk = %entry.risk_level,
                "leaderboard"
            );
        }

        if store.is_bootstrapped() {
            if let Some(id) = pending_select.take() {
                binder.pick(id);
                match source.fetch_country(id).await {
                    Ok(detail) => info!(
                        %id,
                        escalation = detail.escalation_probability,
                        protests = detail.protests.len(),
                        elections = detail.elections.len(),
                        "country detail"
                    ),
                    Err(e) => warn!(%id, error = %e, "country detail unavailable"),
                }
            }
        }

        for event in binder.drain_events() {
            match &event.payload.country {
                Some(country) => info!(
                    seq = event.seq,
                    country = %country.name,
                    psi = country.psi_score,
                    risk = %country.risk_level,
                    "{}",
                    event.kind
                ),
                None => info!(seq = event.seq, requested = ?event.payload.requested, "{}", event.kind),
            }
        }
    }

    let report = handle.shutdown().await;
    info!(
        session = %report.session_id,
        last_applied = ?report.last_applied,
        metrics = %report.metrics,
        "session closed"
    );
    Ok(())
}

async fn snapshot(endpoints: Endpoints, top: usize) -> Result<(), Box<dyn std::error::Error>> {
    let source = HttpSnapshotSource::new(endpoints);
    let store = SnapshotStore::new();
    store.replace_all(source.fetch_countries().await?);
    match source.fetch_upcoming_elections().await {
        Ok(elections) => {
            store.replace_elections(elections);
        }
        Err(e) => warn!(error = %e, "upcoming elections unavailable"),
    }

    println!("{:>4}  {:<28} {:>6}  {}", "rank", "country", "psi", "risk");
    for entry in store.leaderboard(top) {
        println!(
            "{:>4}  {:<28} {:>6.1}  {}",
            entry.rank, entry.country_name, entry.psi_score, entry.risk_level
        );
    }

    let elections = store.upcoming_elections();
    if !elections.is_empty() {
        println!();
        println!("upcoming elections");
        for e in elections {
            println!(
                "  {:<28} {:<14} in {:>3} days  (psi {:.1}, {})",
                e.country_name, e.kind, e.days_remaining, e.psi_score, e.risk_level
            );
        }
    }
    Ok(())
}

async fn detail(endpoints: Endpoints, id: CountryId) -> Result<(), Box<dyn std::error::Error>> {
    let source = HttpSnapshotSource::new(endpoints);
    let detail = source.fetch_country(id).await?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}
