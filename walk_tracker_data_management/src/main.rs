use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walk_tracker_data_management::{default_export_path, StoreConfig, WalkStore, WalkStoreError, DEFAULT_RECENT_LIMIT};

// CLI for manual data operations
#[derive(Parser)]
#[command(about = "Inspect and maintain the walk database")]
struct Cli {
    /// Database file, defaults to data/walks.db under the project root
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Most recent walks, newest first
    List {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: u32,
    },
    /// Totals over all walks
    Stats,
    /// One walk and its route
    Show { walk_id: i64 },
    /// Delete a walk and its route
    Delete { walk_id: i64 },
    /// Write a walk as GPX
    Export {
        walk_id: i64,
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = cli.database.map(StoreConfig::File).unwrap_or_default();

    if let Err(err) = run(config, cli.command).await {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}

async fn run(config: StoreConfig, command: Command) -> Result<(), WalkStoreError> {
    let store = WalkStore::open(config).await?;

    match command {
        Command::List { limit } => {
            for walk in store.get_recent_walks(limit).await? {
                println!(
                    "{:>5}  {}  {:>6}s  {:>9.1}m",
                    walk.id.unwrap_or_default(),
                    walk.start_time.format("%Y-%m-%d %H:%M"),
                    walk.duration,
                    walk.distance.unwrap_or(0.),
                );
            }
        }
        Command::Stats => {
            let stats = store.get_walk_stats().await?;
            println!("Walks:            {}", stats.total_walks);
            println!("Total duration:   {}s", stats.total_duration);
            println!("Total distance:   {:.1}m", stats.total_distance);
            println!("Average duration: {:.1}s", stats.average_duration);
        }
        Command::Show { walk_id } => {
            let walk = store.get_walk_by_id(walk_id).await?.ok_or(WalkStoreError::WalkNotFound(walk_id))?;
            println!("{walk:#?}");
            for point in store.get_route_points(walk_id).await? {
                println!("{}  {:.6}, {:.6}", point.timestamp.to_rfc3339(), point.latitude, point.longitude);
            }
        }
        Command::Delete { walk_id } => {
            store.delete_walk(walk_id).await?;
        }
        Command::Export { walk_id, out } => {
            let path = match out {
                Some(path) => path,
                None => {
                    let root = project_root::get_project_root().unwrap_or_else(|_| PathBuf::from("."));
                    default_export_path(&root, walk_id)
                }
            };
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            store.export_gpx_file(walk_id, &path).await?;
            tracing::info!("Exported walk {walk_id} to {path:?}");
        }
    }

    store.close().await;
    Ok(())
}
