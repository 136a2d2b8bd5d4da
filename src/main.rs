use anisong::{
    evaluate_version, select_k, train_catalog, Catalog, Config, FeatureTable, HttpFeatureLookup,
    ModelStore, Recommendation, Recommender, Record, SongStore,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Anime song recommender: cluster a song catalog by audio features and
/// suggest similar songs for a query track
#[derive(Parser, Debug)]
#[command(name = "anisong")]
#[command(version)]
struct Args {
    /// TOML config file; compiled defaults when omitted
    #[arg(short, long, env = "ANISONG_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite catalog, overrides `database_path`
    #[arg(long, env = "ANISONG_DB")]
    db: Option<PathBuf>,

    /// Model pack directory, overrides `model_dir`
    #[arg(long, env = "ANISONG_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the song database
    CreateDb,
    /// Add songs from a JSON array of raw song records
    Ingest {
        #[arg(long)]
        data: PathBuf,
    },
    /// Cluster the catalog, label every song and save a new model version
    Train {
        #[arg(long)]
        k: Option<usize>,
    },
    /// Inertia and silhouette across a range of k
    SelectK {
        #[arg(long)]
        k_min: Option<usize>,
        #[arg(long)]
        k_max: Option<usize>,
    },
    /// Silhouette score of the stored labels
    Evaluate {
        #[arg(long)]
        version: Option<String>,
    },
    /// Recommend catalog songs similar to a looked-up track
    Recommend {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        artist: String,
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Show the first songs of the catalog
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.database_path = db;
    }
    if let Some(dir) = args.model_dir {
        config.model_dir = dir;
    }
    let models = ModelStore::new(&config.model_dir);
    let start = Instant::now();

    match args.command {
        Command::CreateDb => {
            if let Some(parent) = config.database_path.parent() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
            SongStore::open(&config.database_path)?;
            info!(path = %config.database_path.display(), "Database created");
        }
        Command::Ingest { data } => {
            let content = std::fs::read_to_string(&data)
                .context(format!("Failed to read {}", data.display()))?;
            let records: Vec<Record> =
                serde_json::from_str(&content).context("Expected a JSON array of song records")?;
            let raw = FeatureTable::from_records(&records)?;
            let cleaned = config.pipeline().clean(&raw)?;
            let catalog = Catalog::from_table(&cleaned)?;

            let mut store = SongStore::open(&config.database_path)?;
            let added = store.insert_songs(catalog.songs())?;
            println!("✓ {} songs have been added to the database", added);
        }
        Command::Train { k } => {
            let k = k.unwrap_or(config.training.k);
            let mut store = SongStore::open(&config.database_path)?;
            let report = train_catalog(&mut store, &models, &config, k)?;
            println!("✓ Trained k={} model version {}", report.k, report.version);
            println!("  Inertia:     {:.4}", report.inertia);
            println!("  Iterations:  {}", report.iterations);
            println!("  Labeled:     {} songs", report.labeled);
        }
        Command::SelectK { k_min, k_max } => {
            let store = SongStore::open(&config.database_path)?;
            let k_min = k_min.unwrap_or(config.training.k_min);
            let k_max = k_max.unwrap_or(config.training.k_max);
            println!("{:>4}  {:>12}  {:>10}  sizes", "k", "inertia", "silhouette");
            for d in select_k(&store, &config, k_min, k_max)? {
                let silhouette = match &d.silhouette {
                    Ok(s) => format!("{:.4}", s),
                    Err(_) => "n/a".to_string(),
                };
                println!(
                    "{:>4}  {:>12.4}  {:>10}  {:?}",
                    d.k, d.inertia, silhouette, d.cluster_sizes
                );
            }
        }
        Command::Evaluate { version } => {
            let store = SongStore::open(&config.database_path)?;
            let score = evaluate_version(&store, &models, version.as_deref())?;
            println!("Silhouette score: {:.4}", score);
        }
        Command::Recommend {
            title,
            artist,
            top_n,
        } => {
            let store = SongStore::open(&config.database_path)?;
            let lookup = HttpFeatureLookup::from_env(
                config.lookup.endpoint.clone(),
                &config.lookup.token_env,
                config.lookup.timeout(),
            )?;
            let recommender = Recommender::new(lookup, config.pipeline(), models.latest()?);
            let n = top_n.unwrap_or(config.top_n);

            match recommender.recommend(&store, &title, &artist, n)? {
                Recommendation::NotFound => {
                    println!("The song you are looking for was not found. Please search for a new song.");
                }
                Recommendation::Found {
                    query,
                    cluster_id,
                    songs,
                } => {
                    println!(
                        "Songs similar to {}{} (cluster {}):",
                        query.title,
                        query
                            .artist
                            .as_deref()
                            .map(|a| format!(" by {}", a))
                            .unwrap_or_default(),
                        cluster_id
                    );
                    for (i, s) in songs.iter().enumerate() {
                        println!("  {:>2}. {}  [{:.4}]", i + 1, s.song.title, s.score);
                    }
                }
            }
        }
        Command::List { limit } => {
            let store = SongStore::open(&config.database_path)?;
            let songs = store.get_songs(limit.unwrap_or(config.max_rows_show))?;
            for s in &songs {
                let cluster = s
                    .cluster_id
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:>4}  {}  ({})", cluster, s.title, s.track_uri);
            }
            let stats = store.get_stats()?;
            println!(
                "{} of {} songs shown, {} labeled",
                songs.len(),
                stats.song_count,
                stats.labeled_count
            );
            if let Some(version) = store.label_version()? {
                println!("Labels from model version {}", version);
            }
        }
    }

    info!(elapsed_s = start.elapsed().as_secs_f64(), "Done");
    Ok(())
}
