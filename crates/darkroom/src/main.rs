use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::stream::TryStreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use darkroom_core::PhotoService;
use darkroom_objectstore::AnyObjectStore;

mod config;
use crate::config::{AnyMetadata, Config};

type Service = PhotoService<AnyObjectStore, AnyMetadata>;

#[derive(Parser)]
struct Cli {
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new, empty album
    CreateAlbum { name: String },
    GetAlbum { name: String },
    /// List the photos stored in an album
    ListPhotos { album: String },
    /// Upload a `<prefix>,<base64>` payload read from a file
    Upload { album: String, payload_file: PathBuf },
    /// Write the bytes of a stored photo to a file
    Fetch {
        album: String,
        hash: String,
        out_file: PathBuf,
    },
    /// Check whether the object behind a photo is present in storage
    Exists { album: String, hash: String },
    /// Print a time-limited URL for a stored photo
    SignedUrl {
        album: String,
        hash: String,
        /// validity in seconds, defaults to the configured signed_url_ttl
        #[arg(long)]
        ttl: Option<u64>,
    },
    GetPhoto { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .compact()
        .init();

    // load configuration
    let mut config_file = File::open(cli.config_file.unwrap_or("./dev-config.yml".into()))?;
    let mut s = String::new();
    config_file.read_to_string(&mut s)?;
    let config: Config = serde_yaml::from_str(&s)?;

    // initialize persistence layer
    let objects = config.objects.new_objects().await?;
    let metadata = config.metadata.new_metadata().await?;
    let service: Service = PhotoService::new(objects, metadata, config.photos).await?;

    run(&service, cli.command).await
}

async fn run(service: &Service, command: Command) -> Result<()> {
    match command {
        Command::CreateAlbum { name } => print_json(&service.create_album(&name).await?),
        Command::GetAlbum { name } => print_json(&service.get_album(&name).await?),
        Command::ListPhotos { album } => {
            let album = service.get_album(&album).await?;
            print_json(&service.list_album_photos(&album).await?)
        }
        Command::Upload {
            album,
            payload_file,
        } => {
            let album = service.get_album(&album).await?;
            let payload = tokio::fs::read(&payload_file).await?;
            print_json(&service.upload_photo_bytes(payload, &album).await?)
        }
        Command::Fetch {
            album,
            hash,
            out_file,
        } => {
            let album = service.get_album(&album).await?;
            let mut body = service.fetch_photo_bytes(&album, &hash).await?;
            let mut out = tokio::fs::File::create(&out_file).await?;
            let mut written = 0;
            while let Some(chunk) = body.try_next().await? {
                out.write_all(&chunk).await?;
                written += chunk.len();
            }
            out.flush().await?;
            tracing::info!("wrote {written} bytes to {}", out_file.display());
            Ok(())
        }
        Command::Exists { album, hash } => {
            let album = service.get_album(&album).await?;
            let exists = service.photo_exists(&album, &hash).await?;
            println!("{exists}");
            Ok(())
        }
        Command::SignedUrl { album, hash, ttl } => {
            let album = service.get_album(&album).await?;
            let url = service
                .fetch_signed_url(&album, &hash, ttl.map(Duration::from_secs))
                .await?;
            println!("{url}");
            Ok(())
        }
        Command::GetPhoto { id } => print_json(&service.get_photo(&id).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
