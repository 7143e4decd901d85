//! cloudstore CLI
//!
//! Command-line access to a local-directory object store through the
//! storage provider.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use cloudstore::client::Metadata;
use cloudstore::config::ProviderKind;
use cloudstore::{Config, Result, StorageProvider};
use tracing_subscriber::{fmt, EnvFilter};

/// cloudstore CLI
#[derive(Parser, Debug)]
#[command(name = "cloudstore-cli")]
#[command(about = "Inspect and modify a local-directory object store")]
#[command(version)]
struct Args {
    /// Root directory of the object store
    #[arg(short, long, default_value = "./cloudstore_data")]
    root: PathBuf,

    /// Region used when creating buckets
    #[arg(long, default_value = "local")]
    region: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a bucket
    Mb {
        bucket: String,
    },

    /// List objects under a prefix
    Ls {
        bucket: String,

        /// Directory to list (whole bucket if omitted)
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Show size, modification time and metadata of an object
    Head {
        bucket: String,
        path: String,
    },

    /// Download an object to a local file
    Get {
        bucket: String,
        path: String,
        dest: PathBuf,
    },

    /// Upload a local file
    Put {
        src: PathBuf,
        bucket: String,
        path: String,
    },

    /// Copy an object
    Cp {
        src_bucket: String,
        src_path: String,
        dest_bucket: String,
        dest_path: String,
    },

    /// Delete an object
    Rm {
        bucket: String,
        path: String,
    },

    /// Delete every object under a prefix
    Empty {
        bucket: String,

        #[arg(default_value = "")]
        prefix: String,
    },

    /// Replace an object's metadata with KEY=VALUE pairs
    SetMeta {
        bucket: String,
        path: String,

        #[arg(value_parser = parse_pair)]
        pairs: Vec<(String, String)>,
    },
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {}", s))
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cloudstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("cloudstore CLI v{}", cloudstore::VERSION);

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut builder = Config::builder()
        .provider(ProviderKind::Local)
        .local_root(&args.root);

    // Bucket creation goes through startup sanitizing of the destination bucket
    if let Commands::Mb { bucket } = &args.command {
        builder = builder
            .dest_bucket(bucket, &args.region)
            .create_bucket_if_missing(true);
    }

    let provider = StorageProvider::open(builder.build())?;

    match args.command {
        Commands::Mb { bucket } => {
            provider.exists_bucket(&bucket)?;
            println!("make_bucket: {}", bucket);
        }
        Commands::Ls { bucket, prefix } => {
            for name in provider.list_objects(&bucket, &prefix)? {
                println!("{}", name);
            }
        }
        Commands::Head { bucket, path } => {
            let info = provider.head_object(&bucket, &path)?;
            println!("size: {}", info.size);
            println!("last_modified_ms: {}", info.last_modified_ms);
            for (key, value) in &info.metadata {
                println!("meta: {}={}", key, value);
            }
        }
        Commands::Get { bucket, path, dest } => {
            provider.get_object(&bucket, &path, &dest)?;
            println!("download: {}/{} to {}", bucket, path, dest.display());
        }
        Commands::Put { src, bucket, path } => {
            provider.put_object(&src, &bucket, &path)?;
            println!("upload: {} to {}/{}", src.display(), bucket, path);
        }
        Commands::Cp {
            src_bucket,
            src_path,
            dest_bucket,
            dest_path,
        } => {
            provider.copy_object(&src_bucket, &src_path, &dest_bucket, &dest_path)?;
            println!(
                "copy: {}/{} to {}/{}",
                src_bucket, src_path, dest_bucket, dest_path
            );
        }
        Commands::Rm { bucket, path } => {
            provider.delete_object(&bucket, &path)?;
            println!("delete: {}/{}", bucket, path);
        }
        Commands::Empty { bucket, prefix } => {
            provider.empty_bucket(&bucket, &prefix)?;
            println!("emptied: {}/{}", bucket, prefix);
        }
        Commands::SetMeta {
            bucket,
            path,
            pairs,
        } => {
            let metadata: Metadata = pairs.into_iter().collect();
            provider.put_object_metadata(&bucket, &path, &metadata)?;
            println!("metadata: {}/{} ({} entries)", bucket, path, metadata.len());
        }
    }

    Ok(())
}
