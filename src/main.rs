use clap::{Parser, Subcommand};
use pixvault::engine::RasterEngine;
use pixvault::{ContentHash, ImageStore, RawParams, StoreConfig, StoreError, storage};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pixvault")]
#[command(about = "Content-addressable image store with on-demand transformations")]
#[command(long_about = "\
Content-addressable image store with on-demand transformations

Uploads are deduplicated by the SHA-256 of their bytes; the hash is the
image's permanent identifier. Derived variants (resize, crop, rotate,
grayscale, quality, format) are computed on request and optionally cached.

Transformation parameters mirror the serving query string and are
normalized permissively: invalid values fall back to safe defaults rather
than failing.

Run 'pixvault gen-config' to generate a documented pixvault.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults apply when the file doesn't exist)
    #[arg(long, default_value = "pixvault.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store an image, printing its content hash
    Save {
        /// Image file to store
        file: PathBuf,
    },
    /// Print the stored metadata record for a hash as JSON
    Info {
        /// Content hash of a stored original
        hash: String,
    },
    /// Resolve a (possibly transformed) image to an output file
    Get {
        /// Content hash of a stored original
        hash: String,
        /// Output file for the resolved bytes
        #[arg(short, long)]
        output: PathBuf,
        /// Target width (`w`)
        #[arg(short = 'w', long)]
        width: Option<String>,
        /// Target height (`h`)
        #[arg(short = 'H', long)]
        height: Option<String>,
        /// Grayscale flag, "1" enables (`g`)
        #[arg(short = 'g', long)]
        grayscale: Option<String>,
        /// Crop origin x (`x`)
        #[arg(short = 'x', long)]
        crop_x: Option<String>,
        /// Crop origin y (`y`)
        #[arg(short = 'y', long)]
        crop_y: Option<String>,
        /// Rotation in degrees (`r`)
        #[arg(short = 'r', long)]
        rotate: Option<String>,
        /// Re-encode quality 1-100 (`q`)
        #[arg(short = 'q', long)]
        quality: Option<String>,
        /// Persist the computed variant, "1" enables (`s`)
        #[arg(short = 's', long)]
        persist: Option<String>,
        /// Output format (`f`)
        #[arg(short = 'f', long)]
        format: Option<String>,
    },
    /// Print a stock pixvault.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", pixvault::config::stock_config_toml());
        return Ok(());
    }

    let config = if cli.config.exists() {
        StoreConfig::load(&cli.config)?
    } else {
        StoreConfig::default()
    };

    let engine = Arc::new(RasterEngine::new());
    let backend = storage::from_config(&config, engine.clone());
    let store = ImageStore::new(backend, engine, config);

    match cli.command {
        Command::Save { file } => {
            let bytes = std::fs::read(&file)?;
            let hash = store.save_original(&bytes)?;
            println!(
                "{}",
                serde_json::json!({ "message": "upload success", "hash": hash })
            );
        }
        Command::Info { hash } => {
            let hash = parse_hash(&hash)?;
            let record = store.info(&hash)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Get {
            hash,
            output,
            width,
            height,
            grayscale,
            crop_x,
            crop_y,
            rotate,
            quality,
            persist,
            format,
        } => {
            let hash = parse_hash(&hash)?;
            // Raw strings pass straight into the normalizer, exactly like
            // query parameters at the serving boundary.
            let raw = RawParams {
                width,
                height,
                grayscale,
                crop_x,
                crop_y,
                rotate,
                quality,
                persist,
                format,
            };
            let resolved = store.resolve(&hash, &raw)?;
            std::fs::write(&output, &resolved.bytes)?;
            eprintln!(
                "==> {} ({}, {} bytes{})",
                output.display(),
                resolved.content_type,
                resolved.bytes.len(),
                resolved
                    .etag
                    .map(|e| format!(", etag {e}"))
                    .unwrap_or_default()
            );
        }
        Command::GenConfig => unreachable!("handled above"),
    }

    Ok(())
}

/// Validate the user-supplied hash token. Junk tokens map to the same
/// not-found outcome a serving boundary would answer with.
fn parse_hash(token: &str) -> Result<ContentHash, StoreError> {
    ContentHash::parse(token).ok_or(StoreError::NotFound)
}
