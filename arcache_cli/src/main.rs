use std::fs::File;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use arcache_codecs::{codec_for, unpack, Bzip2Codec, GzipCodec, NoneCodec};
use arcache_core::{
    encode_frame, Codec, CompressionType, DirectorySource, Frame, Manifest, StoreBuilder,
    TrailerPolicy,
};
use arcache_server::config::DEFAULT_BIND;
use arcache_server::wire::DEFAULT_MAX_RESPONSE_SIZE;
use arcache_server::snapshot::{load_snapshot, reload};
use arcache_server::{Client, Dispatcher, Server, ServerConfig, StoreHandle};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "arcache",
    about = "Versioned game-asset archive store: serve, inspect and fetch archives",
    version
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a snapshot directory over TCP
    ///
    /// On unix, SIGHUP reloads the snapshot from disk and publishes it
    /// atomically; requests already in flight finish on the old one.
    Serve {
        /// JSON config file; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Snapshot directory containing manifest.json
        #[arg(short, long)]
        root: Option<PathBuf>,
        /// Listen address (default: 127.0.0.1:43594)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
        /// Pack every archive at load time and serve from memory
        #[arg(long)]
        preload: bool,
        /// Trailer written after compressed payloads: archive-revision | zero
        #[arg(long)]
        trailer: Option<String>,
    },
    /// Print index metadata for a snapshot directory
    Inspect {
        /// Snapshot directory containing manifest.json
        root: PathBuf,
        /// Print per-archive details
        #[arg(long)]
        archives: bool,
    },
    /// Request one (channel, id) pair from a running server
    Fetch {
        /// Server address
        #[arg(short, long, default_value = DEFAULT_BIND)]
        addr: SocketAddr,
        /// Index id, or 255 for the control channel
        channel: u8,
        /// Archive id, or index id / 255 on the control channel
        id: u8,
        /// Write bytes to a file instead of printing a hex dump
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep the response framed instead of decompressing it
        #[arg(long)]
        framed: bool,
        /// Refuse responses larger than this many bytes
        #[arg(long, default_value_t = DEFAULT_MAX_RESPONSE_SIZE)]
        max_response_size: usize,
    },
    /// Compress and frame a raw file
    Pack {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination framed file
        output: PathBuf,
        /// Compression: none | gzip | bzip2
        #[arg(short, long, default_value = "gzip")]
        compression: CompressionType,
        /// Codec level (gzip 0–9, bzip2 1–9)
        #[arg(short, long)]
        level: Option<u32>,
        /// Trailer value for compressed frames
        #[arg(long, default_value_t = 0)]
        trailer: u32,
    },
    /// Decode a framed file back to raw bytes
    Unpack {
        /// Framed file
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn codec_with_level(compression: CompressionType, level: Option<u32>) -> Box<dyn Codec> {
    match (compression, level) {
        (CompressionType::None, _) => Box::new(NoneCodec),
        (CompressionType::Gzip, Some(l)) => Box::new(GzipCodec::new(l)),
        (CompressionType::Gzip, None) => Box::new(GzipCodec::default()),
        (CompressionType::Bzip2, Some(l)) => Box::new(Bzip2Codec::new(l)),
        (CompressionType::Bzip2, None) => Box::new(Bzip2Codec::default()),
    }
}

fn parse_trailer_policy(name: &str) -> anyhow::Result<TrailerPolicy> {
    match name {
        "archive-revision" | "revision" => Ok(TrailerPolicy::ArchiveRevision),
        "zero" => Ok(TrailerPolicy::Zero),
        other => anyhow::bail!(
            "unknown trailer policy '{}'. Valid options: archive-revision, zero",
            other
        ),
    }
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn hex_dump(label: &str, bytes: &[u8]) {
    let preview = &bytes[..bytes.len().min(256)];
    println!("--- {} ({} bytes, first {} shown) ---", label, bytes.len(), preview.len());
    for (i, chunk) in preview.chunks(16).enumerate() {
        print!("  {:04x}  ", i * 16);
        for b in chunk {
            print!("{:02x} ", b);
        }
        for _ in chunk.len()..16 {
            print!("   ");
        }
        print!("  |");
        for b in chunk {
            if b.is_ascii_graphic() || *b == b' ' {
                print!("{}", *b as char);
            } else {
                print!(".");
            }
        }
        println!("|");
    }
    if bytes.len() > 256 {
        println!("  ... ({} bytes remaining not shown)", bytes.len() - 256);
    }
}

fn read_input(input: &Path) -> anyhow::Result<Vec<u8>> {
    let mut data = Vec::new();
    if input.to_str() == Some("-") {
        io::stdin().lock().read_to_end(&mut data)?;
    } else {
        File::open(input)
            .with_context(|| format!("opening input file {:?}", input))?
            .read_to_end(&mut data)?;
    }
    Ok(data)
}

fn write_output(output: &Path, data: &[u8]) -> anyhow::Result<()> {
    if output.to_str() == Some("-") {
        io::stdout().write_all(data)?;
    } else {
        std::fs::write(output, data).with_context(|| format!("creating output file {:?}", output))?;
    }
    Ok(())
}

// ── Subcommand implementations ─────────────────────────────────────────────

async fn run_serve(
    config: Option<PathBuf>,
    root: Option<PathBuf>,
    bind: Option<SocketAddr>,
    preload: bool,
    trailer: Option<String>,
) -> anyhow::Result<()> {
    let mut cfg = match config {
        Some(path) => ServerConfig::from_json_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(root) = root {
        cfg.root = root;
    }
    if let Some(bind) = bind {
        cfg.bind = bind;
    }
    if preload {
        cfg.preload = true;
    }
    if let Some(name) = trailer {
        cfg.trailer_policy = parse_trailer_policy(&name)?;
    }

    let snapshot = {
        let cfg = cfg.clone();
        tokio::task::spawn_blocking(move || {
            load_snapshot(&cfg.root, cfg.preload, cfg.trailer_policy)
        })
        .await??
    };
    let handle = StoreHandle::new(snapshot);

    let dispatcher = Dispatcher::new(handle.clone(), cfg.trailer_policy);
    let server = Server::bind(cfg.bind, dispatcher, cfg.max_response_size).await?;

    #[cfg(unix)]
    spawn_reload_on_hangup(handle, cfg);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

#[cfg(unix)]
fn spawn_reload_on_hangup(handle: StoreHandle, cfg: ServerConfig) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGHUP; reload disabled");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            info!(root = %cfg.root.display(), "SIGHUP received, reloading snapshot");
            let handle = handle.clone();
            let cfg = cfg.clone();
            let task = tokio::task::spawn_blocking(move || {
                reload(&handle, &cfg.root, cfg.preload, cfg.trailer_policy)
            });
            // reload logs its own failure and keeps the old snapshot
            if let Err(e) = task.await {
                error!(error = %e, "reload task failed; keeping current snapshot");
            }
        }
    });
}

fn run_inspect(root: PathBuf, show_archives: bool) -> anyhow::Result<()> {
    let source = DirectorySource::new(&root);
    let manifest =
        Manifest::load(&root).with_context(|| format!("loading manifest from {:?}", root))?;
    let store = StoreBuilder::new(&source).build(&manifest)?;
    store.verify()?;

    println!("=== arcache snapshot: {:?} ===", root);
    println!();
    println!("  indexes        : {}", store.len());
    println!(
        "  archives       : {}",
        store.indexes().map(|i| i.len()).sum::<usize>()
    );
    println!();
    println!("  {:>5}  {:>8}  {:>10}  {:>8}", "index", "crc", "revision", "archives");
    println!("  {}", "-".repeat(38));
    for index in store.indexes() {
        println!(
            "  {:>5}  {:08x}  {:>10}  {:>8}",
            index.id(),
            index.crc(),
            index.revision(),
            index.len()
        );
        if show_archives {
            for archive in index.archives() {
                let raw_len = std::fs::metadata(source.path_of(index.id(), archive.id()))
                    .map(|m| m.len())
                    .unwrap_or(0);
                println!(
                    "         archive {:>3}  crc {:08x}  rev {:>6}  {:<5}  {}",
                    archive.id(),
                    archive.crc(),
                    archive.revision(),
                    codec_for(archive.compression()).name(),
                    human_bytes(raw_len)
                );
            }
        }
    }
    Ok(())
}

async fn run_fetch(
    addr: SocketAddr,
    channel: u8,
    id: u8,
    output: Option<PathBuf>,
    framed: bool,
    max_response_size: usize,
) -> anyhow::Result<()> {
    let mut client = Client::connect(addr)
        .await?
        .with_max_response_size(max_response_size);

    let t0 = Instant::now();
    let response = client.request(channel, id).await?;
    let elapsed = t0.elapsed();

    let frame = Frame::decode(&response)?;
    eprintln!(
        "  ({}, {}) {} frame, {} payload in {:.3}ms",
        channel,
        id,
        codec_for(frame.compression).name(),
        human_bytes(frame.payload.len() as u64),
        elapsed.as_secs_f64() * 1000.0
    );
    if let Some(trailer) = frame.trailer {
        eprintln!("  trailer     : {}", trailer);
    }

    let bytes = if framed { response } else { unpack(&response)? };
    match output {
        Some(path) => {
            write_output(&path, &bytes)?;
            eprintln!("  written to {:?}", path);
        }
        None => hex_dump(&format!("({channel}, {id})"), &bytes),
    }
    Ok(())
}

fn run_pack(
    input: PathBuf,
    output: PathBuf,
    compression: CompressionType,
    level: Option<u32>,
    trailer: u32,
) -> anyhow::Result<()> {
    let codec = codec_with_level(compression, level);
    let raw = read_input(&input)?;

    let t0 = Instant::now();
    let compressed = codec.compress(&raw)?;
    let framed = encode_frame(compression, &compressed, trailer)?;
    let elapsed = t0.elapsed();
    write_output(&output, &framed)?;

    eprintln!("  codec       : {}", codec.name());
    eprintln!("  raw size    : {}", human_bytes(raw.len() as u64));
    eprintln!("  framed      : {}", human_bytes(framed.len() as u64));
    eprintln!(
        "  ratio       : {:.2}x",
        raw.len() as f64 / framed.len().max(1) as f64
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_unpack(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let framed = read_input(&input)?;
    let raw = unpack(&framed).with_context(|| format!("decoding {:?}", input))?;
    write_output(&output, &raw)?;
    eprintln!("  raw size    : {}", human_bytes(raw.len() as u64));
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    match cli.command {
        Commands::Serve {
            config,
            root,
            bind,
            preload,
            trailer,
        } => run_serve(config, root, bind, preload, trailer).await,
        Commands::Inspect { root, archives } => run_inspect(root, archives),
        Commands::Fetch {
            addr,
            channel,
            id,
            output,
            framed,
            max_response_size,
        } => run_fetch(addr, channel, id, output, framed, max_response_size).await,
        Commands::Pack {
            input,
            output,
            compression,
            level,
            trailer,
        } => run_pack(input, output, compression, level, trailer),
        Commands::Unpack { input, output } => run_unpack(input, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fetch_and_pack() {
        let cli = Cli::try_parse_from(["arcache", "fetch", "255", "255", "--framed"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Fetch {
                channel: 255,
                id: 255,
                framed: true,
                max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["arcache", "fetch", "0", "1", "--max-response-size", "4096"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Fetch { max_response_size: 4096, .. }));

        let cli = Cli::try_parse_from(["arcache", "pack", "in", "out", "-c", "bzip2", "-l", "5"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Pack { compression: CompressionType::Bzip2, level: Some(5), .. }
        ));

        assert!(Cli::try_parse_from(["arcache", "fetch", "256", "0"]).is_err());
    }

    #[test]
    fn trailer_policy_names() {
        assert_eq!(parse_trailer_policy("zero").unwrap(), TrailerPolicy::Zero);
        assert_eq!(
            parse_trailer_policy("archive-revision").unwrap(),
            TrailerPolicy::ArchiveRevision
        );
        assert!(parse_trailer_policy("crc").is_err());
    }

    #[test]
    fn pack_then_unpack_files() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        let framed = dir.path().join("framed");
        let back = dir.path().join("back");
        std::fs::write(&raw, b"pack me pack me pack me").unwrap();

        for compression in CompressionType::ALL {
            run_pack(raw.clone(), framed.clone(), compression, None, 11).unwrap();
            let bytes = std::fs::read(&framed).unwrap();
            assert_eq!(Frame::decode(&bytes).unwrap().compression, compression);
            run_unpack(framed.clone(), back.clone()).unwrap();
            assert_eq!(std::fs::read(&back).unwrap(), b"pack me pack me pack me");
        }
    }
}
