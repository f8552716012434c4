use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lkma::{
    AnalyzerConfig, Component, ComponentRegistry, FullDumpMode, MemoryAnalyzer, TrieBlob,
    TrieBuilder,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lkma", about = "Memory-usage attribution reports from a call-site trie")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the attribution report for a trie blob.
    Report {
        /// Serialized trie blob.
        #[arg(long)]
        trie: PathBuf,
        /// Node offsets table (little-endian u64 array).
        #[arg(long)]
        offsets: PathBuf,
        /// Component counters (`<name>\t<bytes>` per line).
        #[arg(long)]
        components: Option<PathBuf>,
        /// Only report components and call-sites with this name.
        #[arg(long)]
        filter: Option<String>,
        /// Bytes requested per read.
        #[arg(long, default_value_t = 4096)]
        chunk_size: usize,
        /// Full dump shows each node's own counter instead of its subtree total.
        #[arg(long)]
        self_only: bool,
    },
    /// Print every decoded node and the sorted call-site index.
    Inspect {
        /// Serialized trie blob.
        #[arg(long)]
        trie: PathBuf,
        /// Node offsets table (little-endian u64 array).
        #[arg(long)]
        offsets: PathBuf,
    },
    /// Build a small synthetic trie and print its report.
    Demo,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            trie,
            offsets,
            components,
            filter,
            chunk_size,
            self_only,
        } => run_report(
            &trie,
            &offsets,
            components.as_deref(),
            filter,
            chunk_size,
            self_only,
        )?,
        Commands::Inspect { trie, offsets } => run_inspect(&trie, &offsets)?,
        Commands::Demo => run_demo()?,
    }

    Ok(())
}

fn run_report(
    trie_path: &Path,
    offsets_path: &Path,
    components_path: Option<&Path>,
    filter: Option<String>,
    chunk_size: usize,
    self_only: bool,
) -> Result<()> {
    if chunk_size == 0 {
        bail!("--chunk-size must be at least 1");
    }

    let trie = load_trie(trie_path, offsets_path)?;
    let components = match components_path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open components file {}", path.display()))?;
            ComponentRegistry::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse components file {}", path.display()))?
        }
        None => ComponentRegistry::new(),
    };

    let mut config = AnalyzerConfig::default();
    if self_only {
        config = config.with_full_dump_mode(FullDumpMode::SelfOnly);
    }
    let analyzer = MemoryAnalyzer::new(Arc::new(trie), Arc::new(components), config)
        .context("failed to index trie")?;

    if let Some(name) = filter {
        analyzer
            .write_control(name.as_bytes())
            .with_context(|| format!("invalid filter '{}'", name))?;
    }

    print_session(&analyzer, chunk_size)
}

fn run_inspect(trie_path: &Path, offsets_path: &Path) -> Result<()> {
    let trie = Arc::new(load_trie(trie_path, offsets_path)?);
    let analyzer = MemoryAnalyzer::new(
        Arc::clone(&trie),
        Arc::new(ComponentRegistry::new()),
        AnalyzerConfig::default(),
    )
    .context("failed to index trie")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(
        out,
        "{} nodes, extent {} bytes, blake3 {}",
        trie.node_count(),
        trie.extent(),
        trie.fingerprint().to_hex()
    )?;
    for node in trie.nodes() {
        let layout = trie.layout(node);
        let parent = if trie.is_root(node) {
            "-".to_string()
        } else {
            trie.parent_of(node)
                .map(|parent| parent.offset().to_string())
                .unwrap_or_else(|err| format!("<{}>", err))
        };
        let children: Vec<String> = trie
            .children_of(node)
            .map(|child| match child {
                Ok(child) => child.offset().to_string(),
                Err(err) => format!("<{}>", err),
            })
            .collect();
        writeln!(
            out,
            "{:>8}  counter={:<10} name={:?} parent={} children=[{}] size={}",
            node.offset(),
            trie.self_count(node),
            String::from_utf8_lossy(trie.name_of(node)),
            parent,
            children.join(", "),
            layout.size()
        )?;
    }

    writeln!(out, "index:")?;
    let snapshot = analyzer.snapshot();
    for (position, node) in snapshot.index().entries().iter().enumerate() {
        writeln!(
            out,
            "{:>8}  {:?} @{}",
            position,
            String::from_utf8_lossy(trie.name_of(*node)),
            node.offset()
        )?;
    }
    Ok(())
}

fn run_demo() -> Result<()> {
    let mut builder = TrieBuilder::new();
    let root = builder.root();
    let kernel = builder.node(root, "kernel", 0)?;
    builder.node(kernel, "fork.c", 12_288)?;
    builder.node(kernel, "exit.c", 512)?;
    let mm = builder.node(root, "mm", 1_024)?;
    builder.node(mm, "slab.c", 65_536)?;
    builder.node(mm, "vmalloc.c", 8_192)?;

    let trie = builder.build().load().context("demo trie failed to load")?;
    let components = ComponentRegistry::with_components([
        Component::new("ext4", 40_960),
        Component::new("e1000e", 16_384),
    ]);
    let analyzer = MemoryAnalyzer::new(
        Arc::new(trie),
        Arc::new(components),
        AnalyzerConfig::default(),
    )?;

    print_session(&analyzer, 4096)
}

fn print_session(analyzer: &MemoryAnalyzer, chunk_size: usize) -> Result<()> {
    let mut session = analyzer.open_session();
    let mut chunk = vec![0u8; chunk_size];
    let stdout = io::stdout();
    let mut out = stdout.lock();

    loop {
        let n = session.read(&mut chunk).context("report generation failed")?;
        if n == 0 {
            break;
        }
        out.write_all(&chunk[..n])?;
    }
    out.flush()?;
    Ok(())
}

fn load_trie(trie_path: &Path, offsets_path: &Path) -> Result<TrieBlob> {
    let bytes = std::fs::read(trie_path)
        .with_context(|| format!("failed to read trie blob {}", trie_path.display()))?;
    let offsets = read_offsets(offsets_path)?;
    TrieBlob::load(bytes, &offsets)
        .with_context(|| format!("failed to load trie blob {}", trie_path.display()))
}

fn read_offsets(path: &Path) -> Result<Vec<u64>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read offsets file {}", path.display()))?;
    if raw.len() % 8 != 0 {
        bail!(
            "offsets file {} is {} bytes, not a multiple of 8",
            path.display(),
            raw.len()
        );
    }
    Ok(raw
        .chunks_exact(8)
        .map(|word| {
            let mut le = [0u8; 8];
            le.copy_from_slice(word);
            u64::from_le_bytes(le)
        })
        .collect())
}
