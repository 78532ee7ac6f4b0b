//! kmem: dispatch inspector
//!
//! Shows which instruction form a load lowers to on each hardware tier.

use clap::{Parser, Subcommand};
use miette::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use kernmem::movement::{LoadRequest, dispatch_table, plan_load};
use kernmem::policy::{AccessMode, EvictionPolicy, PrefetchDistance};
use kernmem::warp::{self, ShuffleMode, WARP_SIZE};
use kernmem::{HardwareTier, TargetTier, TierTable};

#[derive(Parser)]
#[command(name = "kmem")]
#[command(author = "Demetrios Chiuratto Agourakis, Dionisio Chiuratto Agourakis")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect tiered memory-load dispatch", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Tier table overrides (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the form and chunking of one load
    Plan {
        /// Hardware tier
        #[arg(short, long, default_value = "sm80")]
        tier: HardwareTier,

        /// read-only or read-write
        #[arg(short, long, default_value = "read-write")]
        access: AccessMode,

        /// none, normal, first, last, unchanged, no-allocate
        #[arg(short, long, default_value = "none")]
        eviction: EvictionPolicy,

        /// none, 64B, 128B, 256B
        #[arg(short, long, default_value = "none")]
        prefetch: PrefetchDistance,

        /// Element size in bytes
        #[arg(short, long)]
        size: usize,

        /// Element alignment in bytes (defaults to the natural alignment of the size)
        #[arg(long)]
        element_align: Option<usize>,

        /// Number of elements
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Chunk alignment of an array load
        #[arg(long)]
        align: Option<usize>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the form of every policy combination on a tier
    Table {
        /// Hardware tier
        #[arg(short, long, default_value = "sm80")]
        tier: HardwareTier,

        /// Access width in bytes
        #[arg(short, long, default_value = "4")]
        width: usize,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the tier feature table
    Tiers {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the source lane of every lane for one shuffle
    Shuffle {
        /// idx, up, down or bfly
        #[arg(short, long, value_enum)]
        mode: ModeArg,

        /// Source lane (idx), delta (up/down) or xor mask (bfly)
        #[arg(short, long)]
        offset: u32,

        /// Sub-warp width
        #[arg(short, long, default_value = "32")]
        width: u32,
    },

    /// Show information about this build
    Info,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ModeArg {
    Idx,
    Up,
    Down,
    Bfly,
}

impl From<ModeArg> for ShuffleMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Idx => ShuffleMode::Idx,
            ModeArg::Up => ShuffleMode::Up,
            ModeArg::Down => ShuffleMode::Down,
            ModeArg::Bfly => ShuffleMode::Bfly,
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let table = match &cli.config {
        Some(path) => TierTable::load(path)?,
        None => TierTable::builtin(),
    };

    match cli.command {
        Commands::Plan {
            tier,
            access,
            eviction,
            prefetch,
            size,
            element_align,
            count,
            align,
            json,
        } => {
            let mut req = LoadRequest::new(size, element_align.unwrap_or_else(|| natural_align(size)))
                .count(count)
                .access(access)
                .eviction(eviction)
                .prefetch(prefetch);
            if let Some(align) = align {
                req = req.aligned(align);
            }
            plan(&table, tier, &req, json)
        }

        Commands::Table { tier, width, json } => show_table(&table, tier, width, json),

        Commands::Tiers { json } => tiers(&table, json),

        Commands::Shuffle { mode, offset, width } => shuffle(mode.into(), offset, width),

        Commands::Info => info(),
    }
}

/// Largest power of two dividing `size`, capped at the widest access
fn natural_align(size: usize) -> usize {
    if size == 0 {
        1
    } else {
        (size & size.wrapping_neg()).min(16)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| miette::miette!("Failed to serialize output: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn plan(table: &TierTable, tier: HardwareTier, req: &LoadRequest, json: bool) -> Result<()> {
    tracing::info!("Planning {}-byte x {} load on {}", req.element_size, req.count, tier);

    let features = table.features(tier);
    let plan = plan_load(features, req)?;

    if json {
        #[derive(Serialize)]
        struct Output<'a> {
            tier: HardwareTier,
            request: &'a LoadRequest,
            plan: &'a kernmem::movement::LoadPlan,
        }
        return print_json(&Output {
            tier,
            request: req,
            plan: &plan,
        });
    }

    println!("tier:     {tier}");
    println!(
        "request:  {} x {} bytes, {} / evict {} / prefetch {}",
        req.count, req.element_size, req.access, req.eviction, req.prefetch
    );
    match plan.form {
        Some(form) => println!("form:     {form}"),
        None => println!("form:     plain (no qualifiers requested)"),
    }
    println!("chunks:   {} x {} bytes", plan.chunk_count, plan.chunk_bytes);
    if let Some(mnemonic) = &plan.mnemonic {
        println!("emits:    {mnemonic}");
    }
    Ok(())
}

fn show_table(table: &TierTable, tier: HardwareTier, width: usize, json: bool) -> Result<()> {
    if !width.is_power_of_two() || width > 16 {
        return Err(miette::miette!(
            "access width must be a power of two no wider than 16 bytes, got {}",
            width
        ));
    }
    let rows = dispatch_table(table.features(tier), width);
    tracing::debug!("{} dispatch rows for {}", rows.len(), tier);

    if json {
        return print_json(&rows);
    }

    println!("{:<11} {:<12} {:<9} form", "access", "eviction", "prefetch");
    for row in &rows {
        println!(
            "{:<11} {:<12} {:<9} {}",
            row.access.to_string(),
            row.eviction.to_string(),
            row.prefetch.to_string(),
            row.mnemonic
        );
    }
    Ok(())
}

fn tiers(table: &TierTable, json: bool) -> Result<()> {
    if json {
        return print_json(table);
    }

    println!("{:<9} {:<15} {:<13} max_prefetch", "tier", "eviction_hints", "non_coherent");
    for (tier, row) in table.rows() {
        let marker = if table.is_builtin(tier) { "" } else { "  (overridden)" };
        println!(
            "{:<9} {:<15} {:<13} {}{}",
            tier.to_string(),
            row.eviction_hints,
            row.non_coherent,
            row.max_prefetch,
            marker
        );
    }
    Ok(())
}

fn shuffle(mode: ShuffleMode, offset: u32, width: u32) -> Result<()> {
    if offset >= WARP_SIZE {
        return Err(miette::miette!("offset must be less than {}, got {}", WARP_SIZE, offset));
    }
    if !width.is_power_of_two() || width > WARP_SIZE {
        return Err(miette::miette!("width must be a power of two up to {}, got {}", WARP_SIZE, width));
    }

    let c = warp::clamp_segmask(mode, width);
    let lanes: [u32; 32] = std::array::from_fn(|i| i as u32);
    let out = warp::shuffle_warp(mode, &lanes, offset, c);

    println!("shfl.sync.{mode}.b32 b={offset} c={c:#x}");
    for (lane, (src, valid)) in out.iter().enumerate() {
        let note = if *valid { "" } else { "  (out of range, keeps own value)" };
        println!("  lane {lane:>2} <- lane {src:>2}{note}");
    }
    Ok(())
}

fn info() -> Result<()> {
    use kernmem::tier::Tier;

    println!("kernmem");
    println!("Version: {}", kernmem::VERSION);
    println!();
    println!("Target tier: {}", TargetTier::TIER);
    let features = TargetTier::FEATURES;
    println!("  eviction hints:   {}", features.eviction_hints);
    println!("  non-coherent:     {}", features.non_coherent);
    println!("  max prefetch:     {}", features.max_prefetch);
    println!();
    // the crate needs std, so the nvptx64 line documents the modelled device side
    println!("Execution space:");
    #[cfg(target_arch = "nvptx64")]
    println!("  - device (host accessors unavailable)");
    #[cfg(not(target_arch = "nvptx64"))]
    println!("  - host (device accessors unavailable)");

    Ok(())
}
