use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use glam::DVec3;
use gridspace_common::{BoundingBox, Spatial};
use gridspace_kernel::World;
use gridspace_partition::GridConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridspace-cli", about = "CLI tool for gridspace spatial grid operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Scatter moving boxes, step the world, and report broad-phase results
    Simulate {
        #[command(flatten)]
        scene: SceneArgs,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "60")]
        ticks: u64,
        /// Seconds per tick
        #[arg(long, default_value = "0.016")]
        dt: f64,
    },
    /// Scatter boxes and list the entities a query box touches
    Query {
        #[command(flatten)]
        scene: SceneArgs,
        /// Query box minimum corner
        #[arg(long, required = true, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
        min: Vec<f64>,
        /// Query box maximum corner
        #[arg(long, required = true, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
        max: Vec<f64>,
    },
}

#[derive(Args)]
struct SceneArgs {
    /// Number of bodies to scatter
    #[arg(short, long, default_value = "500")]
    entities: usize,
    /// RNG seed for deterministic placement
    #[arg(short, long, default_value = "42")]
    seed: u64,
    /// JSON grid config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the partition side length
    #[arg(long)]
    dimension: Option<u32>,
    /// Override the partitions per axis
    #[arg(long)]
    count: Option<u32>,
    /// Half extent of every body
    #[arg(long, default_value = "1.0")]
    half_extent: f64,
    /// Maximum speed per axis
    #[arg(long, default_value = "8.0")]
    max_speed: f64,
}

impl SceneArgs {
    fn grid_config(&self) -> anyhow::Result<GridConfig> {
        let mut config = match &self.config {
            Some(path) => GridConfig::load(path)
                .with_context(|| format!("loading grid config {}", path.display()))?,
            None => GridConfig::default(),
        };
        if let Some(dimension) = self.dimension {
            config.partition_dimension = dimension;
        }
        if let Some(count) = self.count {
            config.partition_count = count;
        }
        config.validate()?;
        Ok(config)
    }

    fn build_world(&self) -> anyhow::Result<World> {
        let config = self.grid_config()?;
        let mut world = World::with_seed(&config, self.seed)?;
        world.scatter(
            self.entities,
            DVec3::splat(self.half_extent),
            self.max_speed,
        );
        tracing::info!(
            entities = self.entities,
            seed = self.seed,
            partition_dimension = config.partition_dimension,
            partition_count = config.partition_count,
            "world populated"
        );
        Ok(world)
    }
}

fn corner(values: &[f64]) -> anyhow::Result<DVec3> {
    match values {
        [x, y, z] => Ok(DVec3::new(*x, *y, *z)),
        _ => anyhow::bail!("expected 3 coordinates, got {}", values.len()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("gridspace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", gridspace_common::crate_info());
            println!("partition: {}", gridspace_partition::crate_info());
            println!("kernel: {}", gridspace_kernel::crate_info());
            let config = GridConfig::default();
            println!(
                "default grid: dimension={} count={} extent={}",
                config.partition_dimension,
                config.partition_count,
                config.world_extent()
            );
        }
        Commands::Simulate { scene, ticks, dt } => {
            let mut world = scene.build_world()?;
            println!("Initial: {}", world.grid().stats());
            println!("Initial pairs: {}", world.candidate_pairs().len());

            let mut reindexed = 0usize;
            for _ in 0..ticks {
                reindexed += world.step(dt).len();
            }

            println!(
                "After {} ticks: tick={}, entities={}, re-indexed={}",
                ticks,
                world.tick(),
                world.entity_count(),
                reindexed
            );
            println!("Final: {}", world.grid().stats());
            println!("Final pairs: {}", world.candidate_pairs().len());
        }
        Commands::Query { scene, min, max } => {
            let world = scene.build_world()?;
            let query = BoundingBox::new(corner(&min)?, corner(&max)?);
            let mut found = world.query(&query);
            found.sort();

            let touching = found
                .iter()
                .filter_map(|id| world.get(*id))
                .filter(|body| body.bounding_box().intersects(&query))
                .count();

            println!(
                "Query {:?}..{:?}: {} candidates, {} overlapping",
                query.min,
                query.max,
                found.len(),
                touching
            );
            for id in found {
                println!("  {id}");
            }
        }
    }

    Ok(())
}
