use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use platarium_slashing::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Seconds between simulated blocks.
const BLOCK_TIME_SECS: u64 = 5;

/// Evidence max age used by the simulator's staking (21 days).
const SIM_MAX_EVIDENCE_AGE: Duration = Duration::from_secs(21 * 24 * 3600);

/// Self bond of every simulated validator.
const SIM_SELF_BOND: u128 = 1_000_000;

#[derive(Parser)]
#[command(name = "platarium-slashing-cli")]
#[command(about = "Platarium slashing CLI - genesis tooling and liveness simulation")]
#[command(version = "1.0.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default slashing genesis as JSON
    DefaultGenesis,

    /// Parse and validate a slashing genesis file
    ValidateGenesis {
        /// Path to the genesis JSON
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run a seeded liveness simulation over in-memory state
    Simulate {
        /// Number of validators
        #[arg(long, default_value = "10")]
        validators: u32,

        /// Number of blocks
        #[arg(long, default_value = "500")]
        blocks: u32,

        /// Chance in percent that a validator misses a given block
        #[arg(long, default_value = "10", value_parser = clap::value_parser!(u8).range(0..=100))]
        miss_pct: u8,

        /// RNG seed; the same seed reproduces the same run
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Keeper config JSON (validator_update_delay)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Genesis JSON providing params and signing infos
        #[arg(long)]
        genesis: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::DefaultGenesis => handle_default_genesis(),
        Commands::ValidateGenesis { file } => handle_validate_genesis(file),
        Commands::Simulate {
            validators,
            blocks,
            miss_pct,
            seed,
            config,
            genesis,
        } => handle_simulate(validators, blocks, miss_pct, seed, config, genesis),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn read_genesis(path: &PathBuf) -> anyhow::Result<GenesisState> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let genesis = GenesisState::from_json(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(genesis)
}

fn handle_default_genesis() -> anyhow::Result<()> {
    println!("{}", GenesisState::default().to_json_pretty()?);
    Ok(())
}

fn handle_validate_genesis(file: PathBuf) -> anyhow::Result<()> {
    let genesis = read_genesis(&file)?;
    genesis.validate()?;
    println!(
        "Genesis valid: {} signing infos, window {}",
        genesis.signing_infos.len(),
        genesis.params.signed_blocks_window
    );
    Ok(())
}

fn handle_simulate(
    validators: u32,
    blocks: u32,
    miss_pct: u8,
    seed: u64,
    config: Option<PathBuf>,
    genesis: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => {
            let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            KeeperConfig::from_json(&raw)?
        }
        None => KeeperConfig::default(),
    };
    let genesis = match genesis {
        Some(path) => read_genesis(&path)?,
        None => GenesisState::default(),
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut staking = InMemoryStaking::new(SIM_MAX_EVIDENCE_AGE);
    let mut operators = Vec::with_capacity(validators as usize);
    for _ in 0..validators {
        let operator = ValAddress::from(rng.gen::<[u8; 20]>());
        let pubkey = ConsPubKey::new(rng.gen::<[u8; 32]>().to_vec());
        staking.add_validator(operator.clone(), pubkey.clone(), SIM_SELF_BOND, 1)?;
        operators.push((operator, pubkey.address()));
    }

    let mut keeper = Keeper::new(MemStore::new(), staking, config);
    let genesis_header = BlockHeader::new(0, Timestamp::EPOCH);
    keeper.init_genesis(genesis_header, &genesis)?;

    let start = BlockHeader::new(1, Timestamp::EPOCH.saturating_add(Duration::from_secs(BLOCK_TIME_SECS)));
    for (operator, cons) in &operators {
        keeper.after_validator_created(start, operator)?;
        keeper.after_validator_bonded(start, cons, operator)?;
    }

    let power = (SIM_SELF_BOND / 1_000_000) as i64;
    let mut unjails = 0u64;
    for height in 1..=i64::from(blocks) {
        let time = Timestamp::EPOCH.saturating_add(Duration::from_secs(BLOCK_TIME_SECS * height as u64));
        let header = BlockHeader::new(height, time);

        let votes: Vec<VoteInfo> = operators
            .iter()
            .map(|(_, cons)| {
                if rng.gen_range(0..100u8) < miss_pct {
                    VoteInfo::absent(cons.clone(), power)
                } else {
                    VoteInfo::signed(cons.clone(), power)
                }
            })
            .collect();
        keeper
            .begin_block(header, &votes, &[])
            .with_context(|| format!("begin block at height {}", height))?;

        for event in keeper.take_events() {
            if event.kind == EVENT_TYPE_SLASH {
                println!(
                    "height {:>6}: slashed {} ({}), burned {}",
                    height,
                    event.attribute("address").unwrap_or("?"),
                    event.attribute("reason").unwrap_or("?"),
                    event.attribute("burned_coins").unwrap_or("0"),
                );
            }
        }

        for (operator, cons) in &operators {
            let info = keeper.query_signing_info(cons)?;
            let recomputed = keeper.missed_block_count(cons)?;
            if info.missed_blocks_counter != recomputed {
                bail!(
                    "counter drift for {} at height {}: cached {}, bitmap {}",
                    cons,
                    height,
                    info.missed_blocks_counter,
                    recomputed
                );
            }
            if keeper.staking().is_jailed(cons) && !info.tombstoned && header.time >= info.jailed_until {
                keeper.unjail(header, operator)?;
                keeper.after_validator_bonded(header, cons, operator)?;
                unjails += 1;
                debug!(validator = %cons, height, "simulated operator unjailed");
            }
        }
    }

    let slashes = keeper.staking().slashes().len();
    let jails = keeper.staking().jail_count();
    info!(blocks, validators, slashes, jails, unjails, "simulation finished");
    println!(
        "Simulated {} blocks with {} validators: {} slashes, {} jails, {} unjails, counters consistent",
        blocks, validators, slashes, jails, unjails
    );
    Ok(())
}
