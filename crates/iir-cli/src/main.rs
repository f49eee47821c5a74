use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use iir_core::{Agent, Environment, Mode, PlayStats, Query, RetrievalEngine};
use iir_store::{SimulationConfig, load_corpus, load_dataset, load_policy, save_policy};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Parser)]
#[command(name = "iir", about = "Interactive retrieval simulator")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Simulation config (TOML)
    #[arg(long)]
    config: PathBuf,

    /// Policy snapshot (JSON)
    #[arg(long)]
    model: PathBuf,

    /// Number of episodes; overrides `[run] episodes`
    #[arg(long)]
    episodes: Option<usize>,

    /// RNG seed; overrides `[run] seed`
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a policy against simulated users and save it
    Train {
        #[command(flatten)]
        run: RunArgs,

        /// Continue from the existing model instead of fresh weights
        #[arg(long)]
        resume: bool,
    },

    /// Evaluate a saved policy with exploration and updates turned off
    Test {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Rank documents for a query and print the top results
    Query {
        /// Simulation config (TOML)
        #[arg(long)]
        config: PathBuf,

        /// Number of results to print
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Query terms
        #[arg(required = true)]
        terms: Vec<String>,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Train { run, resume } => cmd_train(run, *resume),
        Commands::Test { run } => cmd_test(run),
        Commands::Query { config, top, terms } => cmd_query(config, *top, terms),
    }
}

fn load_config(path: &Path) -> Result<SimulationConfig> {
    SimulationConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Config, master RNG and a freshly built agent for a train or test run.
fn setup(run: &RunArgs) -> Result<(SimulationConfig, SmallRng, Agent)> {
    let config = load_config(&run.config)?;
    let mut rng = match run.seed.or(config.run.seed) {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };

    let corpus = load_corpus(&config.data).context("failed to load corpus tables")?;
    let dataset = load_dataset(&config.data).context("failed to load queries and answers")?;
    let env = Environment::new(
        Arc::new(corpus),
        dataset,
        config.retrieval.clone(),
        config.users.clone(),
        SmallRng::seed_from_u64(rng.random()),
    )
    .context("inconsistent dataset")?;
    let agent = Agent::new(env, config.agent.clone(), &mut rng);
    Ok((config, rng, agent))
}

fn load_model(agent: &mut Agent, path: &Path) -> Result<()> {
    let policy = load_policy(path).with_context(|| format!("failed to load {}", path.display()))?;
    let expected = agent.policy();
    if policy.num_actions() != expected.num_actions() || policy.state_dim() != expected.state_dim()
    {
        bail!(
            "{}: model has {} actions over {} features, expected {} over {}",
            path.display(),
            policy.num_actions(),
            policy.state_dim(),
            expected.num_actions(),
            expected.state_dim()
        );
    }
    agent.set_policy(policy);
    Ok(())
}

fn cmd_train(run: &RunArgs, resume: bool) -> Result<()> {
    let (config, mut rng, mut agent) = setup(run)?;
    if resume {
        load_model(&mut agent, &run.model)?;
    }
    let episodes = run.episodes.unwrap_or(config.run.episodes);

    let stats = agent.play(episodes, Mode::Train, &mut rng);
    save_policy(&run.model, agent.policy())
        .with_context(|| format!("failed to save {}", run.model.display()))?;

    print_stats(&stats);
    println!("model saved to {}", run.model.display());
    Ok(())
}

fn cmd_test(run: &RunArgs) -> Result<()> {
    let (config, mut rng, mut agent) = setup(run)?;
    load_model(&mut agent, &run.model)?;
    let episodes = run.episodes.unwrap_or(config.run.episodes);

    let stats = agent.play(episodes, Mode::Test, &mut rng);
    print_stats(&stats);
    Ok(())
}

fn cmd_query(config: &Path, top: usize, terms: &[String]) -> Result<()> {
    let config = load_config(config)?;
    let corpus = load_corpus(&config.data).context("failed to load corpus tables")?;
    let mut engine = RetrievalEngine::new(Arc::new(corpus), config.retrieval);

    let ranking = engine.query(&Query::new(terms.to_vec()));
    if ranking.is_empty() {
        println!("(no matching documents)");
    }
    for (rank, r) in ranking.iter().take(top).enumerate() {
        println!("{:>3}  {:<24} {:.6}", rank + 1, r.doc_id, r.score);
    }
    Ok(())
}

fn print_stats(stats: &PlayStats) {
    println!("Episodes:        {}", stats.episodes);
    println!("Avg. reward:     {:.4}", stats.avg_reward);
    println!("Avg. completed:  {:.4}", stats.avg_completed);
    println!("Avg. angry:      {:.4}", stats.avg_anger);
    println!(
        "Fully completed: {}/{} ({:.2}%)",
        stats.fully_completed,
        stats.episodes,
        100.0 * stats.fully_completed_ratio()
    );
    if stats.batch_updates > 0 {
        println!("Batch updates:   {}", stats.batch_updates);
    }
}
