//! # Recipe Validator
//!
//! Loads orchestrator settings and the recipe catalog exactly as the service
//! does at startup, validates them, and prints the resolved recipes. Use it
//! to check a catalog change before deploying it.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sbom_orchestrator::config::{ConfigManager, OrchestratorConfig, RecipeCatalog};
use sbom_orchestrator::models::Recipe;
use sbom_orchestrator::orchestration::RecipeResolver;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "recipe-validator")]
#[command(about = "Validate SBOM orchestrator recipe configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Settings file (default: $SBOM_ORCHESTRATOR_CONFIG or config/orchestrator.toml)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Recipe catalog to validate instead of the one named in the settings
    #[arg(short, long)]
    recipes: Option<PathBuf>,

    /// Target types the catalog must cover, overriding the settings
    #[arg(long, value_delimiter = ',')]
    require: Vec<String>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json, yaml)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate settings and catalog (default)
    Validate,

    /// List configured target types
    List,

    /// Show the recipe a target type resolves to
    Show {
        /// Target type, case-insensitive
        target_type: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = load(&cli).and_then(|manager| match &cli.command {
        Some(Commands::Validate) | None => validate(&cli, &manager),
        Some(Commands::List) => list(&manager),
        Some(Commands::Show { target_type }) => show(&cli, &manager, target_type),
    });

    if let Err(e) = result {
        error!("Recipe validation failed: {e:#}");
        eprintln!("❌ {e:#}");
        process::exit(1);
    }
}

fn load(cli: &Cli) -> anyhow::Result<Arc<ConfigManager>> {
    if cli.recipes.is_none() && cli.require.is_empty() {
        let manager = match &cli.settings {
            Some(path) => ConfigManager::load_from_file(Some(path.as_path())),
            None => ConfigManager::load(),
        };
        return manager.context("loading orchestrator configuration");
    }

    let mut config: OrchestratorConfig = ConfigManager::load_settings(cli.settings.as_deref())
        .context("loading orchestrator settings")?;
    if let Some(path) = &cli.recipes {
        config.recipes.path = path.clone();
    }
    if !cli.require.is_empty() {
        config.recipes.required_target_types = cli.require.clone();
    }

    let catalog = RecipeCatalog::load_from_path(&config.recipes.path)
        .with_context(|| format!("reading {}", config.recipes.path.display()))?;
    let manager = ConfigManager::from_parts(config, catalog).context("validating recipe catalog")?;
    Ok(Arc::new(manager))
}

fn validate(cli: &Cli, manager: &ConfigManager) -> anyhow::Result<()> {
    let resolver = RecipeResolver::from_catalog(manager.recipes())?;
    let config = manager.config();

    println!("🔧 Validating recipe configuration");
    println!("Environment: {}", config.environment);
    println!("Catalog: {}", config.recipes.path.display());
    println!("API version: {}", manager.recipes().api_version);
    println!(
        "Required target types: {}",
        config.recipes.required_target_types.join(", ")
    );
    println!();

    for target_type in resolver.target_types() {
        let recipe = resolver.resolve(&target_type)?;
        print_recipe(cli, &target_type, &recipe)?;
    }

    info!(recipes = resolver.target_types().len(), "Recipe catalog valid");
    println!("\n✅ Recipe configuration is valid");
    Ok(())
}

fn list(manager: &ConfigManager) -> anyhow::Result<()> {
    let resolver = RecipeResolver::from_catalog(manager.recipes())?;
    for target_type in resolver.target_types() {
        println!("{target_type}");
    }
    Ok(())
}

fn show(cli: &Cli, manager: &ConfigManager, target_type: &str) -> anyhow::Result<()> {
    let resolver = RecipeResolver::from_catalog(manager.recipes())?;
    if !resolver.supports(target_type) {
        bail!(
            "no recipe for '{target_type}'; configured: {}",
            resolver.target_types().join(", ")
        );
    }
    let recipe = resolver.resolve(target_type)?;
    print_recipe(cli, target_type, &recipe)
}

fn print_recipe(cli: &Cli, target_type: &str, recipe: &Recipe) -> anyhow::Result<()> {
    match cli.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(recipe)?),
        "yaml" => print!("{}", serde_yaml::to_string(recipe)?),
        "table" => {
            println!("📦 {target_type}");
            println!(
                "   generator  {} {}",
                recipe.generator.name, recipe.generator.version
            );
            for (key, value) in &recipe.generator.options {
                println!("              {key} = {value}");
            }
            for (index, enhancer) in recipe.enhancers.iter().enumerate() {
                println!("   enhancer[{index}] {} {}", enhancer.name, enhancer.version);
                for (key, value) in &enhancer.options {
                    println!("              {key} = {value}");
                }
            }
        }
        other => bail!("unknown output format: {other}"),
    }
    Ok(())
}
