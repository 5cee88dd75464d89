mod output;
mod pipeline;
mod targets;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use nichefinder_core::{FilterCriteria, Profiles};

#[derive(Debug, Parser)]
#[command(name = "nichefinder")]
#[command(about = "Scrape storefront products and categories and rank niche opportunities")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape product detail pages into a product table.
    Products {
        #[command(flatten)]
        targets: TargetArgs,
        #[arg(long, default_value = "amazon_product_data.csv")]
        out: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Scrape a category directory page into a category table.
    Categories {
        #[command(flatten)]
        targets: TargetArgs,
        #[arg(long, default_value = "amazon_categories.csv")]
        out: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Harvest products from search pages, score them, and rank opportunities.
    Niche {
        #[command(flatten)]
        targets: TargetArgs,
        #[command(flatten)]
        criteria: CriteriaArgs,
        /// Cap on product pages visited across all search pages.
        #[arg(long)]
        max_products: Option<usize>,
        #[arg(long, default_value = "amazon_niche_analysis.csv")]
        out: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Args)]
struct TargetArgs {
    /// Target URL; repeat for several targets.
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,
    /// File with one URL per line; blank lines and `#` comments are skipped.
    #[arg(long, value_name = "PATH")]
    urls_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CriteriaArgs {
    #[arg(long)]
    min_price: Option<Decimal>,
    #[arg(long)]
    max_price: Option<Decimal>,
    /// Highest best-sellers rank that still qualifies.
    #[arg(long)]
    max_rank: Option<u64>,
    #[arg(long)]
    max_reviews: Option<u64>,
    /// Weight of each review in the opportunity score.
    #[arg(long)]
    review_weight: Option<f64>,
}

impl CriteriaArgs {
    /// Overrides the defaults with whatever flags were given.
    fn to_criteria(&self) -> anyhow::Result<FilterCriteria> {
        let defaults = FilterCriteria::default();
        let criteria = FilterCriteria {
            min_price: self.min_price.unwrap_or(defaults.min_price),
            max_price: self.max_price.unwrap_or(defaults.max_price),
            max_rank: self.max_rank.unwrap_or(defaults.max_rank),
            max_reviews: self.max_reviews.unwrap_or(defaults.max_reviews),
            review_weight: self.review_weight.unwrap_or(defaults.review_weight),
        };
        criteria.validate()?;
        Ok(criteria)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("nichefinder: choose a command (products, categories, niche); see --help");
        return Ok(());
    };

    // Loads `.env` before reading the environment.
    let config = nichefinder_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let profiles = match &config.profiles_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading page profiles");
            nichefinder_core::load_profiles(path)?
        }
        None => Profiles::default(),
    };
    let ctx = pipeline::Context { config, profiles };

    match command {
        Commands::Products {
            targets,
            out,
            dry_run,
        } => {
            let targets = targets::collect(&targets.urls, targets.urls_file.as_deref())?;
            if dry_run {
                targets::print_dry_run("products", &targets);
                return Ok(());
            }
            pipeline::run_products(&ctx, targets, &out).await?;
        }
        Commands::Categories {
            targets,
            out,
            dry_run,
        } => {
            let mut targets = targets::collect(&targets.urls, targets.urls_file.as_deref())?;
            if targets.is_empty() {
                targets.push(targets::DEFAULT_DIRECTORY_URL.to_owned());
            }
            if dry_run {
                targets::print_dry_run("categories", &targets);
                return Ok(());
            }
            pipeline::run_categories(&ctx, targets, &out).await?;
        }
        Commands::Niche {
            targets,
            criteria,
            max_products,
            out,
            dry_run,
        } => {
            let criteria = criteria.to_criteria()?;
            let targets = targets::collect(&targets.urls, targets.urls_file.as_deref())?;
            if dry_run {
                targets::print_dry_run("niche", &targets);
                println!("criteria: {criteria:?}");
                return Ok(());
            }
            pipeline::run_niche(&ctx, targets, &criteria, max_products, &out).await?;
        }
    }

    Ok(())
}
