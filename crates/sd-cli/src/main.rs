//! Store Doctor CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sd_core::{analysis, plans, PlanId};
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sd")]
#[command(about = "Store Doctor plan and analysis tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List subscription plans
    Plans,

    /// Show what a plan allows after a number of scans this month
    Quota {
        /// Plan identifier (free, pro, advanced)
        #[arg(short, long)]
        plan: String,

        /// Scans already used this period
        #[arg(short, long, default_value = "0")]
        used: u32,
    },

    /// Print the analysis prompt for a store
    Prompt {
        /// Store display name
        #[arg(short, long)]
        name: String,

        /// Store URL
        #[arg(short, long)]
        url: String,
    },

    /// Parse a raw analysis response into a scan payload
    Parse {
        /// Response file (reads stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let result = match cli.command {
        Commands::Plans => cmd_plans(),
        Commands::Quota { plan, used } => cmd_quota(&plan, used),
        Commands::Prompt { name, url } => cmd_prompt(&name, &url),
        Commands::Parse { file } => cmd_parse(file),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn cmd_plans() -> Result<()> {
    println!("\nSubscription Plans\n{}", "=".repeat(50));
    for plan in plans::all() {
        println!(
            "{:<10} ${:>3}.{:02}/mo  scans: {:>3}  stores: {:>3}",
            plan.name,
            plan.monthly_price_cents / 100,
            plan.monthly_price_cents % 100,
            plan.scan_quota_per_month,
            plan.store_quota,
        );
        let features: Vec<&str> = plan.features.iter().map(|f| f.as_str()).collect();
        println!("           features: {}", features.join(", "));
    }
    Ok(())
}

fn cmd_quota(plan: &str, used: u32) -> Result<()> {
    let plan_id: PlanId = plan.parse().map_err(anyhow::Error::msg)?;
    let definition = plans::definition(plan_id);
    let remaining = definition.remaining_scans(used);

    println!("\nQuota: {}\n{}", definition.name, "=".repeat(50));
    println!("Used:      {}", used);
    println!("Quota:     {}", definition.scan_quota_per_month);
    println!("Remaining: {}", remaining);
    println!("Can scan:  {}", if remaining > 0 { "yes" } else { "no" });
    Ok(())
}

fn cmd_prompt(name: &str, url: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("store name must not be empty");
    }
    println!("{}", analysis::build_prompt(name, url));
    Ok(())
}

fn cmd_parse(file: Option<PathBuf>) -> Result<()> {
    let raw = match file {
        Some(path) => {
            info!("Reading analysis response from {:?}", path);
            std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let draft = analysis::parse_response(&raw);
    draft.validate().context("parsed scan is not acceptable")?;
    debug!(issues = draft.issues.len(), overall = draft.overall_score, "response parsed");

    println!("{}", serde_json::to_string_pretty(&draft)?);
    Ok(())
}
