use clap::{Parser, Subcommand};
use pressroom::{Manager, Stage, config, output, plugins};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "pressroom")]
#[command(about = "Plugin-driven static content builder")]
#[command(long_about = "\
Plugin-driven static content builder

Markdown files under the content directory become HTML pages. Every build
walks the same stages in order:

  configure → validate → glob → load → transform → render → collect → write → cleanup

Documents may start with TOML frontmatter fenced by +++ lines:

  +++
  title = \"Hello\"
  date = 2024-03-01
  tags = [\"rust\"]
  +++
  Body in markdown.

Unchanged documents are served from the build cache; the output is
byte-identical either way.

Run 'pressroom gen-config' to generate a documented pressroom.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file; relative directories in it resolve against its location
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Stop after this stage instead of running the whole pipeline
    #[arg(long)]
    to: Option<Stage>,

    /// Worker count for per-document work (default: one per core)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Ignore the build cache: rebuild every page
    #[arg(long)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline and write the site
    Build(BuildArgs),
    /// List documents matching a filter expression
    Query {
        /// e.g. "published == true and 'rust' in tags"
        expr: String,
        /// Treat unknown fields as an error instead of a non-match
        #[arg(long)]
        strict: bool,
    },
    /// Remove the output directory
    Clean,
    /// Show the stage order and the plugins hooked to each stage
    Stages,
    /// Print a stock pressroom.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => {
            let mut config = config::load_config(&cli.config)?;
            if args.no_cache {
                config.use_cache = false;
            }
            let manager = Manager::with_config(config);
            if let Some(n) = args.concurrency {
                manager.set_concurrency(n);
            }
            manager.register_plugins(plugins::defaults());

            let target = args.to.unwrap_or(Stage::last());
            println!("==> Building to {} with {} workers", target, manager.concurrency());
            let result = manager.run_to(target);
            output::print_build_output(
                &manager.documents(),
                &manager.feeds(),
                &manager.warnings(),
                manager.cache_stats(),
            );
            result?;
            println!("==> Build complete: {}", manager.config().output_dir.display());
        }
        Command::Query { expr, strict } => {
            let manager = Manager::with_config(config::load_config(&cli.config)?);
            manager.register_plugins(plugins::defaults());
            manager.run_to(Stage::Transform)?;
            let matches = if strict {
                manager.filter_strict(&expr)?
            } else {
                manager.filter(&expr)?
            };
            output::print_query_output(&matches);
        }
        Command::Clean => {
            let manager = Manager::with_config(config::load_config(&cli.config)?);
            manager.clean()?;
            println!("==> Removed {}", manager.config().output_dir.display());
        }
        Command::Stages => {
            let manager = Manager::new();
            manager.register_plugins(plugins::defaults());
            let order: Vec<(Stage, Vec<String>)> = Stage::ALL
                .into_iter()
                .map(|stage| (stage, manager.plugin_order(stage)))
                .collect();
            output::print_stages(&order);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
