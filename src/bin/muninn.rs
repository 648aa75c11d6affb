//! muninn: command-line front end
//!
//! Score queries, route them through the configured engines and check
//! configuration files.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use muninn::{ComplexityAnalyzer, Config, EngineMode, EngineResponse, Muninn, Query};

/// Muninn CLI
#[derive(Parser)]
#[command(name = "muninn")]
#[command(version)]
#[command(about = "Complexity-aware query router")]
struct Args {
    /// Config file (default: ~/.muninn/config.toml, then /etc/muninn/config.toml)
    #[arg(short, long, env = "MUNINN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score a query without contacting any engine (prints JSON)
    Analyze {
        /// Query text (or omit to read from stdin)
        text: Option<String>,
        /// Print a short human-readable summary instead
        #[arg(long)]
        summary: bool,
    },

    /// Route a query through the configured engines
    Route {
        /// Query text (or omit to read from stdin)
        text: Option<String>,
        /// Restrict routing to one engine family
        #[arg(short, long)]
        mode: Option<ModeArg>,
        /// Send the query to this engine only
        #[arg(short, long)]
        engine: Option<String>,
        /// Overall deadline in seconds
        #[arg(short, long)]
        deadline: Option<f64>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe every configured engine
    Health,

    /// Validate a config file and summarise it
    CheckConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Local,
    Cloud,
    Hybrid,
}

impl From<ModeArg> for EngineMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Local => EngineMode::Local,
            ModeArg::Cloud => EngineMode::Cloud,
            ModeArg::Hybrid => EngineMode::Hybrid,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Analyze { text, summary } => {
            let config = Config::load_or_default(args.config.as_deref())?;
            let analyzer = ComplexityAnalyzer::new(config.analyzer)?;
            let text = resolve_text(text, "analyze")?;
            let score = analyzer.analyze(&text, None);
            if !summary {
                println!("{}", serde_json::to_string_pretty(&score)?);
            } else {
                let f = score.factors;
                println!("score:          {}", score.score);
                println!("recommendation: {}", score.recommendation);
                println!("confidence:     {:.2}", score.confidence);
                println!(
                    "factors:        length={} keyword={} pattern={} context={} language={}",
                    f.length, f.keyword, f.pattern, f.context, f.language
                );
            }
        }

        Command::Route {
            text,
            mode,
            engine,
            deadline,
            json,
        } => {
            let config = Config::load_or_default(args.config.as_deref())?;
            let router = Muninn::builder().config(config).build()?;

            let mut query = Query::new(resolve_text(text, "route")?)?;
            if let Some(mode) = mode {
                query = query.mode(mode.into());
            }
            if let Some(engine) = engine {
                query = query.force_engine(engine);
            }
            if let Some(secs) = deadline {
                query = query.deadline(Duration::try_from_secs_f64(secs)?);
            }

            let response = router.route(&query).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
        }

        Command::Health => {
            let config = Config::load(args.config.as_deref())?;
            let router = Muninn::builder().config(config).build()?;
            for health in router.registry().health_check_all().await {
                let status = match (health.enabled, health.healthy) {
                    (false, _) => "disabled",
                    (true, true) => "healthy",
                    (true, false) => "unhealthy",
                };
                println!("{}: {status}", health.id);
            }
        }

        Command::CheckConfig => {
            let config = Config::load(args.config.as_deref())?;
            config.validate()?;
            println!("config ok");
            println!(
                "cache:   max_size={} default_ttl={:?}",
                config.cache.max_size, config.cache.default_ttl
            );
            println!(
                "retry:   max_attempts={} initial_delay={:?}",
                config.retry.max_attempts, config.retry.initial_delay
            );
            if config.engines.is_empty() {
                println!("engines: none (every query will be answered by the fallback handler)");
            }
            for engine in &config.engines {
                println!(
                    "engine:  {} priority={} enabled={} capabilities={:?} url={}",
                    engine.id,
                    engine.settings.priority,
                    engine.settings.enabled,
                    engine.capabilities,
                    engine.url
                );
            }
        }
    }

    Ok(())
}

fn print_response(response: &EngineResponse) {
    println!("{}", response.content);
    println!();
    println!(
        "engine={} confidence={:.2} time={}ms cache_hit={} fallbacks={}",
        response.engine_id,
        response.confidence,
        response.processing_time_ms,
        response.metadata.cache_hit,
        response.metadata.fallbacks_used
    );
    if let Some(score) = &response.metadata.complexity {
        println!(
            "complexity={} recommendation={}",
            score.score, score.recommendation
        );
    }
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// Combination rules:
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
