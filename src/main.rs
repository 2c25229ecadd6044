use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dra_select::expr::{CancelToken, EnvType};
use dra_select::selector::{
    CompilationResult, Compiler, Device, DeviceLoader, Match, MatchError, SelectorConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile an expression and report its type and worst-case cost
    Compile {
        /// The selector expression
        expression: String,

        /// Environment: "stored", "new" or a version such as "1.31"
        #[arg(short, long)]
        env: Option<EnvType>,

        /// Runtime cost limit
        #[arg(long)]
        cost_limit: Option<u64>,
    },
    /// Evaluate an expression against devices from YAML or JSON files
    Match {
        /// The selector expression
        expression: String,

        /// Device file; may be given more than once
        #[arg(short, long = "device", required = true)]
        devices: Vec<PathBuf>,

        /// Environment: "stored", "new" or a version such as "1.31"
        #[arg(short, long)]
        env: Option<EnvType>,

        /// Runtime cost limit
        #[arg(long)]
        cost_limit: Option<u64>,

        /// Give up on devices still being evaluated after this long
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print the JSON Schema of a device
    Schema,
}

/// Command-line flags take precedence over the environment
fn apply_overrides(
    config: &mut SelectorConfig,
    env: Option<EnvType>,
    cost_limit: Option<u64>,
    timeout_ms: Option<u64>,
) {
    config.env_type = env.unwrap_or(config.env_type);
    config.cost_limit = cost_limit.unwrap_or(config.cost_limit);
    if let Some(millis) = timeout_ms {
        config.timeout = (millis > 0).then(|| Duration::from_millis(millis));
    }
}

fn compile(
    compiler: &Compiler,
    expression: &str,
    config: &SelectorConfig,
) -> anyhow::Result<CompilationResult> {
    let result = compiler.compile(expression, &config.options());
    if let Some(err) = result.error() {
        bail!("{}: {}", err.kind, err);
    }
    Ok(result)
}

/// Evaluate `result` against every device on blocking tasks
///
/// When the configured timeout passes, evaluations still running are
/// cancelled and come back as interrupted.
async fn evaluate_all(
    result: Arc<CompilationResult>,
    devices: Vec<Device>,
    config: &SelectorConfig,
) -> anyhow::Result<Vec<(Device, Result<Match, MatchError>)>> {
    let cancel = CancelToken::new();
    let ctx = config.eval_context().with_cancel(cancel.clone());
    let tasks = devices.into_iter().map(|device| {
        let result = Arc::clone(&result);
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = result.device_matches(&ctx, &device);
            (device, outcome)
        })
    });
    let mut all = Box::pin(join_all(tasks));

    let joined = match config.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, &mut all).await {
            Ok(joined) => joined,
            Err(_) => {
                log::warn!("Timed out after {:?}, cancelling remaining evaluations", timeout);
                cancel.cancel();
                all.await
            }
        },
        None => all.await,
    };

    joined
        .into_iter()
        .map(|task| task.context("Evaluation task failed"))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = SelectorConfig::from_env()?;
    let compiler = Compiler::new();

    match args.command {
        Commands::Compile {
            expression,
            env,
            cost_limit,
        } => {
            apply_overrides(&mut config, env, cost_limit, None);

            let result = compile(&compiler, &expression, &config)?;
            if let Some(output_type) = &result.output_type {
                println!("Output type: {}", output_type);
            }
            println!("Max cost: {}", result.max_cost);
            println!("Cost limit: {}", config.cost_limit);
        }
        Commands::Match {
            expression,
            devices: paths,
            env,
            cost_limit,
            timeout_ms,
        } => {
            apply_overrides(&mut config, env, cost_limit, timeout_ms);

            let result = Arc::new(compile(&compiler, &expression, &config)?);

            let loader = DeviceLoader::new();
            let mut devices = Vec::new();
            for path in &paths {
                let loaded = loader
                    .load_devices(path)
                    .with_context(|| format!("Failed to load {}", path.display()))?;
                devices.extend(loaded);
            }
            let total = devices.len();
            log::info!("Matching {} device(s) against {:?}", total, expression);

            let joined = evaluate_all(result, devices, &config).await?;

            let mut matched = 0;
            for (device, outcome) in joined {
                match outcome {
                    Ok(m) => {
                        if m.matched {
                            matched += 1;
                        }
                        println!(
                            "{}: {} (cost {})",
                            device.display_name(),
                            if m.matched { "match" } else { "no match" },
                            m.details.actual_cost
                        );
                    }
                    Err(err) => {
                        log::warn!("Device {}: {}", device.display_name(), err);
                        println!("{}: error: {}", device.display_name(), err);
                    }
                }
            }
            println!("{} of {} device(s) matched", matched, total);
        }
        Commands::Schema => {
            let schema = DeviceLoader::device_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}
