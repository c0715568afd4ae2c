//! Quickstart: Trimmed-Mean under a deviation-search attack

use std::sync::Arc;

use siege_fl::synthetic::QuadraticTask;
use siege_fl::{Orchestrator, ParameterSchema, RunConfig, Termination};
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"
population = 100
round_size = 10
corruption_fraction = 0.1
rounds = 25
seed = 42

[aggregation]
rule = "trimmed_mean"

[attack]
kind = "deviation_search"
deviation = "std"
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = RunConfig::from_toml_str(CONFIG)?;
    let schema = Arc::new(
        ParameterSchema::builder()
            .weight("fc1.weight", &[8, 4])
            .weight("fc1.bias", &[8])
            .build()?,
    );
    let task = QuadraticTask::new(schema, config.population, 0.2, 7).with_gradient_noise(0.05);

    let mut orch = Orchestrator::new(config, task.clone(), task.clone(), task.initial_model())?;
    let summary = orch.run()?;

    match summary.termination {
        Termination::Completed => println!("\nRun completed after {} rounds", summary.rounds_run),
        Termination::Diverged { round, loss } => {
            println!("\nGlobal model destroyed in round {} (loss {})", round, loss)
        }
    }
    if let Some(last) = summary.metrics.last() {
        println!(
            "   Final loss {:.4}, accuracy {:.3}, best {:.3}",
            last.test_loss, last.test_accuracy, last.best_accuracy
        );
    }
    Ok(())
}
