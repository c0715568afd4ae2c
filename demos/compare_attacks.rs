//! Compare every aggregation rule against its paired attack

use std::sync::Arc;

use siege_fl::aggregators::AggregationRule;
use siege_fl::attacks::{AttackStrategy, DeviationSearch, RankTransform};
use siege_fl::synthetic::QuadraticTask;
use siege_fl::{Orchestrator, ParameterSchema, RunConfig, SiegeError, Termination};
use tracing_subscriber::EnvFilter;

fn run(rule: AggregationRule, attack: AttackStrategy) -> Result<String, SiegeError> {
    let schema = Arc::new(
        ParameterSchema::builder()
            .weight("fc.weight", &[4, 4])
            .score("fc.scores", &[4, 4])
            .build()?,
    );
    let task = QuadraticTask::new(schema, 100, 0.2, 3).with_gradient_noise(0.05);
    let config = RunConfig {
        rounds: 30,
        aggregation: rule,
        attack,
        seed: 1,
        ..Default::default()
    };

    let mut orch = Orchestrator::new(config, task.clone(), task.clone(), task.initial_model())?;
    let summary = orch.run()?;
    Ok(match summary.termination {
        Termination::Completed => format!(
            "best acc {:.3}",
            summary.metrics.best_accuracy()
        ),
        Termination::Diverged { round, .. } => format!("DESTROYED in round {}", round),
    })
}

fn main() -> Result<(), SiegeError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    println!("Comparing rules against their paired attacks\n");
    println!("Scenario: 100 participants, 10 malicious, 10 per round, 30 rounds\n");

    let scale = AttackStrategy::Scale { factor: 100_000.0 };
    let deviation = AttackStrategy::DeviationSearch(DeviationSearch::default());
    let scenarios = vec![
        ("Mean / none", AggregationRule::Mean, AttackStrategy::None),
        ("Mean / scale", AggregationRule::Mean, scale.clone()),
        ("Trimmed Mean / scale", AggregationRule::TrimmedMean, scale),
        (
            "Trimmed Mean / deviation",
            AggregationRule::TrimmedMean,
            deviation.clone(),
        ),
        ("Multi-Krum / deviation", AggregationRule::MultiKrum, deviation),
        ("Rank Vote / none", AggregationRule::RankVote, AttackStrategy::None),
    ];

    for (name, rule, attack) in scenarios {
        println!("{:<28} {}", name, run(rule, attack)?);
    }
    for transform in RankTransform::ALL {
        let attack = AttackStrategy::RankPermutation { transform };
        let name = format!("Rank Vote / {}", transform.name());
        println!("{:<28} {}", name, run(AggregationRule::RankVote, attack)?);
    }
    Ok(())
}
