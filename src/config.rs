//! Run configuration.
//!
//! A [`RunConfig`] is loaded once (usually from TOML), validated, and then
//! owned by the orchestrator for the whole run. Every field has a default,
//! so a config file only needs to name what it changes:
//!
//! ```toml
//! rounds = 50
//! seed = 7
//!
//! [aggregation]
//! rule = "trimmed_mean"
//!
//! [attack]
//! kind = "deviation_search"
//! deviation = "std"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregators::AggregationRule;
use crate::attacks::{Acceptance, AttackStrategy};
use crate::error::SiegeError;
use crate::verification::honest_majority_possible;

fn default_population() -> usize {
    100
}
fn default_round_size() -> usize {
    10
}
fn default_corruption_fraction() -> f64 {
    0.1
}
fn default_rounds() -> usize {
    100
}
fn default_local_steps() -> usize {
    2
}
fn default_learning_rate() -> f32 {
    0.1
}
fn default_lr_decay() -> f32 {
    1.0
}
fn default_momentum() -> f32 {
    0.9
}
fn default_weight_decay() -> f32 {
    1e-4
}
fn default_crafting_participants() -> usize {
    5
}
fn default_divergence_ceiling() -> f32 {
    10_000.0
}
fn default_max_resample_attempts() -> usize {
    10_000
}
fn default_eval_every() -> usize {
    1
}

/// Immutable parameters of one simulated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Total participants N
    #[serde(default = "default_population")]
    pub population: usize,
    /// Participants drawn per round R
    #[serde(default = "default_round_size")]
    pub round_size: usize,
    /// Fraction of the population that is malicious, in `[0, 1)`
    #[serde(default = "default_corruption_fraction")]
    pub corruption_fraction: f64,
    /// Rounds to run
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    /// Local optimizer steps per participant
    #[serde(default = "default_local_steps")]
    pub local_steps: usize,
    /// Base learning rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    /// Per-round multiplicative learning-rate decay
    #[serde(default = "default_lr_decay")]
    pub lr_decay: f32,
    /// SGD momentum
    #[serde(default = "default_momentum")]
    pub momentum: f32,
    /// L2 weight decay
    #[serde(default = "default_weight_decay")]
    pub weight_decay: f32,
    /// Aggregation rule
    #[serde(default)]
    pub aggregation: AggregationRule,
    /// Attack run by malicious participants
    #[serde(default)]
    pub attack: AttackStrategy,
    /// Malicious participants that train honestly to build the attack reference
    #[serde(default = "default_crafting_participants")]
    pub crafting_participants: usize,
    /// Corruption bound given to the rule; the round's malicious count if unset
    #[serde(default)]
    pub assumed_corrupted: Option<usize>,
    /// Seed for participant sampling and training seeds
    #[serde(default)]
    pub seed: u64,
    /// Worker threads for local training; available parallelism if unset
    #[serde(default)]
    pub workers: Option<usize>,
    /// Loss above which the model counts as destroyed
    #[serde(default = "default_divergence_ceiling")]
    pub divergence_ceiling: f32,
    /// Draws attempted per round before giving up on an honest majority
    #[serde(default = "default_max_resample_attempts")]
    pub max_resample_attempts: usize,
    /// Evaluate every this many rounds (the last round is always evaluated)
    #[serde(default = "default_eval_every")]
    pub eval_every: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            population: default_population(),
            round_size: default_round_size(),
            corruption_fraction: default_corruption_fraction(),
            rounds: default_rounds(),
            local_steps: default_local_steps(),
            learning_rate: default_learning_rate(),
            lr_decay: default_lr_decay(),
            momentum: default_momentum(),
            weight_decay: default_weight_decay(),
            aggregation: AggregationRule::default(),
            attack: AttackStrategy::default(),
            crafting_participants: default_crafting_participants(),
            assumed_corrupted: None,
            seed: 0,
            workers: None,
            divergence_ceiling: default_divergence_ceiling(),
            max_resample_attempts: default_max_resample_attempts(),
            eval_every: default_eval_every(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> SiegeError {
    SiegeError::InvalidConfig(msg.into())
}

impl RunConfig {
    /// Parse a config from TOML text. The result is not yet validated.
    pub fn from_toml_str(text: &str) -> Result<Self, SiegeError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML config file, then validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SiegeError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Malicious pool size `M = floor(N × corruption_fraction)`.
    pub fn malicious_count(&self) -> usize {
        (self.population as f64 * self.corruption_fraction).floor() as usize
    }

    /// Learning rate for round `round`: `learning_rate × lr_decay^round`.
    pub fn learning_rate_at(&self, round: usize) -> f32 {
        let exp = i32::try_from(round).unwrap_or(i32::MAX);
        self.learning_rate * self.lr_decay.powi(exp)
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<(), SiegeError> {
        if self.population == 0 {
            return Err(invalid("population must be at least 1"));
        }
        if self.round_size == 0 || self.round_size > self.population {
            return Err(invalid(format!(
                "round_size must be in 1..={}, got {}",
                self.population, self.round_size
            )));
        }
        if !(0.0..1.0).contains(&self.corruption_fraction) {
            return Err(invalid(format!(
                "corruption_fraction must be in [0, 1), got {}",
                self.corruption_fraction
            )));
        }
        if self.rounds == 0 {
            return Err(invalid("rounds must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate must be positive"));
        }
        if !(self.lr_decay.is_finite() && self.lr_decay > 0.0) {
            return Err(invalid("lr_decay must be positive"));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(invalid("momentum must be in [0, 1)"));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(invalid("weight_decay must be non-negative"));
        }
        if self.divergence_ceiling.is_nan() || self.divergence_ceiling <= 0.0 {
            return Err(invalid("divergence_ceiling must be positive"));
        }
        if self.max_resample_attempts == 0 {
            return Err(invalid("max_resample_attempts must be at least 1"));
        }
        if self.eval_every == 0 {
            return Err(invalid("eval_every must be at least 1"));
        }
        if self.workers == Some(0) {
            return Err(invalid("workers must be at least 1"));
        }
        if let Some(k) = self.assumed_corrupted {
            if self.round_size < k {
                return Err(invalid(format!(
                    "round_size {} is smaller than assumed_corrupted {}",
                    self.round_size, k
                )));
            }
        }

        let malicious = self.malicious_count();
        if !honest_majority_possible(self.population, malicious, self.round_size) {
            return Err(invalid(format!(
                "no draw of {} from {} participants ({} malicious) has an honest majority",
                self.round_size, self.population, malicious
            )));
        }

        if let Some(form) = self.attack.form() {
            if form != self.aggregation.form() {
                return Err(SiegeError::FormMismatch {
                    rule: self.aggregation.name(),
                    attack: self.attack.name(),
                });
            }
        }
        if self.attack.needs_reference() && malicious > 0 && self.crafting_participants == 0 {
            return Err(invalid(format!(
                "attack '{}' needs at least one crafting participant",
                self.attack.name()
            )));
        }
        self.validate_attack()
    }

    fn validate_attack(&self) -> Result<(), SiegeError> {
        match &self.attack {
            AttackStrategy::Scale { factor } if !factor.is_finite() => {
                Err(invalid("scale factor must be finite"))
            }
            AttackStrategy::DeviationSearch(search) => {
                if !(search.threshold.is_finite() && search.threshold > 0.0) {
                    return Err(invalid("deviation threshold must be positive"));
                }
                if !(search.tolerance.is_finite() && search.tolerance >= 0.0) {
                    return Err(invalid("deviation tolerance must be non-negative"));
                }
                if search.max_iterations == 0 {
                    return Err(invalid("deviation max_iterations must be at least 1"));
                }
                match search.acceptance {
                    Some(Acceptance::WithinSpread { bound }) if bound.is_nan() || bound < 0.0 => {
                        Err(invalid("within_spread bound must be non-negative"))
                    }
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attacks::{DeviationSearch, RankTransform};

    #[test]
    fn test_defaults_are_valid() {
        let config = RunConfig::default();
        config.validate().unwrap();
        assert_eq!(config.malicious_count(), 10);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = RunConfig::from_toml_str(
            r#"
            population = 50
            corruption_fraction = 0.2
            seed = 3

            [aggregation]
            rule = "multi_krum"

            [attack]
            kind = "deviation_search"
            acceptance = { test = "all_selected" }
            "#,
        )
        .unwrap();
        assert_eq!(config.population, 50);
        assert_eq!(config.round_size, 10);
        assert_eq!(config.malicious_count(), 10);
        assert_eq!(config.aggregation, AggregationRule::MultiKrum);
        match &config.attack {
            AttackStrategy::DeviationSearch(search) => {
                assert_eq!(search.acceptance, Some(Acceptance::AllSelected));
            }
            other => panic!("unexpected attack {other:?}"),
        }
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_rule_is_a_parse_error() {
        let err = RunConfig::from_toml_str("[aggregation]\nrule = \"geometric_median\"\n");
        assert!(matches!(err, Err(SiegeError::ConfigParse(_))));

        let err = RunConfig::from_toml_str("[attack]\nkind = \"label_flip\"\n");
        assert!(matches!(err, Err(SiegeError::ConfigParse(_))));
    }

    #[test]
    fn test_unknown_field_is_a_parse_error() {
        assert!(RunConfig::from_toml_str("populaton = 3\n").is_err());
    }

    #[test]
    fn test_form_mismatch() {
        let config = RunConfig {
            aggregation: AggregationRule::RankVote,
            attack: AttackStrategy::Scale { factor: 10.0 },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SiegeError::FormMismatch {
                rule: "rank_vote",
                attack: "scale"
            })
        ));

        let config = RunConfig {
            aggregation: AggregationRule::TrimmedMean,
            attack: AttackStrategy::RankPermutation {
                transform: RankTransform::Reverse,
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SiegeError::FormMismatch { .. })
        ));
    }

    #[test]
    fn test_benign_attack_fits_every_rule() {
        for rule in [
            AggregationRule::Mean,
            AggregationRule::TrimmedMean,
            AggregationRule::MultiKrum,
            AggregationRule::RankVote,
        ] {
            let config = RunConfig {
                aggregation: rule,
                ..Default::default()
            };
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_corruption_fraction_bounds() {
        for fraction in [1.0, 1.5, -0.1, f64::NAN] {
            let config = RunConfig {
                corruption_fraction: fraction,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "fraction {fraction} accepted");
        }
    }

    #[test]
    fn test_round_smaller_than_assumed_corrupted() {
        let config = RunConfig {
            assumed_corrupted: Some(11),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SiegeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_impossible_honest_majority() {
        // 95 malicious of 100: every draw of 10 has at least 5 malicious
        let config = RunConfig {
            corruption_fraction: 0.95,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reference_attack_needs_crafters() {
        let config = RunConfig {
            aggregation: AggregationRule::TrimmedMean,
            attack: AttackStrategy::DeviationSearch(DeviationSearch::default()),
            crafting_participants: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RunConfig {
            corruption_fraction: 0.0,
            ..config
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_learning_rate_decay() {
        let config = RunConfig {
            learning_rate: 0.1,
            lr_decay: 0.5,
            ..Default::default()
        };
        assert!((config.learning_rate_at(0) - 0.1).abs() < 1e-7);
        assert!((config.learning_rate_at(2) - 0.025).abs() < 1e-7);
    }

    #[test]
    fn test_load_from_file() {
        let path =
            std::env::temp_dir().join(format!("siege-fl-config-{}.toml", std::process::id()));
        std::fs::write(&path, "rounds = 3\n[aggregation]\nrule = \"mean\"\n").unwrap();
        let config = RunConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.rounds, 3);

        assert!(matches!(
            RunConfig::load("/nonexistent/siege.toml"),
            Err(SiegeError::Io(_))
        ));
    }
}
