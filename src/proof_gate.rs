//! The verification gate: "no mutation without proof".
//!
//! An individual survives into the next generation only if it passes a
//! configurable list of threshold [`crate::objectives::Law`]s plus a fixed
//! set of structural checks (privacy loss, cost, optional stability, tool
//! budget). Passing individuals get a [`VerificationRecord`] attached;
//! failing ones are left untouched.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::agent::Individual;
use crate::hilbert::is_stable;
use crate::objectives::Law;
use crate::rng::Rng;

/// The objective-vector index the gate reads the privacy-loss axis from.
const PRIVACY_AXIS: usize = 4;
/// The objective-vector index the gate reads the cost axis from.
const COST_AXIS: usize = 5;

/// One check's outcome: name, pass/fail, the observed value, the threshold
/// it was compared against (if any), and a human-readable message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub value: f64,
    pub threshold: Option<f64>,
    pub message: String,
}

/// A proof-carrying artifact attached to individuals that pass the gate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub spec_summary: String,
    pub proof_blob: String,
    pub verified: bool,
    pub timestamp: DateTime<Utc>,
    pub checks: Vec<CheckResult>,
}

/// Gate configuration: an ordered list of threshold laws plus the fixed
/// structural checks every individual is additionally held to.
pub struct ProofGateConfig {
    pub laws: Vec<Law<Individual>>,
    pub max_privacy_loss: f64,
    pub max_cost: f64,
    pub require_stability: bool,
    pub stability_epsilon: f64,
}

impl ProofGateConfig {
    /// The implicit tool-budget rule: total tool cost must not exceed
    /// `max_cost / 2`.
    fn tool_budget(&self) -> f64 {
        self.max_cost / 2.0
    }

    fn validate(&self) -> Result<(), ProofGateConfigError> {
        if self.max_privacy_loss < 0.0 {
            return Err(ProofGateConfigError::NegativeMaxPrivacyLoss(self.max_privacy_loss));
        }
        if self.max_cost < 0.0 {
            return Err(ProofGateConfigError::NegativeMaxCost(self.max_cost));
        }
        if self.stability_epsilon < 0.0 {
            return Err(ProofGateConfigError::NegativeStabilityEpsilon(self.stability_epsilon));
        }
        Ok(())
    }
}

/// Errors raised by [`ProofGateConfigBuilder::build`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProofGateConfigError {
    #[error("max_privacy_loss must be non-negative, got {0}")]
    NegativeMaxPrivacyLoss(f64),
    #[error("max_cost must be non-negative, got {0}")]
    NegativeMaxCost(f64),
    #[error("stability_epsilon must be non-negative, got {0}")]
    NegativeStabilityEpsilon(f64),
}

/// Builds a [`ProofGateConfig`], validating at [`ProofGateConfigBuilder::build`]
/// rather than at each setter — the same construct-then-validate discipline
/// [`crate::evolution::EvolutionConfigBuilder`] uses.
pub struct ProofGateConfigBuilder {
    laws: Vec<Law<Individual>>,
    max_privacy_loss: f64,
    max_cost: f64,
    require_stability: bool,
    stability_epsilon: f64,
}

impl ProofGateConfigBuilder {
    pub fn new() -> Self {
        Self { laws: Vec::new(), max_privacy_loss: 1.0, max_cost: 1000.0, require_stability: false, stability_epsilon: 0.05 }
    }

    pub fn law(mut self, law: Law<Individual>) -> Self {
        self.laws.push(law);
        self
    }

    pub fn max_privacy_loss(mut self, value: f64) -> Self {
        self.max_privacy_loss = value;
        self
    }

    pub fn max_cost(mut self, value: f64) -> Self {
        self.max_cost = value;
        self
    }

    pub fn require_stability(mut self, value: bool) -> Self {
        self.require_stability = value;
        self
    }

    pub fn stability_epsilon(mut self, value: f64) -> Self {
        self.stability_epsilon = value;
        self
    }

    pub fn build(self) -> Result<ProofGateConfig, ProofGateConfigError> {
        let config = ProofGateConfig {
            laws: self.laws,
            max_privacy_loss: self.max_privacy_loss,
            max_cost: self.max_cost,
            require_stability: self.require_stability,
            stability_epsilon: self.stability_epsilon,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for ProofGateConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Verifies a single individual against `config`, returning its checks in
/// canonical order (declared laws, then privacy-loss, cost, optionally
/// stability, then tool-budget) and the logical AND of every check.
pub fn verify(individual: &Individual, config: &ProofGateConfig, rng: &mut Rng, now: DateTime<Utc>) -> VerificationRecord {
    let mut checks = Vec::with_capacity(config.laws.len() + 4);

    for law in &config.laws {
        let value = (law.evaluate)(individual);
        let passed = law.is_satisfied(value);
        checks.push(CheckResult {
            name: law.name.clone(),
            passed,
            value,
            threshold: law.threshold,
            message: if passed {
                format!("{} satisfied", law.name)
            } else {
                format!("{} violated: value {value}, threshold {:?}", law.name, law.threshold)
            },
        });
    }

    let privacy_loss = individual.fitness.values.get(PRIVACY_AXIS).copied().unwrap_or(0.0);
    let privacy_passed = privacy_loss <= config.max_privacy_loss;
    checks.push(CheckResult {
        name: "privacy-loss".to_string(),
        passed: privacy_passed,
        value: privacy_loss,
        threshold: Some(config.max_privacy_loss),
        message: if privacy_passed {
            "privacy loss within bound".to_string()
        } else {
            format!("privacy loss {privacy_loss} exceeds bound {}", config.max_privacy_loss)
        },
    });

    let cost = individual.fitness.values.get(COST_AXIS).copied().unwrap_or(0.0);
    let cost_passed = cost <= config.max_cost;
    checks.push(CheckResult {
        name: "cost".to_string(),
        passed: cost_passed,
        value: cost,
        threshold: Some(config.max_cost),
        message: if cost_passed {
            "cost within bound".to_string()
        } else {
            format!("cost {cost} exceeds bound {}", config.max_cost)
        },
    });

    if config.require_stability {
        let stable = is_stable(&individual.perception.state, config.stability_epsilon, rng);
        checks.push(CheckResult {
            name: "stability".to_string(),
            passed: stable,
            value: if stable { 1.0 } else { 0.0 },
            threshold: None,
            message: if stable {
                "state is a local energy minimum".to_string()
            } else {
                "state failed the stability probe".to_string()
            },
        });
    }

    let tool_cost = individual.coordination.total_tool_cost();
    let budget = config.tool_budget();
    let tool_passed = tool_cost <= budget;
    checks.push(CheckResult {
        name: "tool-budget".to_string(),
        passed: tool_passed,
        value: tool_cost,
        threshold: Some(budget),
        message: if tool_passed {
            "tool cost within budget".to_string()
        } else {
            format!("tool cost {tool_cost} exceeds budget {budget}")
        },
    });

    let verified = checks.iter().all(|c| c.passed);
    let spec_summary = format!("{} of {} checks passed", checks.iter().filter(|c| c.passed).count(), checks.len());
    let proof_blob = render_proof_blob(&checks);

    if verified {
        debug!(id = %individual.id, "individual passed the gate");
    } else {
        info!(id = %individual.id, failed_checks = ?checks.iter().filter(|c| !c.passed).map(|c| c.name.as_str()).collect::<Vec<_>>(), "individual failed the gate");
    }

    VerificationRecord { spec_summary, proof_blob, verified, timestamp: now, checks }
}

/// Serialises the check list to JSON, hashes it with blake3, and renders the
/// digest as hex. Deterministic given the same checks.
fn render_proof_blob(checks: &[CheckResult]) -> String {
    let serialised = serde_json::to_vec(checks).unwrap_or_default();
    let digest = blake3::hash(&serialised);
    hex::encode(digest.as_bytes())
}

/// Applies the gate to a whole population. Passed individuals are cloned
/// with a verified record attached; failed individuals are cloned unchanged.
/// Returns `(passed, failed, records_by_id)`.
pub fn apply_to_population(
    population: &[Individual],
    config: &ProofGateConfig,
    rng: &mut Rng,
    now: DateTime<Utc>,
) -> (Vec<Individual>, Vec<Individual>, HashMap<String, VerificationRecord>) {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut records = HashMap::with_capacity(population.len());

    for individual in population {
        let record = verify(individual, config, rng, now);
        records.insert(individual.id.clone(), record.clone());
        if record.verified {
            let mut verified_individual = individual.clone();
            verified_individual.proof = Some(record);
            passed.push(verified_individual);
        } else {
            failed.push(individual.clone());
        }
    }

    (passed, failed, records)
}
