//! The generational driver: evaluate, gate, rank, snapshot, reproduce.
//!
//! This is the only module that sequences the other three components.
//! Evaluation of every individual is polled concurrently and joined before
//! the gate runs — no other step ever observes a partially-evaluated
//! population.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tracing::{info, info_span, warn};

use crate::agent::{Individual, Kind, KnowledgeItem};
use crate::hilbert::spectral_sync;
use crate::nsga2::{self, Genome};
use crate::objectives::Axis;
use crate::proof_gate::{self, ProofGateConfig, ProofGateConfigBuilder};
use crate::rng::Rng;

/// Configuration errors: all are caught at construction, never mid-run.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("population_size must be at least 3, got {0}")]
    PopulationTooSmall(usize),
    #[error("generations must be at least 1, got {0}")]
    NoGenerations,
    #[error("state_dimension must be at least 1, got {0}")]
    ZeroStateDimension,
    #[error("objectives list must not be empty")]
    EmptyAxisList,
}

/// What an [`Evaluator`] reports back for one individual: either it filled
/// in the objective vector normally, or it observed cancellation (e.g. a
/// caller-supplied `Cancellation` it was handed out-of-band) and returned
/// early without doing so.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvaluationOutcome {
    Completed,
    Cancelled,
}

/// A caller-supplied evaluator: fills in `individual.fitness` in place.
/// Implementations must be safe to invoke concurrently on distinct
/// individuals — the driver fans evaluation out over a task set.
///
/// Returning [`EvaluationOutcome::Cancelled`] for any individual in a batch
/// is treated by the driver exactly like a zero-passed-individuals halt: the
/// current generation's (partial) statistics are recorded and the run stops.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, individual: &mut Individual, now: DateTime<Utc>) -> EvaluationOutcome;
}

/// The six-objective evaluator the crate ships. Callers may supply their own
/// [`Evaluator`] instead.
pub struct ReferenceEvaluator;

#[async_trait]
impl Evaluator for ReferenceEvaluator {
    async fn evaluate(&self, individual: &mut Individual, now: DateTime<Utc>) -> EvaluationOutcome {
        let s = individual.perception.state.norm();
        let c = individual.coordination.total_tool_cost();
        let k = individual.reasoning.knowledge.len() as f64;
        let decisions = individual.coordination.decisions.len() as f64;

        let gain = (0.2 + 0.1 * k + 0.2 * (1.0 - s).abs()).min(1.0);
        let latency = 50.0 + 10.0 * k + 5.0 * c;
        let engagement = (0.1 * decisions).min(1.0);
        let fairness = if c > 0.0 { (1.0 / (1.0 + (c - 1.0).abs())).min(1.0) } else { 0.5 };
        let privacy_loss = individual.perception.uncertainty;
        let cost = c + 0.1 * k;

        individual.fitness.values = vec![gain, latency, engagement, fairness, privacy_loss, cost];
        individual.fitness.timestamp = now;
        EvaluationOutcome::Completed
    }
}

/// A caller-supplied cooperative cancellation flag, inspectable between
/// generations and inside the evaluation barrier.
#[derive(Clone)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-generation statistics recorded regardless of whether reproduction
/// happens afterward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationSnapshot {
    pub generation: u64,
    pub population_before_gate: usize,
    pub pareto_front_size: usize,
    pub passed: usize,
    pub failed: usize,
    pub mean_objectives: Vec<f64>,
    pub best_objectives: Option<Vec<f64>>,
    pub timestamp: DateTime<Utc>,
}

/// The outcome of a complete run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub final_population: Vec<Individual>,
    pub final_pareto_front: Vec<Individual>,
    pub snapshots: Vec<GenerationSnapshot>,
    pub elapsed_millis: u64,
}

/// Full run configuration.
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations: u64,
    pub state_dimension: usize,
    pub objectives: Vec<Axis>,
    pub proof_gate: ProofGateConfig,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub seed: Option<u64>,
}

impl EvolutionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 3 {
            return Err(ConfigError::PopulationTooSmall(self.population_size));
        }
        if self.generations < 1 {
            return Err(ConfigError::NoGenerations);
        }
        if self.state_dimension < 1 {
            return Err(ConfigError::ZeroStateDimension);
        }
        if self.objectives.is_empty() {
            return Err(ConfigError::EmptyAxisList);
        }
        Ok(())
    }
}

/// Builds an [`EvolutionConfig`], validating at [`EvolutionConfigBuilder::build`]
/// rather than at each setter.
pub struct EvolutionConfigBuilder {
    population_size: usize,
    generations: u64,
    state_dimension: usize,
    objectives: Vec<Axis>,
    proof_gate: Option<ProofGateConfig>,
    crossover_rate: f64,
    mutation_rate: f64,
    seed: Option<u64>,
}

impl EvolutionConfigBuilder {
    pub fn new(objectives: Vec<Axis>) -> Self {
        Self {
            population_size: 20,
            generations: 10,
            state_dimension: 4,
            objectives,
            proof_gate: None,
            crossover_rate: 0.7,
            mutation_rate: 0.2,
            seed: None,
        }
    }

    pub fn population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn generations(mut self, n: u64) -> Self {
        self.generations = n;
        self
    }

    pub fn state_dimension(mut self, n: usize) -> Self {
        self.state_dimension = n;
        self
    }

    pub fn proof_gate(mut self, config: ProofGateConfig) -> Self {
        self.proof_gate = Some(config);
        self
    }

    pub fn crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<EvolutionConfig, ConfigError> {
        let proof_gate = match self.proof_gate {
            Some(config) => config,
            None => ProofGateConfigBuilder::new().build().expect("default gate configuration is always valid"),
        };
        let config = EvolutionConfig {
            population_size: self.population_size,
            generations: self.generations,
            state_dimension: self.state_dimension,
            objectives: self.objectives,
            proof_gate,
            crossover_rate: self.crossover_rate,
            mutation_rate: self.mutation_rate,
            seed: self.seed,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Crosses two parents: clones `p1` structurally, replaces its state with
/// the consensus average of both parents' states, concatenates the first
/// two knowledge items and first tool of each parent, and bumps generation.
fn crossover(p1: &Individual, p2: &Individual, id: String, now: DateTime<Utc>) -> Individual {
    let mut child = p1.clone();
    child.id = id;
    child.generation = p1.generation.max(p2.generation) + 1;

    if let Ok(synced) = spectral_sync(&[p1.perception.state.clone(), p2.perception.state.clone()]) {
        child.perception.state = synced;
    }
    child.touch_perception("crossover", now);

    child.reasoning.knowledge = p1
        .reasoning
        .knowledge
        .iter()
        .take(2)
        .chain(p2.reasoning.knowledge.iter().take(2))
        .cloned()
        .collect();

    child.coordination.tools = p1
        .coordination
        .tools
        .iter()
        .take(1)
        .chain(p2.coordination.tools.iter().take(1))
        .cloned()
        .collect();

    child.add_lineage(format!("crossover:gen{}", child.generation));
    child
}

/// With probability `1 - rate`, no-op. Otherwise perturbs the state,
/// renormalises, and independently may drop or add a knowledge item.
fn mutate(individual: &mut Individual, rate: f64, rng: &mut Rng, now: DateTime<Utc>) {
    if !rng.bernoulli(rate) {
        return;
    }

    let perturbed: Vec<_> = individual
        .perception
        .state
        .0
        .iter()
        .map(|c| crate::hilbert::Complex::new(c.re + rng.uniform(-0.1, 0.1), c.im + rng.uniform(-0.1, 0.1)))
        .collect();
    individual.perception.state = crate::hilbert::State(perturbed).normalise();
    individual.touch_perception("mutation", now);

    if rng.bernoulli(0.3) && !individual.reasoning.knowledge.is_empty() {
        individual.reasoning.knowledge.pop();
    }
    if rng.bernoulli(0.3) {
        individual.add_knowledge(KnowledgeItem::Fact { statement: format!("observed-at-gen-{}", individual.generation) });
    }

    individual.add_lineage(format!("mutation:gen{}", individual.generation));
}

/// Evaluation barrier: every individual's future is polled concurrently via
/// `join_all` and the whole batch is awaited before any later driver step
/// runs. Distinct individuals are disjoint borrows, so the evaluator may do
/// real concurrent work (I/O, other async calls) without data races.
///
/// Returns `true` if any individual's evaluator reported
/// [`EvaluationOutcome::Cancelled`] — the caller treats that like a
/// zero-passed-individuals halt.
async fn evaluate_population(population: &mut [Individual], evaluator: &dyn Evaluator, now: DateTime<Utc>) -> bool {
    let futures = population.iter_mut().map(|individual| evaluator.evaluate(individual, now));
    let outcomes = futures::future::join_all(futures).await;
    outcomes.iter().any(|outcome| *outcome == EvaluationOutcome::Cancelled)
}

/// Runs a complete evolutionary process from a caller-supplied initial
/// population. Consumes `population`; returns ownership via [`RunResult`].
pub async fn run(
    mut population: Vec<Individual>,
    config: &EvolutionConfig,
    evaluator: &dyn Evaluator,
    cancellation: &Cancellation,
) -> RunResult {
    let started = Utc::now();
    let mut rng = match config.seed {
        Some(seed) => Rng::seeded(seed),
        None => Rng::from_entropy(),
    };

    let mut snapshots = Vec::new();
    let mut last_passed: Vec<Individual> = Vec::new();
    let mut last_front: Vec<Individual> = Vec::new();

    for generation in 0..config.generations {
        let span = info_span!("generation", generation);
        let _entered = span.enter();

        if cancellation.is_cancelled() {
            info!("cancellation observed before generation start");
            break;
        }

        let now = Utc::now();
        let evaluator_cancelled = evaluate_population(&mut population, evaluator, now).await;
        if evaluator_cancelled {
            warn!("evaluator reported cancellation; halting like a zero-passed generation");
            snapshots.push(empty_snapshot(generation, population.len(), now));
            last_passed = Vec::new();
            break;
        }

        let population_before_gate = population.len();
        let (passed, failed, _records) = proof_gate::apply_to_population(&population, &config.proof_gate, &mut rng, now);
        info!(passed = passed.len(), failed = failed.len(), "gate verdict");

        if passed.is_empty() {
            snapshots.push(empty_snapshot(generation, population_before_gate, now));
            last_passed = passed;
            break;
        }

        let mut genomes: Vec<Genome> = passed.iter().map(Genome::from_individual).collect();
        let fronts = match nsga2::fast_nondominated_sort(&mut genomes, &config.objectives) {
            Ok(f) => f,
            Err(_) => {
                snapshots.push(empty_snapshot(generation, population_before_gate, now));
                break;
            }
        };
        for front in &fronts {
            nsga2::crowding_distance(&mut genomes, front, &config.objectives);
        }
        let front0_ids: Vec<&str> = fronts.first().map(|f| f.iter().map(|&i| genomes[i].id.as_str()).collect()).unwrap_or_default();
        let pareto_front: Vec<Individual> = passed.iter().filter(|ind| front0_ids.contains(&ind.id.as_str())).cloned().collect();

        snapshots.push(build_snapshot(generation, population_before_gate, &passed, &pareto_front, fronts.first().map(|f| f.len()).unwrap_or(0), now));

        last_passed = passed.clone();
        last_front = pareto_front;

        if generation + 1 >= config.generations || cancellation.is_cancelled() {
            population = last_passed.clone();
            break;
        }

        info!("reproducing next generation");
        population = reproduce(&passed, &genomes, config, &mut rng, generation, now);
    }

    let elapsed_millis = (Utc::now() - started).num_milliseconds().max(0) as u64;
    RunResult { final_population: last_passed, final_pareto_front: last_front, snapshots, elapsed_millis }
}

fn empty_snapshot(generation: u64, population_before_gate: usize, now: DateTime<Utc>) -> GenerationSnapshot {
    GenerationSnapshot {
        generation,
        population_before_gate,
        pareto_front_size: 0,
        passed: 0,
        failed: population_before_gate,
        mean_objectives: Vec::new(),
        best_objectives: None,
        timestamp: now,
    }
}

fn build_snapshot(
    generation: u64,
    population_before_gate: usize,
    passed: &[Individual],
    pareto_front: &[Individual],
    pareto_front_size: usize,
    now: DateTime<Utc>,
) -> GenerationSnapshot {
    let axis_count = passed.first().map(|ind| ind.fitness.values.len()).unwrap_or(0);
    let mut mean = vec![0.0; axis_count];
    for ind in passed {
        for (m, v) in mean.iter_mut().zip(ind.fitness.values.iter()) {
            *m += v;
        }
    }
    let n = passed.len() as f64;
    for m in mean.iter_mut() {
        *m /= n;
    }

    // Front 0, first element; fall back to the first passed individual if
    // the front is somehow empty.
    let best_objectives = pareto_front.first().or_else(|| passed.first()).map(|ind| ind.fitness.values.clone());

    GenerationSnapshot {
        generation,
        population_before_gate,
        pareto_front_size,
        passed: passed.len(),
        failed: population_before_gate - passed.len(),
        mean_objectives: mean,
        best_objectives,
        timestamp: now,
    }
}

fn reproduce(
    passed: &[Individual],
    genomes: &[Genome],
    config: &EvolutionConfig,
    rng: &mut Rng,
    generation: u64,
    now: DateTime<Utc>,
) -> Vec<Individual> {
    let by_id: std::collections::HashMap<&str, &Individual> = passed.iter().map(|ind| (ind.id.as_str(), ind)).collect();
    let elite_count = config.population_size / 2;

    let selected = nsga2::select_next_generation(genomes.to_vec(), &config.objectives, elite_count).unwrap_or_default();
    let mut next_generation: Vec<Individual> = selected.iter().filter_map(|g| by_id.get(g.id.as_str()).map(|ind| (*ind).clone())).collect();

    let all_indices: Vec<usize> = (0..genomes.len()).collect();
    let mut n = 0;
    while next_generation.len() < config.population_size && !genomes.is_empty() {
        let i1 = nsga2::tournament(genomes, &all_indices, rng);
        let i2 = nsga2::tournament(genomes, &all_indices, rng);
        let p1 = by_id[genomes[i1].id.as_str()];
        let p2 = by_id[genomes[i2].id.as_str()];

        let id = format!("agent-gen{}-{}", generation + 1, n);
        let mut child = if rng.bernoulli(config.crossover_rate) {
            crossover(p1, p2, id, now)
        } else {
            let mut clone = p1.clone();
            clone.id = id;
            clone.generation += 1;
            clone
        };
        mutate(&mut child, config.mutation_rate, rng, now);
        next_generation.push(child);
        n += 1;
    }

    next_generation
}

/// Extends [`Individual`] with the small shim [`crate::nsga2::Genome::from_individual`]
/// relies on: a readable kind for reporting/diagnostics.
impl Individual {
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            Kind::Trader => "trader",
            Kind::Router => "router",
            Kind::Coordinator => "coordinator",
            Kind::Generic => "generic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectives::Sense;

    fn axes() -> Vec<Axis> {
        vec![
            Axis::new("gain", Sense::Max),
            Axis::new("latency", Sense::Min),
            Axis::new("engagement", Sense::Max),
            Axis::new("fairness", Sense::Max),
            Axis::new("privacy-loss", Sense::Min),
            Axis::new("cost", Sense::Min),
        ]
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn permissive_gate() -> ProofGateConfig {
        ProofGateConfig { laws: Vec::new(), max_privacy_loss: 1.0, max_cost: 1000.0, require_stability: false, stability_epsilon: 0.05 }
    }

    #[test]
    fn config_rejects_small_population() {
        let builder = EvolutionConfigBuilder::new(axes()).population_size(2);
        assert_eq!(builder.build().unwrap_err(), ConfigError::PopulationTooSmall(2));
    }

    #[test]
    fn config_rejects_zero_generations() {
        let builder = EvolutionConfigBuilder::new(axes()).generations(0);
        assert_eq!(builder.build().unwrap_err(), ConfigError::NoGenerations);
    }

    #[test]
    fn config_rejects_empty_axis_list() {
        let builder = EvolutionConfigBuilder::new(Vec::new());
        assert_eq!(builder.build().unwrap_err(), ConfigError::EmptyAxisList);
    }

    #[test]
    fn config_accepts_reasonable_values() {
        let config = EvolutionConfigBuilder::new(axes())
            .population_size(10)
            .generations(3)
            .proof_gate(permissive_gate())
            .seed(7)
            .build()
            .unwrap();
        assert_eq!(config.population_size, 10);
    }

    #[test]
    fn crossover_bumps_generation_and_syncs_state() {
        let p1 = Individual::genesis("p1", Kind::Generic, 2, 6, now());
        let mut p2 = Individual::genesis("p2", Kind::Generic, 2, 6, now());
        p2.generation = 3;
        let child = crossover(&p1, &p2, "child".to_string(), now());
        assert_eq!(child.generation, 4);
        assert_eq!(child.perception.state.len(), 2);
        assert!(child.lineage.contains(&"crossover:gen4".to_string()));
    }

    #[test]
    fn mutate_is_a_noop_at_zero_rate() {
        let mut ind = Individual::genesis("p1", Kind::Generic, 2, 6, now());
        let before = ind.perception.state.clone();
        let mut rng = Rng::seeded(1);
        mutate(&mut ind, 0.0, &mut rng, now());
        assert_eq!(ind.perception.state, before);
    }

    #[test]
    fn mutate_preserves_state_dimension() {
        let mut ind = Individual::genesis("p1", Kind::Generic, 3, 6, now());
        let mut rng = Rng::seeded(9);
        mutate(&mut ind, 1.0, &mut rng, now());
        assert_eq!(ind.perception.state.len(), 3);
    }

    // S7 — a short run produces monotone non-decreasing generation counters.
    #[tokio::test]
    async fn s7_short_run_produces_snapshots_and_halts_gracefully() {
        let population: Vec<Individual> = (0..5).map(|i| Individual::genesis(format!("agent-0-{i}"), Kind::Generic, 3, 6, now())).collect();
        let config = EvolutionConfigBuilder::new(axes())
            .population_size(5)
            .generations(3)
            .state_dimension(3)
            .proof_gate(permissive_gate())
            .seed(5)
            .build()
            .unwrap();
        let cancellation = Cancellation::new();
        let result = run(population, &config, &ReferenceEvaluator, &cancellation).await;
        assert!(!result.snapshots.is_empty());
        for pair in result.snapshots.windows(2) {
            assert!(pair[1].generation >= pair[0].generation);
        }
    }

    #[tokio::test]
    async fn run_halts_gracefully_when_gate_rejects_everyone() {
        let population: Vec<Individual> = (0..3).map(|i| Individual::genesis(format!("agent-0-{i}"), Kind::Generic, 2, 6, now())).collect();
        let mut gate = permissive_gate();
        gate.max_cost = -1.0;
        let config = EvolutionConfigBuilder::new(axes()).population_size(3).generations(2).proof_gate(gate).seed(1).build().unwrap();
        let cancellation = Cancellation::new();
        let result = run(population, &config, &ReferenceEvaluator, &cancellation).await;
        assert!(result.final_population.is_empty());
        assert_eq!(result.snapshots.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_halts_before_any_generation_runs() {
        let population: Vec<Individual> = (0..3).map(|i| Individual::genesis(format!("agent-0-{i}"), Kind::Generic, 2, 6, now())).collect();
        let config = EvolutionConfigBuilder::new(axes()).population_size(3).generations(5).proof_gate(permissive_gate()).seed(1).build().unwrap();
        let cancellation = Cancellation::new();
        cancellation.cancel();
        let result = run(population, &config, &ReferenceEvaluator, &cancellation).await;
        assert!(result.snapshots.is_empty());
    }
}
