//! The individual data model: identity, sub-states, fitness, verification
//! record and lineage.
//!
//! `Individual` is the unit every other component operates on: [`crate::
//! hilbert`] manipulates its `perception.state`; [`crate::nsga2`] ranks it by
//! `fitness`; [`crate::proof_gate`] attaches a `proof` to it; [`crate::
//! evolution`] clones, crosses and mutates it across generations. The core
//! never reaches into `metadata`/`memory` payloads — they are opaque blobs
//! carried for the caller's benefit.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hilbert::State;
use crate::proof_gate::VerificationRecord;

/// A small closed set of agent archetypes. Callers that need more should
/// widen this enum rather than smuggling extra kinds through `metadata`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    Trader,
    Router,
    Coordinator,
    Generic,
}

/// Opaque payload carried in memory entries and tool metadata. The core
/// never inspects the contents; it only stores and moves it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MetadataValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Blob(Vec<u8>),
}

/// One symbolic item of reasoning sub-state: a fact, a condition/action
/// rule, or an ordered plan toward a goal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KnowledgeItem {
    Fact { statement: String },
    Rule { condition: String, action: String },
    Plan { steps: Vec<String>, goal: String },
}

/// A callable capability an individual can invoke, with a non-negative cost
/// and optional pre/post conditions expressed as free-form text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub cost: f64,
    pub precondition: Option<String>,
    pub postcondition: Option<String>,
}

impl Tool {
    /// Constructs a tool, clamping a negative cost to zero since the
    /// invariant `tool cost >= 0` must hold unconditionally.
    pub fn new(name: impl Into<String>, cost: f64) -> Self {
        Self { name: name.into(), cost: cost.max(0.0), precondition: None, postcondition: None }
    }
}

/// A time-stamped, optionally-expiring key/value memory entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: MetadataValue,
    pub timestamp: DateTime<Utc>,
    pub ttl: Option<chrono::Duration>,
}

/// Perception sub-state: the complex-valued state vector plus bookkeeping
/// around how confident the individual is in it and where it came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Perception {
    pub state: State,
    /// Scalar uncertainty in `[0, 1]`.
    pub uncertainty: f64,
    /// Append-only trail of short provenance tags.
    pub provenance: Vec<String>,
    pub last_mutated_at: DateTime<Utc>,
}

impl Perception {
    fn genesis(state_dimension: usize, now: DateTime<Utc>) -> Self {
        Self {
            state: State::zero(state_dimension),
            uncertainty: 0.0,
            provenance: Vec::new(),
            last_mutated_at: now,
        }
    }
}

/// Reasoning sub-state: the individual's symbolic knowledge and active
/// goals.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Reasoning {
    pub knowledge: Vec<KnowledgeItem>,
    pub goals: Vec<String>,
}

/// Coordination sub-state: tools, memory, decision history, and partners.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Coordination {
    pub tools: Vec<Tool>,
    pub memory: Vec<MemoryEntry>,
    /// Append-only decision history (free-form text per decision).
    pub decisions: Vec<String>,
    pub partners: Vec<String>,
}

impl Coordination {
    /// `Σ tool.cost`. Never negative, since each [`Tool`] enforces that on
    /// construction.
    pub fn total_tool_cost(&self) -> f64 {
        self.tools.iter().map(|t| t.cost).sum()
    }
}

/// The per-axis fitness vector produced by an evaluator, paired with the
/// wall-clock time it was produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Objectives {
    pub values: Vec<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Objectives {
    pub fn zero(axis_count: usize, now: DateTime<Utc>) -> Self {
        Self { values: vec![0.0; axis_count], timestamp: now }
    }
}

/// The unit of evolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Individual {
    pub id: String,
    pub kind: Kind,
    pub generation: u64,

    pub perception: Perception,
    pub reasoning: Reasoning,
    pub coordination: Coordination,

    pub fitness: Objectives,
    pub proof: Option<VerificationRecord>,

    /// Append-only list of short reproductive-event tags
    /// (`genesis`, `clone-from:<id>`, `crossover:<a>x<b>`, `mutation:gen<n>`, …).
    pub lineage: Vec<String>,

    /// Scratch space for caller-defined metadata the core never inspects.
    pub metadata: HashMap<String, MetadataValue>,
}

impl Individual {
    /// Creates a genesis individual: zero state, empty sub-states, zeroed
    /// objectives, and `lineage == ["genesis"]`.
    pub fn genesis(
        id: impl Into<String>,
        kind: Kind,
        state_dimension: usize,
        axis_count: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            generation: 0,
            perception: Perception::genesis(state_dimension, now),
            reasoning: Reasoning::default(),
            coordination: Coordination::default(),
            fitness: Objectives::zero(axis_count, now),
            proof: None,
            lineage: vec!["genesis".to_string()],
            metadata: HashMap::new(),
        }
    }

    /// Appends a provenance tag and bumps the perception timestamp. Used by
    /// every operation that touches `perception.state`.
    pub fn touch_perception(&mut self, tag: impl Into<String>, now: DateTime<Utc>) {
        self.perception.provenance.push(tag.into());
        self.perception.last_mutated_at = now;
    }

    pub fn add_knowledge(&mut self, item: KnowledgeItem) {
        self.reasoning.knowledge.push(item);
    }

    pub fn add_tool(&mut self, tool: Tool) {
        self.coordination.tools.push(tool);
    }

    pub fn record_decision(&mut self, decision: impl Into<String>) {
        self.coordination.decisions.push(decision.into());
    }

    pub fn add_lineage(&mut self, tag: impl Into<String>) {
        self.lineage.push(tag.into());
    }

    pub fn is_verified(&self) -> bool {
        self.proof.as_ref().map(|p| p.verified).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn genesis_individual_has_expected_defaults() {
        let ind = Individual::genesis("agent-0", Kind::Generic, 4, 6, now());
        assert_eq!(ind.generation, 0);
        assert_eq!(ind.perception.state.len(), 4);
        assert_eq!(ind.fitness.values.len(), 6);
        assert_eq!(ind.lineage, vec!["genesis".to_string()]);
        assert!(ind.reasoning.knowledge.is_empty());
        assert!(ind.coordination.tools.is_empty());
        assert!(!ind.is_verified());
    }

    #[test]
    fn tool_cost_never_negative() {
        let t = Tool::new("probe", -5.0);
        assert_eq!(t.cost, 0.0);
    }

    #[test]
    fn total_tool_cost_sums_individual_costs() {
        let mut coord = Coordination::default();
        coord.tools.push(Tool::new("a", 1.5));
        coord.tools.push(Tool::new("b", 2.5));
        assert_eq!(coord.total_tool_cost(), 4.0);
    }

    #[test]
    fn lineage_and_provenance_only_grow() {
        let mut ind = Individual::genesis("agent-0", Kind::Generic, 2, 2, now());
        ind.add_lineage("clone-from:agent-x");
        ind.touch_perception("mutation", now());
        assert_eq!(ind.lineage.len(), 2);
        assert_eq!(ind.perception.provenance.len(), 1);
    }
}
