//! NSGA-II selector: Pareto dominance, fast non-dominated sort, crowding
//! distance, binary tournament, and size-bounded generation selection.
//!
//! The selector operates on [`Genome`] — a minimal, opaque record carrying an
//! id, an objective vector, and writable rank/crowding slots. It never
//! inspects state vectors, knowledge, tools or any other payload; callers
//! convert an [`crate::agent::Individual`] to a `Genome` via
//! [`Genome::from_individual`] before ranking and look the winners back up by
//! id afterwards.

#![forbid(unsafe_code)]

use crate::agent::Individual;
use crate::objectives::{no_worse, strictly_better, Axis};
use crate::rng::Rng;

/// A minimal record the selector ranks: an id, an objective vector, and
/// writable `rank`/`crowding` slots.
#[derive(Clone, Debug)]
pub struct Genome {
    pub id: String,
    pub objectives: Vec<f64>,
    pub rank: usize,
    pub crowding: f64,
}

impl Genome {
    pub fn from_individual(ind: &Individual) -> Self {
        Self { id: ind.id.clone(), objectives: ind.fitness.values.clone(), rank: 0, crowding: 0.0 }
    }
}

/// Shape errors raised when genomes disagree on objective-vector length.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Nsga2Error {
    #[error("objective vector length mismatch: {a} vs {b}")]
    ObjectiveLengthMismatch { a: usize, b: usize },
}

/// `a` dominates `b` under axis list `axes` iff `a` is no-worse on every
/// axis and strictly better on at least one. Irreflexive, asymmetric,
/// transitive.
pub fn dominates(a: &Genome, b: &Genome, axes: &[Axis]) -> Result<bool, Nsga2Error> {
    if a.objectives.len() != axes.len() || b.objectives.len() != axes.len() {
        return Err(Nsga2Error::ObjectiveLengthMismatch { a: a.objectives.len(), b: b.objectives.len() });
    }
    let mut any_strict = false;
    for (i, axis) in axes.iter().enumerate() {
        let (av, bv) = (a.objectives[i], b.objectives[i]);
        if !no_worse(av, bv, axis.sense) {
            return Ok(false);
        }
        if strictly_better(av, bv, axis.sense) {
            any_strict = true;
        }
    }
    Ok(any_strict)
}

/// Fast non-dominated sort: partitions `population` into ranked fronts.
/// Every genome appears in exactly one front; `rank` is written onto each
/// genome to match its front index. Empty fronts are omitted. An empty
/// population returns an empty list.
pub fn fast_nondominated_sort(
    population: &mut [Genome],
    axes: &[Axis],
) -> Result<Vec<Vec<usize>>, Nsga2Error> {
    let n = population.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count: Vec<usize> = vec![0; n];
    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut front0 = Vec::new();

    for p in 0..n {
        for q in 0..n {
            if p == q {
                continue;
            }
            if dominates(&population[p], &population[q], axes)? {
                dominated_by[p].push(q);
            } else if dominates(&population[q], &population[p], axes)? {
                domination_count[p] += 1;
            }
        }
        if domination_count[p] == 0 {
            population[p].rank = 0;
            front0.push(p);
        }
    }
    fronts.push(front0);

    let mut k = 0;
    loop {
        let mut next_front = Vec::new();
        for &p in &fronts[k] {
            for &q in &dominated_by[p].clone() {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    population[q].rank = k + 1;
                    next_front.push(q);
                }
            }
        }
        if next_front.is_empty() {
            break;
        }
        fronts.push(next_front);
        k += 1;
    }

    Ok(fronts)
}

/// Crowding distance within one front, written back onto each genome's
/// `crowding` slot. Fronts of size <= 2 get `+inf` for every member.
pub fn crowding_distance(population: &mut [Genome], front: &[usize], axes: &[Axis]) {
    if front.len() <= 2 {
        for &i in front {
            population[i].crowding = f64::INFINITY;
        }
        return;
    }

    for &i in front {
        population[i].crowding = 0.0;
    }

    for (m, axis) in axes.iter().enumerate() {
        let mut order = front.to_vec();
        order.sort_by(|&a, &b| {
            let (av, bv) = (population[a].objectives[m], population[b].objectives[m]);
            let better_first = strictly_better(av, bv, axis.sense);
            let worse_first = strictly_better(bv, av, axis.sense);
            if better_first {
                std::cmp::Ordering::Less
            } else if worse_first {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });

        population[order[0]].crowding = f64::INFINITY;
        population[*order.last().unwrap()].crowding = f64::INFINITY;

        let min = population[order[0]].objectives[m];
        let max = population[*order.last().unwrap()].objectives[m];
        let range = (max - min).abs();
        if range < 1e-10 {
            continue;
        }

        for w in 1..order.len() - 1 {
            let next = population[order[w + 1]].objectives[m];
            let prev = population[order[w - 1]].objectives[m];
            let contribution = (next - prev).abs() / range;
            population[order[w]].crowding += contribution;
        }
    }
}

/// Binary tournament: draw two genomes uniformly at random *with
/// replacement* from `indices`. Lower rank wins; tie -> higher crowding
/// wins; tie -> the first drawn wins. Returns the winning index into
/// `population`.
pub fn tournament(population: &[Genome], indices: &[usize], rng: &mut Rng) -> usize {
    let a = indices[rng.index(indices.len())];
    let b = indices[rng.index(indices.len())];
    let (ga, gb) = (&population[a], &population[b]);
    if ga.rank != gb.rank {
        if ga.rank < gb.rank {
            a
        } else {
            b
        }
    } else if ga.crowding != gb.crowding {
        if ga.crowding > gb.crowding {
            a
        } else {
            b
        }
    } else {
        a
    }
}

/// Selects a next generation of size `target` from `population`: full fronts
/// in rank order, then the highest-crowding members of the cutoff front.
/// `population.len() <= target` returns the whole (ranked) population.
pub fn select_next_generation(
    mut population: Vec<Genome>,
    axes: &[Axis],
    target: usize,
) -> Result<Vec<Genome>, Nsga2Error> {
    if population.is_empty() {
        return Ok(population);
    }
    let fronts = fast_nondominated_sort(&mut population, axes)?;
    for front in &fronts {
        crowding_distance(&mut population, front, axes);
    }

    if population.len() <= target {
        return Ok(population);
    }

    let mut selected_indices: Vec<usize> = Vec::with_capacity(target);
    for front in &fronts {
        if selected_indices.len() + front.len() <= target {
            selected_indices.extend(front.iter().copied());
        } else {
            let remaining = target - selected_indices.len();
            let mut sorted_front = front.clone();
            sorted_front.sort_by(|&a, &b| {
                population[b]
                    .crowding
                    .partial_cmp(&population[a].crowding)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            selected_indices.extend(sorted_front.into_iter().take(remaining));
            break;
        }
    }

    Ok(selected_indices.into_iter().map(|i| population[i].clone()).collect())
}
