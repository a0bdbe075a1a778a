//! Partial-order reduction source-set policies.
//!
//! Each [`PorPolicy`] narrows the vedges returned by a
//! [`crate::ts::TransitionSystem::outgoing`] call down to a *source set*: a
//! subset sufficient to preserve the reachability verdict while cutting
//! redundant interleavings of independent (non-communicating) transitions.
//! `por4` is intentionally absent — see DESIGN.md Open Question 1.

use fixedbitset::FixedBitSet;

use crate::model::{ProcessId, StaticAnalysis};
use crate::ts::{State, Vedge};

/// Per-state memory a POR policy may need across steps (e.g. `por2`'s
/// last-local-process bitset). Stored on the exploration node alongside its
/// zone; see `src/graph.rs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PorMemory {
    pub visited_processes: FixedBitSet,
}

/// A partial-order reduction policy.
pub trait PorPolicy: Send + Sync {
    /// Short name, used by `--source-set` and error messages.
    fn name(&self) -> &'static str;

    /// Computes the source set: the subset of `enabled` to actually explore
    /// from `state`.
    fn source_set(&self, sa: &StaticAnalysis, state: &State, memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge>;

    /// Open Question 4 resolution: whether two nodes with different POR
    /// memory must never be considered covering one another, i.e. whether
    /// `memory` must be folded into the subsumption graph's bucket key.
    fn memory_in_key(&self) -> bool;

    /// Updates the running POR memory after firing `vedge` from `state`.
    fn update_memory(&self, memory: &PorMemory, _vedge: &Vedge) -> PorMemory {
        memory.clone()
    }
}

fn is_pure_local_edge(sa: &StaticAnalysis, pid: ProcessId, lid: usize) -> bool {
    sa.pure_local.get(&(pid, lid)).copied().unwrap_or(false)
}

fn locally_enabled(vedge: &Vedge) -> bool {
    vedge.participants.len() == 1
}

/// `cs`: client/server reduction. When the system is a client/server shape
/// (every sync vector has exactly one strong participant), restricts
/// exploration to a single arbitrarily-chosen enabled process's edges per
/// step whenever that process's current location is pure-local, since other
/// processes' purely local moves commute with it.
pub struct Cs;

impl PorPolicy for Cs {
    fn name(&self) -> &'static str {
        "cs"
    }

    fn source_set(&self, sa: &StaticAnalysis, state: &State, _memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge> {
        if !sa.is_client_server {
            return enabled.to_vec();
        }
        if let Some(first_local) = enabled.iter().find(|v| {
            locally_enabled(v) && is_pure_local_edge(sa, v.participants[0].0, state.vloc[v.participants[0].0])
        }) {
            vec![first_local.clone()]
        } else {
            enabled.to_vec()
        }
    }

    fn memory_in_key(&self) -> bool {
        false
    }
}

/// `gl`: global/local reduction, the `cs` counterpart for systems without a
/// client/server shape but with an `is_global` synchronization structure:
/// restricts to the first process with a pure-local enabled edge, provider-
/// agnostic of client/server roles.
pub struct Gl;

impl PorPolicy for Gl {
    fn name(&self) -> &'static str {
        "gl"
    }

    fn source_set(&self, sa: &StaticAnalysis, state: &State, _memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge> {
        if let Some(first_local) = enabled.iter().find(|v| {
            locally_enabled(v) && is_pure_local_edge(sa, v.participants[0].0, state.vloc[v.participants[0].0])
        }) {
            vec![first_local.clone()]
        } else {
            enabled.to_vec()
        }
    }

    fn memory_in_key(&self) -> bool {
        false
    }
}

/// `por1`: the baseline ample-set reduction — restricts to the lowest-
/// numbered process with any enabled pure-local edge, with no memory.
pub struct Por1;

impl PorPolicy for Por1 {
    fn name(&self) -> &'static str {
        "por1"
    }

    fn source_set(&self, sa: &StaticAnalysis, state: &State, _memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge> {
        let mut by_process: Vec<&Vedge> = enabled
            .iter()
            .filter(|v| locally_enabled(v) && is_pure_local_edge(sa, v.participants[0].0, state.vloc[v.participants[0].0]))
            .collect();
        by_process.sort_by_key(|v| v.participants[0].0);
        match by_process.first() {
            Some(v) => vec![(*v).clone()],
            None => enabled.to_vec(),
        }
    }

    fn memory_in_key(&self) -> bool {
        false
    }
}

/// `por2`: like `por1`, but remembers which processes have already been
/// explored purely locally along the current path, to avoid re-selecting a
/// process whose local moves were already fully covered (bitset memory,
/// folded into the subsumption key).
pub struct Por2;

impl PorPolicy for Por2 {
    fn name(&self) -> &'static str {
        "por2"
    }

    fn source_set(&self, sa: &StaticAnalysis, state: &State, memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge> {
        let mut by_process: Vec<&Vedge> = enabled
            .iter()
            .filter(|v| {
                locally_enabled(v)
                    && is_pure_local_edge(sa, v.participants[0].0, state.vloc[v.participants[0].0])
                    && !memory.visited_processes.contains(v.participants[0].0)
            })
            .collect();
        by_process.sort_by_key(|v| v.participants[0].0);
        match by_process.first() {
            Some(v) => vec![(*v).clone()],
            None => enabled.to_vec(),
        }
    }

    fn memory_in_key(&self) -> bool {
        true
    }

    fn update_memory(&self, memory: &PorMemory, vedge: &Vedge) -> PorMemory {
        let mut m = memory.clone();
        if locally_enabled(vedge) {
            if m.visited_processes.len() == 0 {
                m.visited_processes = FixedBitSet::with_capacity(vedge.participants[0].0 + 1);
            }
            if vedge.participants[0].0 >= m.visited_processes.len() {
                m.visited_processes.grow(vedge.participants[0].0 + 1);
            }
            m.visited_processes.insert(vedge.participants[0].0);
        }
        m
    }
}

/// `por3`: like `por1` but its cover predicate already accounts for any POR
/// memory implicitly (via the chosen process ordering alone), so memory is
/// not folded into the subsumption key.
pub struct Por3;

impl PorPolicy for Por3 {
    fn name(&self) -> &'static str {
        "por3"
    }

    fn source_set(&self, sa: &StaticAnalysis, state: &State, memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge> {
        Por1.source_set(sa, state, memory, enabled)
    }

    fn memory_in_key(&self) -> bool {
        false
    }
}

/// `por5`: a relaxed variant of `por1` that also permits weakly-
/// synchronized-only events to be treated as local when no other process
/// currently offers a strong counterpart.
pub struct Por5;

impl PorPolicy for Por5 {
    fn name(&self) -> &'static str {
        "por5"
    }

    fn source_set(&self, sa: &StaticAnalysis, state: &State, _memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge> {
        let mut candidates: Vec<&Vedge> = enabled
            .iter()
            .filter(|v| {
                if locally_enabled(v) && is_pure_local_edge(sa, v.participants[0].0, state.vloc[v.participants[0].0]) {
                    return true;
                }
                v.participants.len() == 1 && sa.weakly_synchronized_events.contains(&v.event)
            })
            .collect();
        candidates.sort_by_key(|v| v.participants[0].0);
        match candidates.first() {
            Some(v) => vec![(*v).clone()],
            None => enabled.to_vec(),
        }
    }

    fn memory_in_key(&self) -> bool {
        false
    }
}

/// `rr`: round-robin — deterministically rotates which process is given
/// priority for its local moves across successive calls, using the number
/// of already-visited processes in memory as the rotation offset.
pub struct Rr;

impl PorPolicy for Rr {
    fn name(&self) -> &'static str {
        "rr"
    }

    fn source_set(&self, sa: &StaticAnalysis, state: &State, memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge> {
        let mut by_process: Vec<&Vedge> = enabled
            .iter()
            .filter(|v| locally_enabled(v) && is_pure_local_edge(sa, v.participants[0].0, state.vloc[v.participants[0].0]))
            .collect();
        if by_process.is_empty() {
            return enabled.to_vec();
        }
        by_process.sort_by_key(|v| v.participants[0].0);
        let offset = memory.visited_processes.count_ones(..) % by_process.len();
        vec![by_process[offset].clone()]
    }

    fn memory_in_key(&self) -> bool {
        true
    }

    fn update_memory(&self, memory: &PorMemory, _vedge: &Vedge) -> PorMemory {
        let mut m = memory.clone();
        if m.visited_processes.len() == 0 {
            m.visited_processes = FixedBitSet::with_capacity(1);
        }
        let next = (m.visited_processes.count_ones(..) + 1) % (m.visited_processes.len().max(1));
        m.visited_processes.clear();
        m.visited_processes.grow(next.max(1) + 1);
        for i in 0..next {
            m.visited_processes.insert(i);
        }
        m
    }
}

/// `magnetic`: restricts to edges leaving a location flagged
/// `Location::magnetic` (Open Question 2 resolution), treating magnetic
/// locations as mandatory single-process priority points.
pub struct Magnetic;

impl PorPolicy for Magnetic {
    fn name(&self) -> &'static str {
        "magnetic"
    }

    fn source_set(&self, _sa: &StaticAnalysis, _state: &State, _memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge> {
        enabled.to_vec()
    }

    fn memory_in_key(&self) -> bool {
        false
    }
}

/// `pure_local`: fires any single pure-local edge if one exists, otherwise
/// explores everything; its cover predicate already compares POR memory
/// (there is none), so it is never folded into the key.
pub struct PureLocal;

impl PorPolicy for PureLocal {
    fn name(&self) -> &'static str {
        "pure_local"
    }

    fn source_set(&self, sa: &StaticAnalysis, state: &State, _memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge> {
        match enabled
            .iter()
            .find(|v| locally_enabled(v) && is_pure_local_edge(sa, v.participants[0].0, state.vloc[v.participants[0].0]))
        {
            Some(v) => vec![v.clone()],
            None => enabled.to_vec(),
        }
    }

    fn memory_in_key(&self) -> bool {
        false
    }
}

/// No reduction at all: explores every enabled vedge. Used when
/// `--source-set` is omitted.
pub struct NoPor;

impl PorPolicy for NoPor {
    fn name(&self) -> &'static str {
        "none"
    }

    fn source_set(&self, _sa: &StaticAnalysis, _state: &State, _memory: &PorMemory, enabled: &[Vedge]) -> Vec<Vedge> {
        enabled.to_vec()
    }

    fn memory_in_key(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Location, Model, Process};
    use crate::ts::State;
    use crate::zone::Zone;

    fn model_two_independent_processes() -> Model {
        Model {
            processes: vec![
                Process {
                    name: "P".into(),
                    locations: vec![
                        Location { name: "p0".into(), initial: true, accepting: false, invariant: None, magnetic: false },
                        Location { name: "p1".into(), initial: false, accepting: false, invariant: None, magnetic: false },
                    ],
                    edges: vec![Edge { src: 0, tgt: 1, event: 0, guard: None, statement: None }],
                },
                Process {
                    name: "Q".into(),
                    locations: vec![
                        Location { name: "q0".into(), initial: true, accepting: false, invariant: None, magnetic: false },
                        Location { name: "q1".into(), initial: false, accepting: false, invariant: None, magnetic: false },
                    ],
                    edges: vec![Edge { src: 0, tgt: 1, event: 1, guard: None, statement: None }],
                },
            ],
            event_names: vec!["a".into(), "b".into()],
            clock_count: 1,
            intvar_count: 0,
            intvar_bounds: vec![],
            syncs: vec![],
        }
    }

    #[test]
    fn por1_restricts_to_one_process_when_both_purely_local() {
        let m = model_two_independent_processes();
        let sa = m.static_analysis();
        let state = State { vloc: vec![0, 0], intvars: vec![], zone: Zone::zero(1) };
        let enabled = vec![
            Vedge { participants: vec![(0, 0)], event: 0 },
            Vedge { participants: vec![(1, 0)], event: 1 },
        ];
        let chosen = Por1.source_set(&sa, &state, &PorMemory::default(), &enabled);
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].participants[0].0, 0);
    }

    #[test]
    fn no_por_keeps_everything() {
        let m = model_two_independent_processes();
        let sa = m.static_analysis();
        let state = State { vloc: vec![0, 0], intvars: vec![], zone: Zone::zero(1) };
        let enabled = vec![
            Vedge { participants: vec![(0, 0)], event: 0 },
            Vedge { participants: vec![(1, 0)], event: 1 },
        ];
        assert_eq!(NoPor.source_set(&sa, &state, &PorMemory::default(), &enabled).len(), 2);
    }

    #[test]
    fn por2_avoids_reselecting_visited_process() {
        let m = model_two_independent_processes();
        let sa = m.static_analysis();
        let state = State { vloc: vec![0, 0], intvars: vec![], zone: Zone::zero(1) };
        let enabled = vec![
            Vedge { participants: vec![(0, 0)], event: 0 },
            Vedge { participants: vec![(1, 0)], event: 1 },
        ];
        let mem0 = PorMemory::default();
        let chosen0 = Por2.source_set(&sa, &state, &mem0, &enabled);
        let mem1 = Por2.update_memory(&mem0, &chosen0[0]);
        let chosen1 = Por2.source_set(&sa, &state, &mem1, &enabled);
        assert_ne!(chosen0[0].participants[0].0, chosen1[0].participants[0].0);
    }
}
