//! The normalized model: processes, locations, edges, events, and
//! synchronization vectors, plus the static-analysis maps derived from them.
//!
//! Parsing a textual system declaration is out of scope; this module's
//! `Model` is the already-normalized form the rest of the engine consumes,
//! loadable from JSON via `serde` (see `load_json`).

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or validating a [`Model`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("process index {0} out of range")]
    ProcessOutOfRange(usize),
    #[error("location index {0} out of range")]
    LocationOutOfRange(usize),
    #[error("event id {0} not declared")]
    UnknownEvent(u32),
    #[error("edge references unknown source or target location")]
    DanglingEdge,
    #[error("synchronization vector references unknown process or event")]
    BadSyncVector,
    #[error("failed to parse model JSON: {0}")]
    Json(String),
}

type Result<T> = std::result::Result<T, ModelError>;

/// Index of a process within a [`Model`].
pub type ProcessId = usize;
/// Index of a location within a single process's location list.
pub type LocationId = usize;
/// Index of a declared event.
pub type EventId = u32;
/// Index of a clock, shared flat across all processes (clock 0 is the
/// reference clock in the DBM sense).
pub type ClockId = usize;
/// Index of an integer variable, flat across all processes.
pub type IntVarId = usize;

/// Relative synchronization strength of a process participating in a sync
/// vector: strong participants must always fire together; weak participants
/// may fire the synchronized event alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStrength {
    Strong,
    Weak,
}

/// One (process, event, strength) triple of a synchronization vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConstraint {
    pub process: ProcessId,
    pub event: EventId,
    pub strength: SyncStrength,
}

/// A synchronization vector: the set of processes that jointly fire a
/// synchronized transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncVector {
    pub constraints: Vec<SyncConstraint>,
}

/// A discrete location of one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub initial: bool,
    pub accepting: bool,
    /// Clock ids that must be bounded by an invariant at this location; the
    /// invariant itself is expressed as bytecode (see `src/bytecode.rs`).
    pub invariant: Option<crate::bytecode::Program>,
    /// Open Question 2 resolution: magnetic-POR eligibility is an explicit
    /// per-location flag rather than inferred from naming.
    pub magnetic: bool,
}

/// An edge of one process: source/target location, guarded event, guard and
/// statement bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub src: LocationId,
    pub tgt: LocationId,
    pub event: EventId,
    pub guard: Option<crate::bytecode::Program>,
    pub statement: Option<crate::bytecode::Program>,
}

/// One process: its locations, edges, and the clocks it declares (by flat
/// clock id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub name: String,
    pub locations: Vec<Location>,
    pub edges: Vec<Edge>,
}

/// The full normalized model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub processes: Vec<Process>,
    pub event_names: Vec<String>,
    pub clock_count: usize,
    pub intvar_count: usize,
    pub intvar_bounds: Vec<(i64, i64)>,
    pub syncs: Vec<SyncVector>,
}

/// For each (process, location), the set of synchronization-vector ids that
/// location's outgoing edges may trigger directly, and the set reachable by
/// any sequence of purely-local (non-synchronizing) edges from it.
#[derive(Debug, Clone, Default)]
pub struct LocationNextSyncs {
    pub next_sync_location: fixedbitset::FixedBitSet,
    pub next_sync_reachable: fixedbitset::FixedBitSet,
}

/// Derived, read-only static-analysis maps built once from a [`Model`].
pub struct StaticAnalysis {
    /// `sync_ids_by_event[e]`: which sync vectors mention event `e`.
    pub sync_ids_by_event: FxHashMap<EventId, Vec<usize>>,
    /// Whether location `(p, l)` only ever takes purely local (non-
    /// synchronized) edges.
    pub pure_local: FxHashMap<(ProcessId, LocationId), bool>,
    /// Whether location `(p, l)` has both local and synchronized outgoing
    /// edges.
    pub mixed: FxHashMap<(ProcessId, LocationId), bool>,
    /// Events that appear in at least one sync vector with `Weak` strength
    /// for some process (i.e. may fire alone there).
    pub weakly_synchronized_events: FxHashSet<EventId>,
    /// `location_next_syncs[(p, l)]`.
    pub location_next_syncs: FxHashMap<(ProcessId, LocationId), LocationNextSyncs>,
    /// Whether the system shape is "client/server": at most one process
    /// participates as the sole strong constraint across all syncs.
    pub is_client_server: bool,
    /// Whether every sync vector binds every process (a "global"
    /// synchronization shape) as opposed to a "local" pairwise shape.
    pub is_global: bool,
}

impl Model {
    /// Loads a normalized model from its JSON serialization. This is the
    /// on-ramp used by the CLI in place of the (out of scope) textual
    /// front-end.
    pub fn load_json(bytes: &[u8]) -> Result<Model> {
        serde_json::from_slice(bytes).map_err(|e| ModelError::Json(e.to_string()))
    }

    /// Structural validation: every edge references in-range locations,
    /// every sync vector references declared processes/events.
    pub fn validate(&self) -> Result<()> {
        for process in &self.processes {
            for edge in &process.edges {
                if edge.src >= process.locations.len() || edge.tgt >= process.locations.len() {
                    return Err(ModelError::DanglingEdge);
                }
                if edge.event as usize >= self.event_names.len() {
                    return Err(ModelError::UnknownEvent(edge.event));
                }
            }
        }
        for sync in &self.syncs {
            for c in &sync.constraints {
                if c.process >= self.processes.len() {
                    return Err(ModelError::ProcessOutOfRange(c.process));
                }
                if c.event as usize >= self.event_names.len() {
                    return Err(ModelError::BadSyncVector);
                }
            }
        }
        Ok(())
    }

    /// Builds the derived static-analysis maps. Grounded in the shape of
    /// `tchecker::system::static_analysis`: pure-local/mixed location
    /// classification, weakly-synchronized event sets, location-next-syncs
    /// bitsets, and the client/server and global/local system-shape tests.
    pub fn static_analysis(&self) -> StaticAnalysis {
        let mut sync_ids_by_event: FxHashMap<EventId, Vec<usize>> = FxHashMap::default();
        for (i, sync) in self.syncs.iter().enumerate() {
            for c in &sync.constraints {
                sync_ids_by_event.entry(c.event).or_default().push(i);
            }
        }

        let synchronized_events: FxHashSet<EventId> = self
            .syncs
            .iter()
            .flat_map(|s| s.constraints.iter().map(|c| c.event))
            .collect();

        let mut weakly_synchronized_events = FxHashSet::default();
        for sync in &self.syncs {
            for c in &sync.constraints {
                if c.strength == SyncStrength::Weak {
                    weakly_synchronized_events.insert(c.event);
                }
            }
        }

        let mut pure_local = FxHashMap::default();
        let mut mixed = FxHashMap::default();
        let mut location_next_syncs = FxHashMap::default();

        for (pid, process) in self.processes.iter().enumerate() {
            for (lid, _loc) in process.locations.iter().enumerate() {
                let outgoing: Vec<&Edge> = process.edges.iter().filter(|e| e.src == lid).collect();
                let has_local = outgoing.iter().any(|e| !synchronized_events.contains(&e.event));
                let has_sync = outgoing.iter().any(|e| synchronized_events.contains(&e.event));
                pure_local.insert((pid, lid), has_local && !has_sync);
                mixed.insert((pid, lid), has_local && has_sync);

                let mut next_sync_location = fixedbitset::FixedBitSet::with_capacity(self.syncs.len());
                for e in &outgoing {
                    if let Some(ids) = sync_ids_by_event.get(&e.event) {
                        for &id in ids {
                            next_sync_location.insert(id);
                        }
                    }
                }
                location_next_syncs.insert(
                    (pid, lid),
                    LocationNextSyncs {
                        next_sync_location,
                        next_sync_reachable: fixedbitset::FixedBitSet::with_capacity(self.syncs.len()),
                    },
                );
            }
        }

        // next_sync_reachable: fixpoint over purely-local successor edges.
        let mut changed = true;
        while changed {
            changed = false;
            for (pid, process) in self.processes.iter().enumerate() {
                for (lid, _loc) in process.locations.iter().enumerate() {
                    let mut reachable = location_next_syncs[&(pid, lid)].next_sync_location.clone();
                    reachable.union_with(&location_next_syncs[&(pid, lid)].next_sync_reachable);
                    for e in process.edges.iter().filter(|e| e.src == lid) {
                        if synchronized_events.contains(&e.event) {
                            continue;
                        }
                        let succ = &location_next_syncs[&(pid, e.tgt)];
                        let mut succ_all = succ.next_sync_location.clone();
                        succ_all.union_with(&succ.next_sync_reachable);
                        reachable.union_with(&succ_all);
                    }
                    let entry = location_next_syncs.get_mut(&(pid, lid)).unwrap();
                    if entry.next_sync_reachable != reachable {
                        entry.next_sync_reachable = reachable;
                        changed = true;
                    }
                }
            }
        }

        // client/server: every sync vector has exactly one Strong participant.
        let is_client_server = !self.syncs.is_empty()
            && self.syncs.iter().all(|s| {
                s.constraints.iter().filter(|c| c.strength == SyncStrength::Strong).count() == 1
            });

        // global: every sync vector binds every process.
        let is_global = !self.syncs.is_empty()
            && self
                .syncs
                .iter()
                .all(|s| s.constraints.len() == self.processes.len());

        StaticAnalysis {
            sync_ids_by_event,
            pure_local,
            mixed,
            weakly_synchronized_events,
            location_next_syncs,
            is_client_server,
            is_global,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_model() -> Model {
        Model {
            processes: vec![Process {
                name: "P".into(),
                locations: vec![
                    Location { name: "l0".into(), initial: true, accepting: false, invariant: None, magnetic: false },
                    Location { name: "l1".into(), initial: false, accepting: true, invariant: None, magnetic: false },
                ],
                edges: vec![Edge { src: 0, tgt: 1, event: 0, guard: None, statement: None }],
            }],
            event_names: vec!["a".into()],
            clock_count: 1,
            intvar_count: 0,
            intvar_bounds: vec![],
            syncs: vec![],
        }
    }

    #[test]
    fn validate_accepts_well_formed_model() {
        assert!(tiny_model().validate().is_ok());
    }

    #[test]
    fn validate_rejects_dangling_edge() {
        let mut m = tiny_model();
        m.processes[0].edges[0].tgt = 5;
        assert_eq!(m.validate(), Err(ModelError::DanglingEdge));
    }

    #[test]
    fn single_process_single_event_is_pure_local_everywhere() {
        let m = tiny_model();
        let sa = m.static_analysis();
        assert_eq!(sa.pure_local[&(0, 0)], true);
        assert_eq!(sa.mixed[&(0, 0)], false);
    }

    #[test]
    fn two_process_sync_marks_participating_locations_mixed_or_synced() {
        let mut m = tiny_model();
        m.processes.push(Process {
            name: "Q".into(),
            locations: vec![
                Location { name: "m0".into(), initial: true, accepting: false, invariant: None, magnetic: false },
                Location { name: "m1".into(), initial: false, accepting: false, invariant: None, magnetic: false },
            ],
            edges: vec![Edge { src: 0, tgt: 1, event: 0, guard: None, statement: None }],
        });
        m.syncs.push(SyncVector {
            constraints: vec![
                SyncConstraint { process: 0, event: 0, strength: SyncStrength::Strong },
                SyncConstraint { process: 1, event: 0, strength: SyncStrength::Strong },
            ],
        });
        let sa = m.static_analysis();
        assert_eq!(sa.pure_local[&(0, 0)], false);
        assert!(sa.is_global);
        assert!(sa.is_client_server);
    }

    #[test]
    fn json_round_trip_via_load_json() {
        let m = tiny_model();
        let bytes = serde_json::to_vec(&m).unwrap();
        let loaded = Model::load_json(&bytes).unwrap();
        assert_eq!(loaded, m);
    }
}
