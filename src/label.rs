//! Accepting-label matching (`-l`): decides whether a node is a target of
//! the reachability query.

use crate::model::Model;
use crate::ts::State;

/// A compiled `-l` label expression: currently a flat set of location names
/// that must all be simultaneously occupied (conjunctive accepting set),
/// matching the CLI's comma-separated label list.
#[derive(Debug, Clone, Default)]
pub struct LabelMatcher {
    required: Vec<String>,
}

impl LabelMatcher {
    /// Parses a comma-separated `-l` argument into a matcher. An empty
    /// string matches every node whose locations are all flagged
    /// `Location::accepting` in the model (the default accepting set).
    pub fn parse(spec: &str) -> LabelMatcher {
        let required = spec
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        LabelMatcher { required }
    }

    /// Whether `state` satisfies this matcher against `model`.
    pub fn matches(&self, model: &Model, state: &State) -> bool {
        if self.required.is_empty() {
            return state
                .vloc
                .iter()
                .enumerate()
                .all(|(pid, &lid)| model.processes[pid].locations[lid].accepting);
        }
        self.required.iter().all(|name| {
            state
                .vloc
                .iter()
                .enumerate()
                .any(|(pid, &lid)| model.processes[pid].locations[lid].name == *name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Location, Process};
    use crate::zone::Zone;

    fn model() -> Model {
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
    fn empty_matcher_uses_model_accepting_flags() {
        let m = model();
        let matcher = LabelMatcher::parse("");
        let s0 = State { vloc: vec![0], intvars: vec![], zone: Zone::zero(1) };
        let s1 = State { vloc: vec![1], intvars: vec![], zone: Zone::zero(1) };
        assert!(!matcher.matches(&m, &s0));
        assert!(matcher.matches(&m, &s1));
    }

    #[test]
    fn named_matcher_requires_named_location_occupied() {
        let m = model();
        let matcher = LabelMatcher::parse("l1");
        let s1 = State { vloc: vec![1], intvars: vec![], zone: Zone::zero(1) };
        assert!(matcher.matches(&m, &s1));
    }
}
