use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// DCR initial-marking letter (§3.4). Distinct from BPMN markings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventMarking {
    Pending,
    Included,
    Executed,
}

impl EventMarking {
    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'p' => Some(EventMarking::Pending),
            'i' => Some(EventMarking::Included),
            'e' => Some(EventMarking::Executed),
            _ => None,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            EventMarking::Pending => 'p',
            EventMarking::Included => 'i',
            EventMarking::Executed => 'e',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Condition,
    Response,
    Inclusion,
    Exclusion,
    Milestone,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Condition => "condition",
            RelationKind::Response => "response",
            RelationKind::Inclusion => "inclusion",
            RelationKind::Exclusion => "exclusion",
            RelationKind::Milestone => "milestone",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DcrEvent {
    pub id: String,
    pub label: String,
    pub initial_marking: HashSet<EventMarking>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub source_id: String,
    pub target_id: String,
    pub kind: RelationKind,
}

/// Programmer-error taxonomy for C2 mutations (§4.3.8). These are bugs in
/// the translator, not in the BPMN input, and are raised immediately rather
/// than collected.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("event id cannot be empty")]
    EmptyEventId,
    #[error("invalid initial marking letter '{0}'")]
    InvalidMarkingLetter(char),
}

/// The in-memory DCR graph (C2). Events are keyed by id in a `BTreeMap` so
/// that `events()` iterates in stable id order for free, matching §4.3.7's
/// determinism requirement without a separate sort step at export time.
#[derive(Debug, Default)]
pub struct DcrGraph {
    pub process_id: Option<String>,
    pub process_name: Option<String>,
    events: BTreeMap<String, DcrEvent>,
    relations: Vec<Relation>,
    relation_set: HashSet<(String, String, RelationKind)>,
}

impl DcrGraph {
    pub fn new() -> Self {
        DcrGraph::default()
    }

    /// Adds an event. Idempotent: re-adding the same id with the same label
    /// and marking is a no-op; re-adding with a different label or marking
    /// overwrites (§3.4).
    pub fn add_event(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        initial_marking: HashSet<EventMarking>,
    ) -> Result<(), ModelError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ModelError::EmptyEventId);
        }
        let label = label.into();
        self.events.insert(
            id.clone(),
            DcrEvent {
                id,
                label,
                initial_marking,
            },
        );
        Ok(())
    }

    /// Convenience constructor from marking letters, raising
    /// `InvalidMarkingLetter` immediately on an unknown letter (§4.3.8).
    pub fn add_event_with_letters(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        letters: &str,
    ) -> Result<(), ModelError> {
        let mut marking = HashSet::new();
        for ch in letters.chars() {
            marking.insert(EventMarking::from_letter(ch).ok_or(ModelError::InvalidMarkingLetter(ch))?);
        }
        self.add_event(id, label, marking)
    }

    pub fn has_event(&self, id: &str) -> bool {
        self.events.contains_key(id)
    }

    pub fn event(&self, id: &str) -> Option<&DcrEvent> {
        self.events.get(id)
    }

    /// Events in stable id order.
    pub fn events(&self) -> impl Iterator<Item = &DcrEvent> {
        self.events.values()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Adds a relation. Silently skips if either endpoint does not yet
    /// exist as an event (§4.3.8: "missing cross-references ... silently
    /// skip"); set-semantic, duplicates collapse (§3.4).
    pub fn add_relation(
        &mut self,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: RelationKind,
    ) {
        let source_id = source_id.into();
        let target_id = target_id.into();
        if !self.events.contains_key(&source_id) || !self.events.contains_key(&target_id) {
            return;
        }
        let key = (source_id.clone(), target_id.clone(), kind);
        if !self.relation_set.insert(key) {
            return;
        }
        self.relations.push(Relation {
            source_id,
            target_id,
            kind,
        });
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn has_relation(&self, source_id: &str, target_id: &str, kind: RelationKind) -> bool {
        self.relation_set
            .contains(&(source_id.to_string(), target_id.to_string(), kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_event_is_idempotent_on_identical_reinsert() {
        let mut dcr = DcrGraph::new();
        dcr.add_event_with_letters("A", "Task A", "").unwrap();
        dcr.add_event_with_letters("A", "Task A", "").unwrap();
        assert_eq!(dcr.event_count(), 1);
    }

    #[test]
    fn add_event_overwrites_label_on_reinsert_with_different_label() {
        let mut dcr = DcrGraph::new();
        dcr.add_event_with_letters("A", "Old", "").unwrap();
        dcr.add_event_with_letters("A", "New", "").unwrap();
        assert_eq!(dcr.event("A").unwrap().label, "New");
    }

    #[test]
    fn add_relation_skips_missing_endpoints() {
        let mut dcr = DcrGraph::new();
        dcr.add_event_with_letters("A", "A", "").unwrap();
        dcr.add_relation("A", "ghost", RelationKind::Response);
        assert_eq!(dcr.relation_count(), 0);
    }

    #[test]
    fn add_relation_deduplicates_identical_triples() {
        let mut dcr = DcrGraph::new();
        dcr.add_event_with_letters("A", "A", "").unwrap();
        dcr.add_event_with_letters("B", "B", "").unwrap();
        dcr.add_relation("A", "B", RelationKind::Condition);
        dcr.add_relation("A", "B", RelationKind::Condition);
        assert_eq!(dcr.relation_count(), 1);
    }

    #[test]
    fn invalid_marking_letter_is_a_hard_error() {
        let mut dcr = DcrGraph::new();
        let err = dcr.add_event_with_letters("A", "A", "q").unwrap_err();
        assert!(matches!(err, ModelError::InvalidMarkingLetter('q')));
    }
}
