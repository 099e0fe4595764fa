use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// BPMN element kind. Task subtypes (userTask, serviceTask, ...) all collapse
/// to `Task` during parsing; the reader is the only place that sees the
/// distinction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    StartEvent,
    EndEvent,
    Task,
    ParallelGateway,
    ExclusiveGateway,
    InclusiveGateway,
    ComplexGateway,
    EventBasedGateway,
}

impl ElementKind {
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            ElementKind::ParallelGateway
                | ElementKind::ExclusiveGateway
                | ElementKind::InclusiveGateway
                | ElementKind::ComplexGateway
                | ElementKind::EventBasedGateway
        )
    }

    /// Gateway type name used in pairing ("same type" checks) and in labels.
    /// `None` for non-gateway kinds.
    pub fn gateway_type(&self) -> Option<GatewayType> {
        match self {
            ElementKind::ParallelGateway => Some(GatewayType::Parallel),
            ElementKind::ExclusiveGateway => Some(GatewayType::Exclusive),
            ElementKind::InclusiveGateway => Some(GatewayType::Inclusive),
            ElementKind::ComplexGateway => Some(GatewayType::Complex),
            ElementKind::EventBasedGateway => Some(GatewayType::EventBased),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayType {
    Parallel,
    Exclusive,
    Inclusive,
    Complex,
    EventBased,
}

impl GatewayType {
    pub fn label(&self) -> &'static str {
        match self {
            GatewayType::Parallel => "Parallel",
            GatewayType::Exclusive => "Exclusive",
            GatewayType::Inclusive => "Inclusive",
            GatewayType::Complex => "Complex",
            GatewayType::EventBased => "EventBased",
        }
    }
}

/// Derived gateway direction (§3.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayDirection {
    Split,
    Join,
    RoutingDecisionPoint,
    UndefinedOrComplex,
}

impl GatewayDirection {
    pub fn label(&self) -> &'static str {
        match self {
            GatewayDirection::Split => "Split",
            GatewayDirection::Join => "Join",
            GatewayDirection::RoutingDecisionPoint => "Routing Decision Point",
            GatewayDirection::UndefinedOrComplex => "Undefined Or Complex",
        }
    }
}

/// Loop role assigned by §4.1.3 loop pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopType {
    LoopEntryJoin,
    LoopConditionSplit,
}

/// One of the four BPMN marking types (§3.3). Distinct from DCR markings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkingType {
    SPlus,
    SMinus,
    JPlus,
    JMinus,
}

impl MarkingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkingType::SPlus => "S+",
            MarkingType::SMinus => "S-",
            MarkingType::JPlus => "J+",
            MarkingType::JMinus => "J-",
        }
    }
}

/// A (type, gateway_id) marking attached to an element (§3.3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpmnMarking {
    pub marking_type: MarkingType,
    pub gateway_id: String,
}

/// A BPMN element (§3.1). Represented as a mutable struct rather than a
/// closed enum, unlike the teacher's `IRNode`: the gateway analyzer mutates
/// `direction`, `paired_gateway_id`, `loop_type`, `markings`, and
/// `inclusive_path_origin_flow_id` in place across several passes, which a
/// construct-once enum can't express without a side table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub name: String,
    pub kind: ElementKind,
    pub incoming_flow_ids: Vec<String>,
    pub outgoing_flow_ids: Vec<String>,
    pub direction: Option<GatewayDirection>,
    pub paired_gateway_id: Option<String>,
    pub loop_type: Option<LoopType>,
    pub markings: Vec<BpmnMarking>,
    pub inclusive_path_origin_flow_id: Option<String>,
}

impl Element {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ElementKind) -> Self {
        Element {
            id: id.into(),
            name: name.into(),
            kind,
            incoming_flow_ids: Vec::new(),
            outgoing_flow_ids: Vec::new(),
            direction: None,
            paired_gateway_id: None,
            loop_type: None,
            markings: Vec::new(),
            inclusive_path_origin_flow_id: None,
        }
    }

    pub fn in_degree(&self) -> usize {
        self.incoming_flow_ids.len()
    }

    pub fn out_degree(&self) -> usize {
        self.outgoing_flow_ids.len()
    }

    /// Additive; duplicates on (type, gateway_id) collapse (§3.3).
    pub fn add_marking(&mut self, marking_type: MarkingType, gateway_id: impl Into<String>) {
        let gateway_id = gateway_id.into();
        if self
            .markings
            .iter()
            .any(|m| m.marking_type == marking_type && m.gateway_id == gateway_id)
        {
            return;
        }
        self.markings.push(BpmnMarking {
            marking_type,
            gateway_id,
        });
    }

    pub fn has_marking(&self, marking_type: MarkingType, gateway_id: &str) -> bool {
        self.markings
            .iter()
            .any(|m| m.marking_type == marking_type && m.gateway_id == gateway_id)
    }

    pub fn is_paired_or_looped(&self) -> bool {
        self.paired_gateway_id.is_some() || self.loop_type.is_some()
    }
}

/// A BPMN sequence flow (§3.1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequenceFlow {
    pub id: String,
    pub name: String,
    pub source_ref: String,
    pub target_ref: String,
    pub expression: Option<String>,
}

/// The in-memory BPMN graph (C1). Backed by `petgraph`, the same substrate
/// `compiler/ir.rs` uses for its IR graph; an id → `NodeIndex` index is kept
/// alongside for O(1) lookup (the teacher's `find_node_by_id` is a linear
/// scan, adequate for its use but wasteful here where the analyzer resolves
/// ids constantly).
#[derive(Debug, Default)]
pub struct BpmnGraph {
    pub process_id: Option<String>,
    pub process_name: Option<String>,
    graph: DiGraph<Element, SequenceFlow>,
    index: HashMap<String, NodeIndex>,
    flow_index: HashMap<String, (NodeIndex, NodeIndex)>,
}

impl BpmnGraph {
    pub fn new() -> Self {
        BpmnGraph::default()
    }

    pub fn add_element(&mut self, element: Element) {
        let id = element.id.clone();
        let idx = self.graph.add_node(element);
        self.index.insert(id, idx);
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut Element> {
        if let Some(&idx) = self.index.get(id) {
            Some(&mut self.graph[idx])
        } else {
            None
        }
    }

    pub fn contains_element(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Element ids in stable (lexicographic) order, as §4.3.7 and §9
    /// "Determinism" require for any phase whose output depends on
    /// iteration order.
    pub fn element_ids_sorted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.index.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.graph.node_weights()
    }

    pub fn add_sequence_flow(&mut self, flow: SequenceFlow) -> anyhow::Result<()> {
        let source_idx = *self
            .index
            .get(&flow.source_ref)
            .ok_or_else(|| anyhow::anyhow!("sequence flow '{}' has unknown source '{}'", flow.id, flow.source_ref))?;
        let target_idx = *self
            .index
            .get(&flow.target_ref)
            .ok_or_else(|| anyhow::anyhow!("sequence flow '{}' has unknown target '{}'", flow.id, flow.target_ref))?;

        let flow_id = flow.id.clone();
        self.graph[source_idx].outgoing_flow_ids.push(flow_id.clone());
        self.graph[target_idx].incoming_flow_ids.push(flow_id.clone());
        self.flow_index.insert(flow_id, (source_idx, target_idx));
        self.graph.add_edge(source_idx, target_idx, flow);
        Ok(())
    }

    pub fn sequence_flow(&self, id: &str) -> Option<&SequenceFlow> {
        let &(source, target) = self.flow_index.get(id)?;
        self.graph
            .edges_connecting(source, target)
            .map(|e| e.weight())
            .find(|f| f.id == id)
    }

    /// Successor element ids reachable via `element_id`'s outgoing flows, in
    /// flow-insertion order (mirrors `BPMNData.get_successors` in the
    /// reference implementation).
    pub fn successors(&self, element_id: &str) -> Vec<String> {
        let Some(element) = self.element(element_id) else {
            return Vec::new();
        };
        element
            .outgoing_flow_ids
            .iter()
            .filter_map(|flow_id| self.sequence_flow(flow_id))
            .filter(|flow| self.contains_element(&flow.target_ref))
            .map(|flow| flow.target_ref.clone())
            .collect()
    }

    pub fn predecessors(&self, element_id: &str) -> Vec<String> {
        let Some(element) = self.element(element_id) else {
            return Vec::new();
        };
        element
            .incoming_flow_ids
            .iter()
            .filter_map(|flow_id| self.sequence_flow(flow_id))
            .filter(|flow| self.contains_element(&flow.source_ref))
            .map(|flow| flow.source_ref.clone())
            .collect()
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Exposed for callers that want raw `petgraph` traversal (e.g. a future
    /// consumer walking `Direction::Incoming`); the analyzer itself uses the
    /// id-based `successors`/`predecessors` helpers above, which match the
    /// reference implementation's BFS shape directly.
    pub fn raw(&self) -> &DiGraph<Element, SequenceFlow> {
        &self.graph
    }

    pub fn degree(&self, element_id: &str, direction: Direction) -> usize {
        match direction {
            Direction::Outgoing => self
                .element(element_id)
                .map(|e| e.out_degree())
                .unwrap_or(0),
            Direction::Incoming => self
                .element(element_id)
                .map(|e| e.in_degree())
                .unwrap_or(0),
        }
    }
}
