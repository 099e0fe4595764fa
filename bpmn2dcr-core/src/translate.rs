//! Translator (C5, §4.3): produces DCR events and relations from the
//! annotated BPMN graph. Dispatches on element kind, gateway type, and
//! markings — the same "match on element-kind variant, build typed output"
//! shape `compiler/lowering.rs` uses to lower IR nodes to bytecode, here
//! lowering BPMN elements to DCR events/relations instead.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::analyzer::{pair_gateways, precondition_checks};
use crate::error::Diagnostic;
use crate::marking::populate_markings;
use crate::model::{
    BpmnGraph, DcrGraph, ElementKind, EventMarking, GatewayDirection, GatewayType, MarkingType,
    RelationKind,
};

/// Runs the full pipeline (§2 data flow: C3 → C4 → C5) over an already
/// parsed BPMN graph and returns the resulting DCR graph, or a categorized
/// `Diagnostic` (§6.3, §7).
pub fn translate(mut bpmn: BpmnGraph) -> Result<DcrGraph, Diagnostic> {
    let span = tracing::info_span!(
        "translate",
        elements = bpmn.elements().count(),
    );
    let _enter = span.enter();

    {
        let _pair_span = tracing::info_span!("pair").entered();
        pair_gateways(&mut bpmn);
    }

    {
        let _precondition_span = tracing::info_span!("precondition").entered();
        precondition_checks(&bpmn).map_err(Diagnostic::PreconditionError)?;
    }

    let dcr = {
        let _rules_span = tracing::info_span!("rules").entered();
        populate_markings(&mut bpmn);
        let mut translator = Translator::new(&bpmn);
        translator.run();
        translator.into_dcr()
    };

    Ok(dcr)
}

struct Translator<'a> {
    bpmn: &'a BpmnGraph,
    dcr: DcrGraph,
    gateway_pair_suffixes: HashMap<String, String>,
    parallel_state_counter: u32,
    inclusive_state_counter: u32,
}

impl<'a> Translator<'a> {
    fn new(bpmn: &'a BpmnGraph) -> Self {
        let gateway_pair_suffixes = assign_gateway_pair_suffixes(bpmn);
        Translator {
            bpmn,
            dcr: DcrGraph::new(),
            gateway_pair_suffixes,
            parallel_state_counter: 1,
            inclusive_state_counter: 1,
        }
    }

    fn into_dcr(self) -> DcrGraph {
        self.dcr
    }

    fn run(&mut self) {
        self.create_events();
        self.generic_relation_mapping();
        self.exclusive_gateway_mapping();
        self.parallel_gateway_mapping();
        self.inclusive_gateway_mapping();
    }

    /// §4.3.1 — one DCR event per BPMN element, id equal to the BPMN id.
    fn create_events(&mut self) {
        for id in self.bpmn.element_ids_sorted() {
            let el = self.bpmn.element(&id).expect("sorted id exists");
            let (label, markings): (String, HashSet<EventMarking>) = if el.kind.is_gateway() {
                let gw_type = el.kind.gateway_type().expect("gateway kind has a gateway type");
                let dir_label = el.direction.map(|d| d.label()).unwrap_or("");
                let base = format!("{} {}", gw_type.label(), dir_label).trim().to_string();
                let label = match self.gateway_pair_suffixes.get(&id) {
                    Some(suffix) => format!("{base}\n{suffix}"),
                    None => base,
                };
                (label, HashSet::new())
            } else {
                match el.kind {
                    ElementKind::StartEvent => (
                        "Start Event".to_string(),
                        [EventMarking::Pending, EventMarking::Included].into_iter().collect(),
                    ),
                    ElementKind::EndEvent => ("End Event".to_string(), HashSet::new()),
                    ElementKind::Task => {
                        let label = if el.name.is_empty() { el.id.clone() } else { el.name.clone() };
                        (label, HashSet::new())
                    }
                    _ => unreachable!("non-gateway BPMN element kinds are StartEvent, EndEvent, Task"),
                }
            };

            if self.dcr.add_event(id.clone(), label, markings).is_ok() {
                self.dcr.add_relation(id.clone(), id.clone(), RelationKind::Exclusion);
            }
        }
    }

    fn is_ordinary_task(&self, id: &str) -> bool {
        self.bpmn
            .element(id)
            .map(|el| el.kind == ElementKind::Task && el.markings.is_empty())
            .unwrap_or(false)
    }

    /// §4.3.3 — generic edge rules, evaluated for every BPMN sequence flow.
    fn generic_relation_mapping(&mut self) {
        let flow_ids: Vec<String> = {
            let mut ids: Vec<String> = self
                .bpmn
                .elements()
                .flat_map(|el| el.outgoing_flow_ids.iter().cloned())
                .collect();
            ids.sort();
            ids
        };

        for flow_id in flow_ids {
            let Some(flow) = self.bpmn.sequence_flow(&flow_id) else {
                continue;
            };
            let (source_id, target_id) = (flow.source_ref.clone(), flow.target_ref.clone());
            let Some(source) = self.bpmn.element(&source_id) else {
                continue;
            };
            let Some(target) = self.bpmn.element(&target_id) else {
                continue;
            };

            let applies = source.kind == ElementKind::StartEvent
                || target.kind == ElementKind::EndEvent
                || (self.is_ordinary_task(&source_id) && self.is_ordinary_task(&target_id))
                || (source.direction == Some(GatewayDirection::Join)
                    && target.has_marking(MarkingType::JPlus, &source_id))
                || (target.direction == Some(GatewayDirection::Split)
                    && source.has_marking(MarkingType::SMinus, &target_id))
                || (source.direction == Some(GatewayDirection::Split)
                    && matches!(
                        source.kind.gateway_type(),
                        Some(GatewayType::Parallel) | Some(GatewayType::Exclusive)
                    )
                    && target.has_marking(MarkingType::SPlus, &source_id))
                || (target.kind == ElementKind::ExclusiveGateway
                    && target.direction == Some(GatewayDirection::Join)
                    && source.has_marking(MarkingType::JMinus, &target_id));

            if applies {
                self.dcr.add_relation(source_id.clone(), target_id.clone(), RelationKind::Response);
                self.dcr.add_relation(source_id, target_id, RelationKind::Inclusion);
            }
        }
    }

    /// §4.3.4 — exclusive split branches mutually exclude each other.
    fn exclusive_gateway_mapping(&mut self) {
        for gw_id in self.bpmn.element_ids_sorted() {
            let el = self.bpmn.element(&gw_id).unwrap();
            if el.kind != ElementKind::ExclusiveGateway || el.direction != Some(GatewayDirection::Split) {
                continue;
            }
            let mut s_plus_targets: Vec<String> = Vec::new();
            for flow_id in &el.outgoing_flow_ids {
                let Some(flow) = self.bpmn.sequence_flow(flow_id) else { continue };
                if self
                    .bpmn
                    .element(&flow.target_ref)
                    .map(|t| t.has_marking(MarkingType::SPlus, &gw_id))
                    .unwrap_or(false)
                {
                    s_plus_targets.push(flow.target_ref.clone());
                }
            }
            for i in 0..s_plus_targets.len() {
                for j in (i + 1)..s_plus_targets.len() {
                    self.dcr
                        .add_relation(s_plus_targets[i].clone(), s_plus_targets[j].clone(), RelationKind::Exclusion);
                    self.dcr
                        .add_relation(s_plus_targets[j].clone(), s_plus_targets[i].clone(), RelationKind::Exclusion);
                }
            }
        }
    }

    /// §4.3.5 — parallel split/join rules.
    fn parallel_gateway_mapping(&mut self) {
        for gw_id in self.bpmn.element_ids_sorted() {
            let el = self.bpmn.element(&gw_id).unwrap();
            if el.kind != ElementKind::ParallelGateway {
                continue;
            }
            match el.direction {
                Some(GatewayDirection::Split) => {
                    if let Some(paired) = el.paired_gateway_id.clone() {
                        self.dcr.add_relation(gw_id.clone(), paired, RelationKind::Response);
                    }
                }
                Some(GatewayDirection::Join) => {
                    for flow_id in el.incoming_flow_ids.clone() {
                        let Some(flow) = self.bpmn.sequence_flow(&flow_id) else { continue };
                        let predecessor_id = flow.source_ref.clone();
                        let carries_j_minus = self
                            .bpmn
                            .element(&predecessor_id)
                            .map(|p| p.has_marking(MarkingType::JMinus, &gw_id))
                            .unwrap_or(false);
                        if !carries_j_minus {
                            continue;
                        }
                        let Some(l_event) = self.get_or_create_parallel_state_event(&predecessor_id, &gw_id) else {
                            continue;
                        };
                        self.dcr.add_relation(predecessor_id.clone(), l_event.clone(), RelationKind::Exclusion);
                        self.dcr.add_relation(l_event, gw_id.clone(), RelationKind::Condition);
                        self.dcr.add_relation(predecessor_id, gw_id.clone(), RelationKind::Inclusion);
                    }
                }
                _ => {}
            }
        }
    }

    /// §4.3.6 — inclusive split/join rules with expression and state events.
    fn inclusive_gateway_mapping(&mut self) {
        for gw_id in self.bpmn.element_ids_sorted() {
            let el = self.bpmn.element(&gw_id).unwrap();
            if el.kind != ElementKind::InclusiveGateway {
                continue;
            }
            let paired = el.paired_gateway_id.clone();

            match el.direction {
                Some(GatewayDirection::Split) => {
                    if let Some(paired_id) = &paired {
                        self.dcr.add_relation(gw_id.clone(), paired_id.clone(), RelationKind::Response);
                    }
                    for flow_id in el.outgoing_flow_ids.clone() {
                        let Some(flow) = self.bpmn.sequence_flow(&flow_id) else { continue };
                        let target_id = flow.target_ref.clone();
                        let carries_s_plus = self
                            .bpmn
                            .element(&target_id)
                            .map(|t| t.has_marking(MarkingType::SPlus, &gw_id))
                            .unwrap_or(false);
                        if !carries_s_plus {
                            continue;
                        }
                        let expression = flow.expression.clone();
                        let flow_name = flow.name.clone();
                        let Some(x_event) = self.get_or_create_expression_event(expression.as_deref(), &flow_id, &flow_name) else {
                            continue;
                        };
                        self.dcr.add_relation(gw_id.clone(), x_event.clone(), RelationKind::Response);
                        self.dcr.add_relation(gw_id.clone(), x_event.clone(), RelationKind::Inclusion);
                        self.dcr.add_relation(x_event.clone(), target_id.clone(), RelationKind::Response);
                        self.dcr.add_relation(x_event, target_id, RelationKind::Inclusion);
                    }
                }
                Some(GatewayDirection::Join) => {
                    for flow_id in el.incoming_flow_ids.clone() {
                        let Some(flow) = self.bpmn.sequence_flow(&flow_id) else { continue };
                        let jn_minus_id = flow.source_ref.clone();
                        let Some(jn_minus) = self.bpmn.element(&jn_minus_id) else { continue };

                        let carries_j_minus = jn_minus.has_marking(MarkingType::JMinus, &gw_id);
                        let origin_flow_id = jn_minus.inclusive_path_origin_flow_id.clone();

                        let n_event = if carries_j_minus {
                            self.get_or_create_inclusive_state_event(&jn_minus_id, &gw_id)
                        } else {
                            None
                        };

                        if let Some(n_event) = &n_event {
                            self.dcr.add_relation(jn_minus_id.clone(), n_event.clone(), RelationKind::Exclusion);
                            self.dcr.add_relation(n_event.clone(), gw_id.clone(), RelationKind::Condition);
                            self.dcr.add_relation(jn_minus_id.clone(), gw_id.clone(), RelationKind::Inclusion);
                        }

                        let x_origin = origin_flow_id.as_deref().and_then(|origin_flow_id| {
                            let flow = self.bpmn.sequence_flow(origin_flow_id)?;
                            let expression = flow.expression.clone();
                            let flow_name = flow.name.clone();
                            self.get_or_create_expression_event(expression.as_deref(), origin_flow_id, &flow_name)
                        });

                        if let Some(x_origin) = x_origin {
                            if let Some(n_event) = &n_event {
                                self.dcr.add_relation(x_origin.clone(), n_event.clone(), RelationKind::Inclusion);
                            }
                            self.dcr.add_relation(gw_id.clone(), x_origin, RelationKind::Exclusion);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn get_or_create_helper_event(
        &mut self,
        id: String,
        label: String,
        initial_marking: HashSet<EventMarking>,
    ) -> Option<String> {
        let is_new = !self.dcr.has_event(&id);
        self.dcr.add_event(id.clone(), label, initial_marking).ok()?;
        if is_new {
            self.dcr.add_relation(id.clone(), id.clone(), RelationKind::Exclusion);
        }
        Some(id)
    }

    /// §4.3.2 — one expression event per unique (flow-id, expression-text).
    fn get_or_create_expression_event(&mut self, expression: Option<&str>, flow_id: &str, flow_name: &str) -> Option<String> {
        let stripped = expression.map(str::trim).filter(|s| !s.is_empty());
        let (label, unique_part) = match stripped {
            Some(expr) => (expr.to_string(), expr.to_string()),
            None => {
                let label = if !flow_name.is_empty() {
                    format!("[[Expression]]\n{flow_name}")
                } else {
                    format!("[[Expr ID]]\n{flow_id}")
                };
                (label, format!("empty_on_{flow_id}"))
            }
        };
        let id = expression_event_id(flow_id, &unique_part);
        self.get_or_create_helper_event(id, label, HashSet::new())
    }

    /// §4.3.2 — one parallel state event per (predecessor, join) pair.
    fn get_or_create_parallel_state_event(&mut self, predecessor_id: &str, gateway_id: &str) -> Option<String> {
        let i = self.parallel_state_counter;
        self.parallel_state_counter += 1;
        let id = format!("l_state_jn_{predecessor_id}_{i}");
        let base_label = format!("{DECORATIVE_MARKER}\nParallelState {i}");
        let label = match self.gateway_pair_suffixes.get(gateway_id) {
            Some(suffix) => format!("{base_label}\n{suffix}"),
            None => base_label,
        };
        self.get_or_create_helper_event(id, label, [EventMarking::Included].into_iter().collect())
    }

    /// §4.3.2 — one inclusive state event per (predecessor, join) pair.
    fn get_or_create_inclusive_state_event(&mut self, predecessor_id: &str, gateway_id: &str) -> Option<String> {
        let i = self.inclusive_state_counter;
        self.inclusive_state_counter += 1;
        let id = format!("n_state_jn_{predecessor_id}_{i}");
        let base_label = format!("{DECORATIVE_MARKER}\nInclusiveState {i}");
        let label = match self.gateway_pair_suffixes.get(gateway_id) {
            Some(suffix) => format!("{base_label}\n{suffix}"),
            None => base_label,
        };
        self.get_or_create_helper_event(id, label, HashSet::new())
    }
}

/// §4.3.2 — decorative marker prefixed onto every state-event label, matching
/// the reference's `_get_or_create_parallel_state_event`/
/// `_get_or_create_inclusive_state_event`.
const DECORATIVE_MARKER: &str = "✖✖✖✖✖✖✖✖\n✖✖✖✖✖✖✖✖";

/// §4.3.1 — "[Pair N]" suffixes, assigned only to true SESE pairs. Loop
/// pairs (§8 scenario 5: "no '[Pair N]' assigned to the loop pair") are
/// deliberately excluded, unlike the reference implementation's
/// `_assign_gateway_pair_suffixes`, which assigns a suffix to every paired
/// split/join gateway regardless of `loop_type`.
fn assign_gateway_pair_suffixes(graph: &BpmnGraph) -> HashMap<String, String> {
    let mut suffixes = HashMap::new();
    let mut processed: HashSet<String> = HashSet::new();
    let mut counter: u32 = 1;

    let mut candidate_ids: Vec<String> = graph
        .elements()
        .filter(|el| el.kind.is_gateway() && el.paired_gateway_id.is_some() && el.loop_type.is_none())
        .map(|el| el.id.clone())
        .collect();
    candidate_ids.sort();

    for id in candidate_ids {
        if processed.contains(&id) {
            continue;
        }
        let paired_id = graph.element(&id).unwrap().paired_gateway_id.clone().unwrap();
        if processed.contains(&paired_id) {
            continue;
        }
        let suffix = format!("[Pair {counter}]");
        suffixes.insert(id.clone(), suffix.clone());
        suffixes.insert(paired_id.clone(), suffix);
        processed.insert(id);
        processed.insert(paired_id);
        counter += 1;
    }

    suffixes
}

/// Content-hash id for expression events: "expr_" + 8 hex digits of
/// SHA-256(flow_id + "_" + unique_part), the same truncated-digest idiom
/// `authoring/export_bpmn.rs::short_hash` uses for deterministic BPMN DI ids.
fn expression_event_id(flow_id: &str, unique_part: &str) -> String {
    let content = format!("{flow_id}_{unique_part}");
    let digest = Sha256::digest(content.as_bytes());
    format!("expr_{:02x}{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2], digest[3])
}
