//! Marking populator (C4, §4.2): attaches S+/S−/J+/J− markings to the
//! elements adjacent to each paired or looped gateway.

use crate::model::{BpmnGraph, GatewayDirection, MarkingType};

/// For every paired (or looped) gateway, mark its incident flows' endpoints
/// per §4.2. Markings are additive; duplicates collapse inside
/// `Element::add_marking`.
pub fn populate_markings(graph: &mut BpmnGraph) {
    let gateway_ids = graph.element_ids_sorted();
    for gateway_id in gateway_ids {
        let (direction, incoming, outgoing) = {
            let Some(el) = graph.element(&gateway_id) else {
                continue;
            };
            if !el.kind.is_gateway() || !el.is_paired_or_looped() {
                continue;
            }
            let Some(direction) = el.direction else {
                continue;
            };
            (direction, el.incoming_flow_ids.clone(), el.outgoing_flow_ids.clone())
        };

        match direction {
            GatewayDirection::Split => {
                for flow_id in &incoming {
                    if let Some(source) = graph.sequence_flow(flow_id).map(|f| f.source_ref.clone()) {
                        if let Some(el) = graph.element_mut(&source) {
                            el.add_marking(MarkingType::SMinus, gateway_id.clone());
                        }
                    }
                }
                for flow_id in &outgoing {
                    if let Some(target) = graph.sequence_flow(flow_id).map(|f| f.target_ref.clone()) {
                        if let Some(el) = graph.element_mut(&target) {
                            el.add_marking(MarkingType::SPlus, gateway_id.clone());
                        }
                    }
                }
            }
            GatewayDirection::Join => {
                for flow_id in &incoming {
                    if let Some(source) = graph.sequence_flow(flow_id).map(|f| f.source_ref.clone()) {
                        if let Some(el) = graph.element_mut(&source) {
                            el.add_marking(MarkingType::JMinus, gateway_id.clone());
                        }
                    }
                }
                for flow_id in &outgoing {
                    if let Some(target) = graph.sequence_flow(flow_id).map(|f| f.target_ref.clone()) {
                        if let Some(el) = graph.element_mut(&target) {
                            el.add_marking(MarkingType::JPlus, gateway_id.clone());
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::pair_gateways;
    use crate::model::{BpmnGraph, Element, ElementKind, SequenceFlow};

    fn flow(id: &str, from: &str, to: &str) -> SequenceFlow {
        SequenceFlow {
            id: id.to_string(),
            name: String::new(),
            source_ref: from.to_string(),
            target_ref: to.to_string(),
            expression: None,
        }
    }

    #[test]
    fn split_markings_attach_to_predecessor_and_successors() {
        let mut g = BpmnGraph::new();
        g.add_element(Element::new("SE", "", ElementKind::StartEvent));
        g.add_element(Element::new("X1", "", ElementKind::ExclusiveGateway));
        g.add_element(Element::new("A", "", ElementKind::Task));
        g.add_element(Element::new("B", "", ElementKind::Task));
        g.add_element(Element::new("X2", "", ElementKind::ExclusiveGateway));
        g.add_element(Element::new("EE", "", ElementKind::EndEvent));
        g.add_sequence_flow(flow("f1", "SE", "X1")).unwrap();
        g.add_sequence_flow(flow("f2", "X1", "A")).unwrap();
        g.add_sequence_flow(flow("f3", "X1", "B")).unwrap();
        g.add_sequence_flow(flow("f4", "A", "X2")).unwrap();
        g.add_sequence_flow(flow("f5", "B", "X2")).unwrap();
        g.add_sequence_flow(flow("f6", "X2", "EE")).unwrap();

        pair_gateways(&mut g);
        populate_markings(&mut g);

        assert!(g.element("SE").unwrap().has_marking(MarkingType::SMinus, "X1"));
        assert!(g.element("A").unwrap().has_marking(MarkingType::SPlus, "X1"));
        assert!(g.element("B").unwrap().has_marking(MarkingType::SPlus, "X1"));
        assert!(g.element("A").unwrap().has_marking(MarkingType::JMinus, "X2"));
        assert!(g.element("EE").unwrap().has_marking(MarkingType::JPlus, "X2"));
    }
}
