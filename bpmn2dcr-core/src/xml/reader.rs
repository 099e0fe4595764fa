//! BPMN XML reader (C6, §6.1). Namespace-tolerant: accepts both prefixed
//! (`bpmn:startEvent`) and default-namespace (`startEvent`) element names,
//! the same local-name matching `compiler/parser.rs` uses for its BPMN
//! import.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::model::{BpmnGraph, Element, ElementKind, SequenceFlow};

struct RawFlow {
    id: String,
    name: String,
    source_ref: String,
    target_ref: String,
    expression: Option<String>,
}

struct CurrentFlow {
    id: String,
    name: String,
    source_ref: String,
    target_ref: String,
    expression: Option<String>,
}

/// Parses a BPMN 2.0 XML document into a `BpmnGraph` (§6.1). Collapses every
/// task variant (task, userTask, serviceTask, scriptTask, manualTask,
/// businessRuleTask, sendTask, receiveTask) to `ElementKind::Task`; ignores
/// unknown child kinds.
pub fn parse_bpmn_xml(xml: &str) -> Result<BpmnGraph> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut graph = BpmnGraph::new();
    let mut in_process = false;
    let mut flows: Vec<RawFlow> = Vec::new();
    let mut in_condition_expression = false;
    let mut current_flow: Option<CurrentFlow> = None;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                handle_tag(e, false, &mut graph, &mut in_process, &mut flows, &mut in_condition_expression, &mut current_flow)?;
            }
            Ok(Event::Empty(ref e)) => {
                handle_tag(e, true, &mut graph, &mut in_process, &mut flows, &mut in_condition_expression, &mut current_flow)?;
            }
            Ok(Event::End(ref e)) => {
                let local = local_name(e.name().as_ref());
                match local.as_str() {
                    "conditionExpression" => in_condition_expression = false,
                    "sequenceFlow" => {
                        if let Some(flow) = current_flow.take() {
                            flows.push(RawFlow {
                                id: flow.id,
                                name: flow.name,
                                source_ref: flow.source_ref,
                                target_ref: flow.target_ref,
                                expression: flow.expression,
                            });
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_condition_expression {
                    if let Ok(text) = e.unescape() {
                        let text = text.trim().to_string();
                        if !text.is_empty() {
                            if let Some(flow) = current_flow.as_mut() {
                                flow.expression = Some(text);
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    if !in_process {
        return Err(anyhow!("<process> element not found"));
    }

    for flow in flows {
        if !graph.contains_element(&flow.source_ref) || !graph.contains_element(&flow.target_ref) {
            return Err(anyhow!(
                "sequenceFlow '{}' references an unknown source or target id",
                flow.id
            ));
        }
        graph.add_sequence_flow(SequenceFlow {
            id: flow.id,
            name: flow.name,
            source_ref: flow.source_ref,
            target_ref: flow.target_ref,
            expression: flow.expression,
        })?;
    }

    Ok(graph)
}

#[allow(clippy::too_many_arguments)]
fn handle_tag(
    e: &BytesStart,
    is_empty: bool,
    graph: &mut BpmnGraph,
    in_process: &mut bool,
    flows: &mut Vec<RawFlow>,
    in_condition_expression: &mut bool,
    current_flow: &mut Option<CurrentFlow>,
) -> Result<()> {
    let local = local_name(e.name().as_ref());

    let kind = match local.as_str() {
        "task" | "userTask" | "serviceTask" | "scriptTask" | "manualTask" | "businessRuleTask"
        | "sendTask" | "receiveTask" => Some(ElementKind::Task),
        "startEvent" => Some(ElementKind::StartEvent),
        "endEvent" => Some(ElementKind::EndEvent),
        "parallelGateway" => Some(ElementKind::ParallelGateway),
        "exclusiveGateway" => Some(ElementKind::ExclusiveGateway),
        "inclusiveGateway" => Some(ElementKind::InclusiveGateway),
        "complexGateway" => Some(ElementKind::ComplexGateway),
        "eventBasedGateway" => Some(ElementKind::EventBasedGateway),
        _ => None,
    };

    if local == "process" {
        *in_process = true;
        return Ok(());
    }

    if let Some(kind) = kind {
        if !*in_process {
            return Ok(());
        }
        let id = get_attr(e, "id")?;
        let name = get_attr_opt(e, "name").unwrap_or_default();
        graph.add_element(Element::new(id, name, kind));
        return Ok(());
    }

    if local == "sequenceFlow" && *in_process {
        let id = get_attr(e, "id")?;
        let name = get_attr_opt(e, "name").unwrap_or_default();
        let source_ref = get_attr(e, "sourceRef")?;
        let target_ref = get_attr(e, "targetRef")?;
        if is_empty {
            flows.push(RawFlow { id, name, source_ref, target_ref, expression: None });
        } else {
            *current_flow = Some(CurrentFlow { id, name, source_ref, target_ref, expression: None });
        }
        return Ok(());
    }

    if local == "conditionExpression" {
        *in_condition_expression = true;
    }

    Ok(())
}

fn local_name(name: &[u8]) -> String {
    let s = std::str::from_utf8(name).unwrap_or("");
    match s.rfind(':') {
        Some(pos) => s[pos + 1..].to_string(),
        None => s.to_string(),
    }
}

fn get_attr(e: &BytesStart, name: &str) -> Result<String> {
    for attr in e.attributes().flatten() {
        if local_name(attr.key.as_ref()) == name {
            return Ok(attr.unescape_value()?.to_string());
        }
    }
    Err(anyhow!("missing required attribute '{name}' on <{}>", local_name(e.name().as_ref())))
}

fn get_attr_opt(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if local_name(attr.key.as_ref()) == name {
            return attr.unescape_value().ok().map(|v| v.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_sequence_with_default_namespace() {
        let xml = r#"
            <definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
              <process id="p1">
                <startEvent id="SE" />
                <task id="T" name="Do the thing" />
                <endEvent id="EE" />
                <sequenceFlow id="f1" sourceRef="SE" targetRef="T" />
                <sequenceFlow id="f2" sourceRef="T" targetRef="EE" />
              </process>
            </definitions>
        "#;

        let graph = parse_bpmn_xml(xml).unwrap();
        assert_eq!(graph.element("SE").unwrap().kind, ElementKind::StartEvent);
        assert_eq!(graph.element("T").unwrap().name, "Do the thing");
        assert_eq!(graph.successors("SE"), vec!["T".to_string()]);
    }

    #[test]
    fn captures_nested_condition_expression_text() {
        let xml = r#"
            <definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
              <process id="p1">
                <startEvent id="SE" />
                <exclusiveGateway id="X" />
                <task id="A" />
                <task id="B" />
                <endEvent id="EE" />
                <sequenceFlow id="f1" sourceRef="SE" targetRef="X" />
                <sequenceFlow id="fA" sourceRef="X" targetRef="A">
                  <conditionExpression>x &gt; 0</conditionExpression>
                </sequenceFlow>
                <sequenceFlow id="fB" sourceRef="X" targetRef="B" />
                <sequenceFlow id="f4" sourceRef="A" targetRef="EE" />
                <sequenceFlow id="f5" sourceRef="B" targetRef="EE" />
              </process>
            </definitions>
        "#;

        let graph = parse_bpmn_xml(xml).unwrap();
        assert_eq!(graph.sequence_flow("fA").unwrap().expression.as_deref(), Some("x > 0"));
        assert_eq!(graph.sequence_flow("fB").unwrap().expression, None);
    }

    #[test]
    fn accepts_bpmn_prefixed_element_names() {
        let xml = r#"
            <bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL">
              <bpmn:process id="p1">
                <bpmn:startEvent id="SE" />
                <bpmn:userTask id="T" name="Review" />
                <bpmn:endEvent id="EE" />
                <bpmn:sequenceFlow id="f1" sourceRef="SE" targetRef="T" />
                <bpmn:sequenceFlow id="f2" sourceRef="T" targetRef="EE" />
              </bpmn:process>
            </bpmn:definitions>
        "#;

        let graph = parse_bpmn_xml(xml).unwrap();
        assert_eq!(graph.element("T").unwrap().kind, ElementKind::Task);
    }

    #[test]
    fn missing_process_element_is_an_error() {
        let xml = r#"<definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL"></definitions>"#;
        assert!(parse_bpmn_xml(xml).is_err());
    }

    #[test]
    fn sequence_flow_with_unknown_endpoint_is_an_error() {
        let xml = r#"
            <definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
              <process id="p1">
                <startEvent id="SE" />
                <endEvent id="EE" />
                <sequenceFlow id="f1" sourceRef="SE" targetRef="ghost" />
              </process>
            </definitions>
        "#;
        assert!(parse_bpmn_xml(xml).is_err());
    }
}
