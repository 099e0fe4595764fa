//! DCR XML writer (C6, §6.2). Builds the `<dcrgraph>` document by
//! `writeln!`-ing into a `String`, the same template idiom
//! `authoring/export_bpmn.rs::dto_to_bpmn_xml` uses rather than a streaming
//! writer API.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::model::{DcrGraph, EventMarking, RelationKind};

/// Serializes a `DcrGraph` to pretty-printed DCR XML with an XML
/// declaration (§6.2). Each relation is assigned a `Relation_NNNNNNN` id
/// (zero-padded to 7 digits) in emission order.
pub fn write_dcr_xml(dcr: &DcrGraph) -> String {
    let mut xml = String::new();

    writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#).unwrap();
    writeln!(xml, r#"<dcrgraph>"#).unwrap();
    writeln!(xml, r#"  <specification>"#).unwrap();
    write_resources(&mut xml, dcr);
    write_constraints(&mut xml, dcr);
    writeln!(xml, r#"  </specification>"#).unwrap();
    write_runtime(&mut xml, dcr);
    writeln!(xml, r#"</dcrgraph>"#).unwrap();

    xml
}

fn write_resources(xml: &mut String, dcr: &DcrGraph) {
    writeln!(xml, r#"    <resources>"#).unwrap();

    writeln!(xml, r#"      <events>"#).unwrap();
    for event in dcr.events() {
        writeln!(xml, r#"        <event id="{}">"#, xml_escape(&event.id)).unwrap();
        writeln!(xml, r#"          <custom>"#).unwrap();
        writeln!(xml, r#"            <visualization>"#).unwrap();
        writeln!(xml, r#"              <location xLoc="0" yLoc="0" />"#).unwrap();
        writeln!(xml, r#"              <size width="130" height="150" />"#).unwrap();
        writeln!(xml, r#"            </visualization>"#).unwrap();
        writeln!(xml, r#"          </custom>"#).unwrap();
        writeln!(xml, r#"        </event>"#).unwrap();
    }
    writeln!(xml, r#"      </events>"#).unwrap();

    writeln!(xml, r#"      <subProcesses />"#).unwrap();

    let mut labels: BTreeSet<String> = BTreeSet::new();
    for event in dcr.events() {
        labels.insert(event.label.clone());
    }
    writeln!(xml, r#"      <labels>"#).unwrap();
    for label in &labels {
        writeln!(xml, r#"        <label id="{}" />"#, xml_escape(label)).unwrap();
    }
    writeln!(xml, r#"      </labels>"#).unwrap();

    writeln!(xml, r#"      <labelMappings>"#).unwrap();
    for event in dcr.events() {
        writeln!(
            xml,
            r#"        <labelMapping eventId="{}" labelId="{}" />"#,
            xml_escape(&event.id),
            xml_escape(&event.label)
        )
        .unwrap();
    }
    writeln!(xml, r#"      </labelMappings>"#).unwrap();

    writeln!(xml, r#"      <variables />"#).unwrap();
    writeln!(xml, r#"      <expressions />"#).unwrap();
    writeln!(xml, r#"      <variableAccesses>"#).unwrap();
    writeln!(xml, r#"        <readAccessess />"#).unwrap();
    writeln!(xml, r#"        <writeAccessess />"#).unwrap();
    writeln!(xml, r#"      </variableAccesses>"#).unwrap();

    writeln!(xml, r#"    </resources>"#).unwrap();
}

fn relation_tag(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::Condition => "condition",
        RelationKind::Response => "response",
        RelationKind::Inclusion => "include",
        RelationKind::Exclusion => "exclude",
        RelationKind::Milestone => "milestone",
    }
}

fn relation_group(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::Condition => "conditions",
        RelationKind::Response => "responses",
        RelationKind::Inclusion => "includes",
        RelationKind::Exclusion => "excludes",
        RelationKind::Milestone => "milestones",
    }
}

fn write_constraints(xml: &mut String, dcr: &DcrGraph) {
    writeln!(xml, r#"    <constraints>"#).unwrap();

    let mut counter: u32 = 1;
    for group in [
        RelationKind::Condition,
        RelationKind::Response,
        RelationKind::Inclusion,
        RelationKind::Exclusion,
        RelationKind::Milestone,
    ] {
        writeln!(xml, r#"      <{}>"#, relation_group(group)).unwrap();
        for relation in dcr.relations().iter().filter(|r| r.kind == group) {
            let relation_id = format!("Relation_{counter:07}");
            counter += 1;
            writeln!(
                xml,
                r#"        <{} sourceId="{}" targetId="{}">"#,
                relation_tag(group),
                xml_escape(&relation.source_id),
                xml_escape(&relation.target_id)
            )
            .unwrap();
            writeln!(xml, r#"          <custom>"#).unwrap();
            writeln!(xml, r#"            <waypoints />"#).unwrap();
            writeln!(xml, r#"            <id id="{relation_id}" />"#).unwrap();
            writeln!(xml, r#"          </custom>"#).unwrap();
            writeln!(xml, r#"        </{}>"#, relation_tag(group)).unwrap();
        }
        writeln!(xml, r#"      </{}>"#, relation_group(group)).unwrap();
    }

    writeln!(xml, r#"      <coresponces />"#).unwrap();
    writeln!(xml, r#"      <updates />"#).unwrap();
    writeln!(xml, r#"      <spawns />"#).unwrap();

    writeln!(xml, r#"    </constraints>"#).unwrap();
}

fn write_runtime(xml: &mut String, dcr: &DcrGraph) {
    writeln!(xml, r#"  <runtime>"#).unwrap();
    writeln!(xml, r#"    <marking>"#).unwrap();
    writeln!(xml, r#"      <globalStore />"#).unwrap();

    write_marking_group(xml, dcr, "executed", EventMarking::Executed);
    write_marking_group(xml, dcr, "included", EventMarking::Included);
    write_marking_group(xml, dcr, "pendingResponses", EventMarking::Pending);

    writeln!(xml, r#"    </marking>"#).unwrap();
    writeln!(xml, r#"  </runtime>"#).unwrap();
}

fn write_marking_group(xml: &mut String, dcr: &DcrGraph, tag: &str, letter: EventMarking) {
    writeln!(xml, r#"      <{tag}>"#).unwrap();
    for event in dcr.events() {
        if event.initial_marking.contains(&letter) {
            writeln!(xml, r#"        <event id="{}" />"#, xml_escape(&event.id)).unwrap();
        }
    }
    writeln!(xml, r#"      </{tag}>"#).unwrap();
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
