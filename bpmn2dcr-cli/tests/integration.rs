//! End-to-end coverage of the six concrete scenarios, driving the full
//! parse → pair → precondition → translate pipeline from BPMN XML text,
//! replacing the teacher's gRPC `integration.rs` (no server surface here).

use bpmn2dcr_core::model::RelationKind;
use bpmn2dcr_core::{translate, xml, Diagnostic};

fn run(bpmn_xml: &str) -> bpmn2dcr_core::DcrGraph {
    let graph = xml::parse_bpmn_xml(bpmn_xml).expect("xml should parse");
    translate::translate(graph).expect("translation should succeed")
}

#[test]
fn minimal_sequence() {
    let dcr = run(
        r#"
        <definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
          <process id="p1">
            <startEvent id="SE" />
            <task id="T" name="Task" />
            <endEvent id="EE" />
            <sequenceFlow id="f1" sourceRef="SE" targetRef="T" />
            <sequenceFlow id="f2" sourceRef="T" targetRef="EE" />
          </process>
        </definitions>
        "#,
    );

    assert_eq!(dcr.event_count(), 3);
    assert!(dcr.has_relation("SE", "T", RelationKind::Response));
    assert!(dcr.has_relation("SE", "T", RelationKind::Inclusion));
    assert!(dcr.has_relation("T", "EE", RelationKind::Response));
    assert!(dcr.has_relation("T", "EE", RelationKind::Inclusion));
}

#[test]
fn exclusive_split_join() {
    let dcr = run(
        r#"
        <definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
          <process id="p1">
            <startEvent id="SE" />
            <exclusiveGateway id="X1" />
            <task id="A" />
            <task id="B" />
            <exclusiveGateway id="X2" />
            <endEvent id="EE" />
            <sequenceFlow id="f1" sourceRef="SE" targetRef="X1" />
            <sequenceFlow id="f2" sourceRef="X1" targetRef="A" />
            <sequenceFlow id="f3" sourceRef="X1" targetRef="B" />
            <sequenceFlow id="f4" sourceRef="A" targetRef="X2" />
            <sequenceFlow id="f5" sourceRef="B" targetRef="X2" />
            <sequenceFlow id="f6" sourceRef="X2" targetRef="EE" />
          </process>
        </definitions>
        "#,
    );

    assert!(dcr.has_relation("A", "B", RelationKind::Exclusion));
    assert!(dcr.has_relation("B", "A", RelationKind::Exclusion));
    assert!(!dcr.has_relation("SE", "A", RelationKind::Response));
    assert!(!dcr.has_relation("SE", "B", RelationKind::Response));
}

#[test]
fn parallel_synchronization() {
    let dcr = run(
        r#"
        <definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
          <process id="p1">
            <startEvent id="SE" />
            <parallelGateway id="P1" />
            <task id="A" />
            <task id="B" />
            <parallelGateway id="P2" />
            <endEvent id="EE" />
            <sequenceFlow id="f1" sourceRef="SE" targetRef="P1" />
            <sequenceFlow id="f2" sourceRef="P1" targetRef="A" />
            <sequenceFlow id="f3" sourceRef="P1" targetRef="B" />
            <sequenceFlow id="f4" sourceRef="A" targetRef="P2" />
            <sequenceFlow id="f5" sourceRef="B" targetRef="P2" />
            <sequenceFlow id="f6" sourceRef="P2" targetRef="EE" />
          </process>
        </definitions>
        "#,
    );

    assert!(dcr.has_relation("P1", "P2", RelationKind::Response));
    let l_a = dcr.events().find(|e| e.id.starts_with("l_state_jn_A_")).expect("L_A exists").id.clone();
    let l_b = dcr.events().find(|e| e.id.starts_with("l_state_jn_B_")).expect("L_B exists").id.clone();
    assert!(dcr.has_relation("A", &l_a, RelationKind::Exclusion));
    assert!(dcr.has_relation(&l_a, "P2", RelationKind::Condition));
    assert!(dcr.has_relation("A", "P2", RelationKind::Inclusion));
    assert!(dcr.has_relation("B", &l_b, RelationKind::Exclusion));
    assert!(dcr.has_relation(&l_b, "P2", RelationKind::Condition));
    assert!(dcr.has_relation("B", "P2", RelationKind::Inclusion));
}

#[test]
fn inclusive_with_guards() {
    let dcr = run(
        r#"
        <definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
          <process id="p1">
            <startEvent id="SE" />
            <inclusiveGateway id="I1" />
            <task id="A" />
            <task id="B" />
            <inclusiveGateway id="I2" />
            <endEvent id="EE" />
            <sequenceFlow id="f1" sourceRef="SE" targetRef="I1" />
            <sequenceFlow id="fA" sourceRef="I1" targetRef="A">
              <conditionExpression>x&gt;0</conditionExpression>
            </sequenceFlow>
            <sequenceFlow id="fB" sourceRef="I1" targetRef="B">
              <conditionExpression>y&gt;0</conditionExpression>
            </sequenceFlow>
            <sequenceFlow id="f4" sourceRef="A" targetRef="I2" />
            <sequenceFlow id="f5" sourceRef="B" targetRef="I2" />
            <sequenceFlow id="f6" sourceRef="I2" targetRef="EE" />
          </process>
        </definitions>
        "#,
    );

    let x_a = dcr.events().find(|e| e.id.starts_with("expr_")).expect("an expression event exists").id.clone();
    assert!(dcr.has_relation("I1", &x_a, RelationKind::Response) || dcr.has_relation("I1", &x_a, RelationKind::Inclusion));

    let n_a = dcr.events().find(|e| e.id.starts_with("n_state_jn_A_")).expect("N_A exists").id.clone();
    assert!(dcr.has_relation("A", &n_a, RelationKind::Exclusion));
    assert!(dcr.has_relation(&n_a, "I2", RelationKind::Condition));
    assert!(dcr.has_relation("A", "I2", RelationKind::Inclusion));
}

#[test]
fn do_while_loop() {
    let dcr = run(
        r#"
        <definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
          <process id="p1">
            <startEvent id="SE" />
            <exclusiveGateway id="J" />
            <task id="T" name="Body" />
            <exclusiveGateway id="S" />
            <endEvent id="EE" />
            <sequenceFlow id="f1" sourceRef="SE" targetRef="J" />
            <sequenceFlow id="f2" sourceRef="J" targetRef="T" />
            <sequenceFlow id="f3" sourceRef="T" targetRef="S" />
            <sequenceFlow id="f4" sourceRef="S" targetRef="J" />
            <sequenceFlow id="f5" sourceRef="S" targetRef="EE" />
          </process>
        </definitions>
        "#,
    );

    assert!(!dcr.event("J").unwrap().label.contains("Pair"));
    assert!(!dcr.event("S").unwrap().label.contains("Pair"));
}

#[test]
fn precondition_failure_reports_and_aborts() {
    let graph = xml::parse_bpmn_xml(
        r#"
        <definitions xmlns="http://www.omg.org/spec/BPMN/20100524/MODEL">
          <process id="p1">
            <startEvent id="SE1" />
            <startEvent id="SE2" />
            <endEvent id="EE" />
            <sequenceFlow id="f1" sourceRef="SE1" targetRef="EE" />
          </process>
        </definitions>
        "#,
    )
    .unwrap();

    let err = translate::translate(graph).unwrap_err();
    match err {
        Diagnostic::PreconditionError(lines) => {
            assert!(lines.iter().any(|l| l == "● Expected 1 Start Event, found 2."));
        }
        other => panic!("expected PreconditionError, got {other:?}"),
    }
}
