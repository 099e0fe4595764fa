pub mod bpmn;
pub mod dcr;

pub use bpmn::{
    BpmnGraph, BpmnMarking, Element, ElementKind, GatewayDirection, GatewayType, LoopType,
    MarkingType, SequenceFlow,
};
pub use dcr::{DcrEvent, DcrGraph, EventMarking, ModelError, Relation, RelationKind};
