//! BPMN-to-DCR translator core (§2). Owns the in-memory BPMN/DCR models
//! (C1/C2), the gateway analyzer (C3), the marking populator (C4), the
//! translation rules (C5), and the BPMN/DCR XML codec (C6).

pub mod analyzer;
pub mod error;
pub mod marking;
pub mod model;
pub mod translate;
pub mod xml;

pub use error::Diagnostic;
pub use model::{BpmnGraph, DcrGraph};

/// Translates BPMN 2.0 XML text into DCR XML text (§6.3), the single entry
/// point the CLI (and any other embedder) calls.
pub fn translate_xml(bpmn_xml: &str) -> Result<String, Diagnostic> {
    let span = tracing::info_span!("translate_xml");
    let _enter = span.enter();

    let graph = xml::parse_bpmn_xml(bpmn_xml).map_err(|e| Diagnostic::LoadError(e.to_string()))?;
    let dcr = translate::translate(graph)?;
    Ok(xml::write_dcr_xml(&dcr))
}
