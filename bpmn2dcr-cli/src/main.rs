use std::fs;
use std::process::ExitCode;

use bpmn2dcr_core::{translate_xml, Diagnostic};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let dump_json = args.iter().any(|a| a == "--dump-json");
    let positional: Vec<&String> = args.iter().skip(1).filter(|a| !a.starts_with("--")).collect();

    let Some(input_path) = positional.first() else {
        eprintln!("usage: bpmn2dcr <input.bpmn> [output.dcr.xml] [--dump-json]");
        return ExitCode::FAILURE;
    };
    let output_path = positional.get(1);

    tracing::info!(input = %input_path, "reading BPMN input");
    let bpmn_xml = match fs::read_to_string(input_path) {
        Ok(contents) => contents,
        Err(e) => {
            report(&Diagnostic::LoadError(format!("could not read '{input_path}': {e}")));
            return ExitCode::FAILURE;
        }
    };

    match run(&bpmn_xml, dump_json) {
        Ok(dcr_xml) => match output_path {
            Some(path) => match fs::write(path, &dcr_xml) {
                Ok(()) => {
                    tracing::info!(output = %path, "wrote DCR XML");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    report(&Diagnostic::ExportError(format!("could not write '{path}': {e}")));
                    ExitCode::FAILURE
                }
            },
            None => {
                println!("{dcr_xml}");
                ExitCode::SUCCESS
            }
        },
        Err(diag) => {
            tracing::warn!(%diag, "translation failed");
            report(&diag);
            ExitCode::FAILURE
        }
    }
}

fn run(bpmn_xml: &str, dump_json: bool) -> Result<String, Diagnostic> {
    if dump_json {
        let graph = bpmn2dcr_core::xml::parse_bpmn_xml(bpmn_xml)
            .map_err(|e| Diagnostic::LoadError(e.to_string()))?;
        let dcr = bpmn2dcr_core::translate::translate(graph)?;
        if let Ok(json) = serde_json::to_string_pretty(&dump_events(&dcr)) {
            eprintln!("{json}");
        }
        return Ok(bpmn2dcr_core::xml::write_dcr_xml(&dcr));
    }

    translate_xml(bpmn_xml)
}

fn dump_events(dcr: &bpmn2dcr_core::DcrGraph) -> serde_json::Value {
    serde_json::json!({
        "events": dcr.events().map(|e| serde_json::json!({
            "id": e.id,
            "label": e.label,
        })).collect::<Vec<_>>(),
        "relations": dcr.relations().iter().map(|r| serde_json::json!({
            "source": r.source_id,
            "target": r.target_id,
            "kind": r.kind.as_str(),
        })).collect::<Vec<_>>(),
    })
}

fn report(diag: &Diagnostic) {
    eprintln!("{diag}");
}
