//! Public diagnostic taxonomy for the translation entry point (§6.3, §7).
//!
//! Internal stages use `anyhow::Result` for ergonomic `?`-propagation, the
//! same split `compiler/verifier.rs` draws between its infallible `verify`
//! (returns a `Vec<VerifyError>`) and its `anyhow`-wrapping `verify_or_err`.
//! `Diagnostic` is the one seam where that internal error currency is
//! converted into the stable, machine-readable categories callers match on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Diagnostic {
    #[error("LOAD_ERROR: {0}")]
    LoadError(String),

    #[error("PAIR_GATEWAYS_ERROR: {0}")]
    PairGatewaysError(String),

    #[error("PRECONDITION_ERROR: BPMN precondition checks failed:\n{}", format_bullets(.0))]
    PreconditionError(Vec<String>),

    #[error("TRANSLATION_RULES_ERROR: {0}")]
    TranslationRulesError(String),

    #[error("EXPORT_ERROR: {0}")]
    ExportError(String),
}

fn format_bullets(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
