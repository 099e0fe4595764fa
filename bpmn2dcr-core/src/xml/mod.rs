pub mod reader;
pub mod writer;

pub use reader::parse_bpmn_xml;
pub use writer::write_dcr_xml;
