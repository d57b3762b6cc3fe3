//! Model Exchange Format I/O (spec.md §6, SPEC_FULL §4.J/§4.K): reading
//! `<opsa-mef>` input documents into a [`crate::model::Model`], and writing
//! analysis results back out as an MEF report document.

pub mod reader;
pub mod report;

pub use reader::read_model_file;
pub use reader::read_model_str;
pub use report::{AnalysisReport, FaultTreeReport, ReportWriter};
