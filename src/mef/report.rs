//! Report writer: serializes an [`AnalysisReport`] to the XML report
//! document of spec.md §6, using `quick_xml::Writer` for well-formed
//! escaping — the write-side counterpart of [`super::reader`]'s read-side
//! `quick_xml` idiom.

use crate::analysis::{Importance, SilBand, UncertaintyResult};
use crate::error::ScramError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

/// One fault tree's worth of analysis results, ready to serialize
/// (spec.md §6 "Report format"): cut sets, top probability, per-event
/// importance factors, and the SIL figures when requested.
#[derive(Debug, Clone)]
pub struct FaultTreeReport {
    pub name: String,
    pub top_probability: f64,
    pub products: Vec<Vec<String>>,
    pub importance: Vec<(String, Importance)>,
    pub uncertainty: Option<UncertaintyResult>,
    pub pfd_avg: Option<f64>,
    pub pfh: Option<f64>,
    pub sil_band: Option<SilBand>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub mission_time_hours: f64,
    pub trees: Vec<FaultTreeReport>,
}

pub struct ReportWriter;

impl ReportWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>, report: &AnalysisReport) -> Result<(), ScramError> {
        let xml = self.write_to_string(report)?;
        std::fs::write(path, xml)?;
        Ok(())
    }

    pub fn write_to_string(&self, report: &AnalysisReport) -> Result<String, ScramError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let mut root = BytesStart::new("results");
        root.push_attribute(("mission-time", report.mission_time_hours.to_string().as_str()));
        write_event(&mut writer, Event::Start(root))?;

        for tree in &report.trees {
            write_tree(&mut writer, tree)?;
        }

        write_event(&mut writer, Event::End(BytesEnd::new("results")))?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|err| ScramError::Io {
            message: format!("report is not valid UTF-8: {err}"),
            span: crate::error::SourceSpan::unknown(),
        })
    }
}

impl Default for ReportWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_tree(writer: &mut Writer<Cursor<Vec<u8>>>, tree: &FaultTreeReport) -> Result<(), ScramError> {
    let mut start = BytesStart::new("fault-tree");
    start.push_attribute(("name", tree.name.as_str()));
    write_event(writer, Event::Start(start))?;

    write_text_element(writer, "top-probability", &tree.top_probability.to_string())?;

    write_event(writer, Event::Start(BytesStart::new("products")))?;
    for product in &tree.products {
        let mut p = BytesStart::new("product");
        p.push_attribute(("order", product.len().to_string().as_str()));
        write_event(writer, Event::Start(p))?;
        for member in product {
            write_text_element(writer, "basic-event", member)?;
        }
        write_event(writer, Event::End(BytesEnd::new("product")))?;
    }
    write_event(writer, Event::End(BytesEnd::new("products")))?;

    write_event(writer, Event::Start(BytesStart::new("importance")))?;
    for (event_id, importance) in &tree.importance {
        let mut entry = BytesStart::new("importance-factor");
        entry.push_attribute(("basic-event", event_id.as_str()));
        entry.push_attribute(("fussell-vesely", importance.fussell_vesely.to_string().as_str()));
        entry.push_attribute(("birnbaum", importance.birnbaum.to_string().as_str()));
        entry.push_attribute(("raw", importance.raw.to_string().as_str()));
        entry.push_attribute(("rrw", importance.rrw.to_string().as_str()));
        write_event(writer, Event::Empty(entry))?;
    }
    write_event(writer, Event::End(BytesEnd::new("importance")))?;

    if let Some(uncertainty) = &tree.uncertainty {
        let mut start = BytesStart::new("uncertainty");
        start.push_attribute(("mean", uncertainty.mean.to_string().as_str()));
        start.push_attribute(("std-dev", uncertainty.std_dev.to_string().as_str()));
        write_event(writer, Event::Start(start))?;
        for (lower, upper, count) in &uncertainty.histogram {
            let mut bin = BytesStart::new("bin");
            bin.push_attribute(("lower", lower.to_string().as_str()));
            bin.push_attribute(("upper", upper.to_string().as_str()));
            bin.push_attribute(("count", count.to_string().as_str()));
            write_event(writer, Event::Empty(bin))?;
        }
        write_event(writer, Event::End(BytesEnd::new("uncertainty")))?;
    }

    if tree.pfd_avg.is_some() || tree.pfh.is_some() || tree.sil_band.is_some() {
        let mut sil = BytesStart::new("sil");
        if let Some(pfd_avg) = tree.pfd_avg {
            sil.push_attribute(("pfd-avg", pfd_avg.to_string().as_str()));
        }
        if let Some(pfh) = tree.pfh {
            sil.push_attribute(("pfh", pfh.to_string().as_str()));
        }
        if let Some(band) = tree.sil_band {
            sil.push_attribute(("band", sil_band_name(band)));
        }
        write_event(writer, Event::Empty(sil))?;
    }

    write_event(writer, Event::End(BytesEnd::new("fault-tree")))?;
    Ok(())
}

fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> Result<(), ScramError> {
    write_event(writer, Event::Start(BytesStart::new(tag)))?;
    write_event(writer, Event::Text(BytesText::new(text)))?;
    write_event(writer, Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_event(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event) -> Result<(), ScramError> {
    writer.write_event(event).map_err(|err| ScramError::Io {
        message: format!("XML write error: {err}"),
        span: crate::error::SourceSpan::unknown(),
    })
}

fn sil_band_name(band: SilBand) -> &'static str {
    match band {
        SilBand::None => "none",
        SilBand::Sil1 => "SIL1",
        SilBand::Sil2 => "SIL2",
        SilBand::Sil3 => "SIL3",
        SilBand::Sil4 => "SIL4",
    }
}
