use anyhow::Result;
use std::path::Path;
use std::str::FromStr;

use crate::model::OsmObject;

pub mod jsonl;
pub mod opl;

pub use self::jsonl::JsonlSink;
pub use self::opl::OplSink;

/// Output formats for matched objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Opl,
    Jsonl,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "opl" => Ok(OutputFormat::Opl),
            "jsonl" | "json" => Ok(OutputFormat::Jsonl),
            _ => Err(format!("unsupported output format: {value}")),
        }
    }
}

/// Pick the output format: explicit override first, then the output file
/// extension, OPL otherwise (including stdout).
pub fn select_format(format: Option<OutputFormat>, output: &str) -> OutputFormat {
    if let Some(format) = format {
        return format;
    }
    match Path::new(output).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("json") => {
            OutputFormat::Jsonl
        }
        _ => OutputFormat::Opl,
    }
}

pub trait ObjectSink {
    fn write(&mut self, object: &OsmObject) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// Open a sink for the given output path ('-' writes stdout).
pub fn open_sink(format: OutputFormat, output: &str) -> Result<Box<dyn ObjectSink>> {
    Ok(match format {
        OutputFormat::Opl => {
            if output == "-" {
                Box::new(OplSink::stdout())
            } else {
                Box::new(OplSink::new(output)?)
            }
        }
        OutputFormat::Jsonl => {
            if output == "-" {
                Box::new(JsonlSink::stdout())
            } else {
                Box::new(JsonlSink::new(output)?)
            }
        }
    })
}
