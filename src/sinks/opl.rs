//! OPL ("object per line") output.
//!
//! Field order follows the osmium OPL writer: id, version, deleted flag,
//! changeset, timestamp, uid, user, tags, then per-kind payload (node
//! location, way node refs, relation members). Delimiter characters inside
//! strings are `%hex%`-escaped.

use super::ObjectSink;
use crate::model::{Kind, OsmObject};
use anyhow::Result;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct OplSink {
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl OplSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(Box::new(file)),
        })
    }

    pub fn stdout() -> Self {
        Self {
            writer: BufWriter::new(Box::new(std::io::stdout())),
        }
    }
}

impl ObjectSink for OplSink {
    fn write(&mut self, object: &OsmObject) -> Result<()> {
        let line = format_line(object);
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn needs_escape(c: char) -> bool {
    c.is_control() || matches!(c, ' ' | '%' | ',' | '=' | '@')
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        if needs_escape(c) {
            let _ = write!(out, "%{:x}%", c as u32);
        } else {
            out.push(c);
        }
    }
}

fn format_line(object: &OsmObject) -> String {
    let mut line = String::new();
    let _ = write!(
        line,
        "{}{} v{} d{} c{} t{} i{} u",
        object.kind.letter(),
        object.id,
        object.version,
        if object.visible { 'V' } else { 'D' },
        object.changeset,
        object.timestamp.as_deref().unwrap_or(""),
        object.uid,
    );
    push_escaped(&mut line, &object.user);

    line.push_str(" T");
    for (i, tag) in object.tags.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        push_escaped(&mut line, &tag.key);
        line.push('=');
        push_escaped(&mut line, &tag.value);
    }

    match object.kind {
        Kind::Node => {
            let (lon, lat) = object.location.unwrap_or((0.0, 0.0));
            let _ = write!(line, " x{lon} y{lat}");
        }
        Kind::Way => {
            line.push_str(" N");
            for (i, node_ref) in object.nodes.iter().enumerate() {
                if i > 0 {
                    line.push(',');
                }
                let _ = write!(line, "n{}", node_ref.id);
            }
        }
        Kind::Relation => {
            line.push_str(" M");
            for (i, member) in object.members.iter().enumerate() {
                if i > 0 {
                    line.push(',');
                }
                let _ = write!(line, "{}{}@", member.kind.letter(), member.id);
                push_escaped(&mut line, &member.role);
            }
        }
    }

    line
}
