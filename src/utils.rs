use std::io::Write;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub struct ProgressCounter {
    label: &'static str,
    interval: u64,
    count: u64,
}

impl ProgressCounter {
    pub fn new(label: &'static str, interval: u64) -> Self {
        let counter = Self {
            label,
            interval: interval.max(1),
            count: 0,
        };
        counter.print();
        counter
    }

    pub fn inc(&mut self, delta: u64) {
        let prev = self.count;
        self.count = self.count.saturating_add(delta);
        // Print if we crossed an interval boundary
        if prev / self.interval < self.count / self.interval {
            self.print();
        }
    }

    pub fn finish(&self) {
        self.print();
        eprintln!();
    }

    fn print(&self) {
        eprint!("\r{}: {}", self.label, self.count);
        let _ = std::io::stderr().flush();
    }
}

pub fn format_timestamp_millis(millis: i64) -> Option<String> {
    let nanos = i128::from(millis) * 1_000_000;
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()?;
    dt.format(&Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_formats_as_rfc3339() {
        assert_eq!(
            format_timestamp_millis(1_700_000_000_000).as_deref(),
            Some("2023-11-14T22:13:20Z")
        );
        assert_eq!(format_timestamp_millis(0).as_deref(), Some("1970-01-01T00:00:00Z"));
    }
}
