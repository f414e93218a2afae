//! Strips psql's header and footer rows from fetched log text

use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// psql row-count footer, e.g. `(1 row)`
static FOOTER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(\d+ rows?\)\r?\n?$").expect("Invalid footer regex"));

/// Line filter for unaligned psql output
///
/// Drops the first line (column header) and holds back one line so the
/// trailing row-count footer can be dropped at end of input. Everything
/// in between passes through unchanged.
#[derive(Debug, Default)]
pub struct PsqlOutputFilter {
    header_seen: bool,
    pending: Option<Vec<u8>>,
}

impl PsqlOutputFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (including its newline); returns a line ready to emit
    pub fn push(&mut self, line: Vec<u8>) -> Option<Vec<u8>> {
        if !self.header_seen {
            self.header_seen = true;
            return None;
        }
        self.pending.replace(line)
    }

    /// End of input; returns the held-back line unless it is the footer
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.pending
            .take()
            .filter(|line| !FOOTER_REGEX.is_match(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> String {
        let mut filter = PsqlOutputFilter::new();
        let mut out = Vec::new();
        for line in input.split_inclusive('\n') {
            if let Some(l) = filter.push(line.as_bytes().to_vec()) {
                out.extend(l);
            }
        }
        if let Some(l) = filter.finish() {
            out.extend(l);
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_strips_header_and_footer() {
        let input = "pg_read_file\n2024-01-01 LOG:  a\n2024-01-01 LOG:  b\n(1 row)\n";
        assert_eq!(run(input), "2024-01-01 LOG:  a\n2024-01-01 LOG:  b\n");
    }

    #[test]
    fn test_plural_footer_without_newline() {
        assert_eq!(run("h\nx\n(12 rows)"), "x\n");
    }

    #[test]
    fn test_parenthesized_log_line_is_kept() {
        let input = "pg_read_file\n(connection from 10.0.0.1)\nlast line\n";
        assert_eq!(run(input), "(connection from 10.0.0.1)\nlast line\n");
    }

    #[test]
    fn test_header_only() {
        assert_eq!(run("pg_read_file\n"), "");
        assert_eq!(run(""), "");
    }

    #[test]
    fn test_last_line_without_footer_is_kept() {
        assert_eq!(run("h\na\nb"), "a\nb");
    }
}
