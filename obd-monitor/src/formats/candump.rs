//! candump log file parser
//!
//! Parses the log format written by `candump -l` (can-utils):
//!
//! ```text
//! (1436509052.249713) can0 1D0#0011223344556677
//! (1436509052.250100) can0 1EC6AE80#07624960FA230000
//! (1436509052.251000) can0 7DF#R
//! ```
//!
//! Identifiers written with 8 hex digits are extended (29-bit). A lone `R`
//! after `#` marks a remote transmission request.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::types::{MonitorError, RawFrame, Result};

/// candump log parser
pub struct CandumpParser;

impl CandumpParser {
    /// Open a candump log and return an iterator over its frames
    pub fn parse(path: &Path) -> Result<CandumpFrameIterator<BufReader<File>>> {
        log::info!("Parsing candump log: {:?}", path);

        let file = File::open(path)?;
        Ok(CandumpFrameIterator::new(BufReader::new(file)))
    }

    /// Read every frame from a candump log into memory
    pub fn read_all(path: &Path) -> Result<Vec<RawFrame>> {
        Self::parse(path)?.collect()
    }
}

/// Iterator over the frames of a candump log
pub struct CandumpFrameIterator<R: BufRead> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: BufRead> CandumpFrameIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for CandumpFrameIterator<R> {
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            return Some(parse_line(trimmed).map_err(|message| MonitorError::LogParseError {
                line: self.line_number,
                message,
            }));
        }
    }
}

/// Parse one `(timestamp) interface ID#DATA` line
pub fn parse_line(line: &str) -> std::result::Result<RawFrame, String> {
    let mut fields = line.split_whitespace();

    let timestamp = fields.next().ok_or("missing timestamp")?;
    let _interface = fields.next().ok_or("missing interface")?;
    let frame = fields.next().ok_or("missing frame")?;

    let timestamp_ms = parse_timestamp(timestamp)?;

    let (id_str, data_str) = frame
        .split_once('#')
        .ok_or_else(|| format!("expected ID#DATA, got {:?}", frame))?;

    let id = u32::from_str_radix(id_str, 16).map_err(|_| format!("invalid CAN ID {:?}", id_str))?;
    let is_extended = id_str.len() > 3;
    if id > 0x1FFF_FFFF || (!is_extended && id > crate::types::MAX_STANDARD_ID) {
        return Err(format!("CAN ID out of range: {:?}", id_str));
    }

    if data_str.eq_ignore_ascii_case("R") {
        return Ok(RawFrame::with_timestamp(id, &[], timestamp_ms)
            .extended(is_extended)
            .rtr(true));
    }

    let data = parse_hex_bytes(data_str)?;
    if data.len() > 8 {
        return Err(format!("{} data bytes exceed classic CAN", data.len()));
    }

    Ok(RawFrame::with_timestamp(id, &data, timestamp_ms).extended(is_extended))
}

/// `(seconds.micros)` → milliseconds
fn parse_timestamp(field: &str) -> std::result::Result<u64, String> {
    let inner = field
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("invalid timestamp {:?}", field))?;

    let (secs, frac) = inner.split_once('.').unwrap_or((inner, "0"));
    let secs: u64 = secs.parse().map_err(|_| format!("invalid timestamp {:?}", field))?;

    // Keep millisecond precision of the fractional part
    let millis_digits: String = frac.chars().chain("000".chars()).take(3).collect();
    let millis: u64 = millis_digits
        .parse()
        .map_err(|_| format!("invalid timestamp {:?}", field))?;

    secs.checked_mul(1000)
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(|| format!("timestamp {:?} out of range", field))
}

fn parse_hex_bytes(s: &str) -> std::result::Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {:?}", s));
    }

    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid data byte in {:?}", s))
        })
        .collect()
}

/// Render a frame as a candump log line
pub fn format_line(frame: &RawFrame, interface: &str) -> String {
    format!(
        "({}.{:06}) {} {}",
        frame.timestamp_ms / 1000,
        (frame.timestamp_ms % 1000) * 1000,
        interface,
        frame
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_standard_frame() {
        let frame = parse_line("(1436509052.249713) can0 1D0#0011223344556677").unwrap();
        assert_eq!(frame.id, 0x1D0);
        assert!(!frame.is_extended);
        assert_eq!(frame.payload(), &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
        assert_eq!(frame.timestamp_ms, 1436509052249);
    }

    #[test]
    fn test_parse_extended_and_rtr() {
        let frame = parse_line("(10.5) can0 1EC6AE80#0762496D").unwrap();
        assert_eq!(frame.id, 0x1EC6AE80);
        assert!(frame.is_extended);
        assert_eq!(frame.dlc(), 4);
        assert_eq!(frame.timestamp_ms, 10_500);

        // Short extended IDs written with 8 digits stay extended
        let frame = parse_line("(1.0) can0 00000123#").unwrap();
        assert!(frame.is_extended);
        assert_eq!(frame.dlc(), 0);

        let frame = parse_line("(1.0) vcan0 7DF#R").unwrap();
        assert!(frame.is_rtr);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("can0 1D0#00").is_err());
        assert!(parse_line("(1.0) can0 1D0-00").is_err());
        assert!(parse_line("(1.0) can0 1D0#0").is_err());
        assert!(parse_line("(1.0) can0 1D0#zz").is_err());
        assert!(parse_line("(1.0) can0 800#00").is_err());
        assert!(parse_line("(1.0) can0 1D0#001122334455667788").is_err());
    }

    #[test]
    fn test_parse_timestamp_out_of_range() {
        assert!(parse_line("(18446744073709552.000) can0 1D0#00").is_err());
        assert!(parse_line("(18446744073709551.999) can0 1D0#00").is_err());

        let frame = parse_line("(18446744073709550.999) can0 1D0#00").unwrap();
        assert_eq!(frame.timestamp_ms, 18446744073709550999);
    }

    #[test]
    fn test_iterator_reports_line_numbers() {
        let log = "# comment\n\n(1.0) can0 1D0#00\n(1.1) can0 bogus\n";
        let results: Vec<_> = CandumpFrameIterator::new(Cursor::new(log)).collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(MonitorError::LogParseError { line, .. }) => assert_eq!(*line, 4),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_all_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(1.000) can0 1FFF0120#010203").unwrap();
        writeln!(file, "(1.100) can0 348#AA").unwrap();

        let frames = CandumpParser::read_all(file.path()).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].id, 0x1FFF0120);
        assert_eq!(frames[1].payload(), &[0xAA]);
    }

    #[test]
    fn test_format_line() {
        let frame = RawFrame::with_timestamp(0x348, &[0xAA], 1_100);
        assert_eq!(format_line(&frame, "can0"), "(1.100000) can0 348#AA");
        assert_eq!(parse_line(&format_line(&frame, "can0")).unwrap(), frame);
    }
}
