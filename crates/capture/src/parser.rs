//! Emitted line parser

use crate::CaptureError;
use ring_buffer::{Row, Sample};
use sink::{DIAGNOSTIC_PREFIX, NO_DATA};

/// One classified input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A row with the expected number of samples
    Row(Row),
    /// The no-data sentinel
    NoData,
    /// A device diagnostic message
    Diagnostic(String),
    /// Nothing but whitespace
    Blank,
}

/// Parse one line emitted by the device.
///
/// Samples may be separated by commas and/or whitespace.
pub fn parse_line(line: &str, channels: usize) -> Result<Line, CaptureError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Line::Blank);
    }
    if line == NO_DATA {
        return Ok(Line::NoData);
    }
    if let Some(message) = line.strip_prefix(DIAGNOSTIC_PREFIX.trim_end()) {
        return Ok(Line::Diagnostic(message.trim().to_string()));
    }

    let samples = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<Sample>().map_err(|_| CaptureError::NotInteger {
                token: token.to_string(),
                line: line.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if samples.len() != channels {
        return Err(CaptureError::ChannelCount {
            expected: channels,
            actual: samples.len(),
        });
    }

    Ok(Line::Row(Row::new(samples)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sink::format_row;

    #[test]
    fn test_parse_csv_row() {
        assert_eq!(
            parse_line("1023,4095\r\n", 2).unwrap(),
            Line::Row(Row::new(vec![1023, 4095]))
        );
    }

    #[test]
    fn test_parse_mixed_separators() {
        assert_eq!(
            parse_line("1, 2  3", 3).unwrap(),
            Line::Row(Row::new(vec![1, 2, 3]))
        );
    }

    #[test]
    fn test_sentinel_blank_and_diagnostic() {
        assert_eq!(parse_line("<no-data>", 2).unwrap(), Line::NoData);
        assert_eq!(parse_line("   ", 2).unwrap(), Line::Blank);
        assert_eq!(
            parse_line("# sensor bus:0x48 not responding", 2).unwrap(),
            Line::Diagnostic("sensor bus:0x48 not responding".to_string())
        );
    }

    #[test]
    fn test_invalid_sample_is_a_value() {
        assert_eq!(
            parse_line("-1,17", 2).unwrap(),
            Line::Row(Row::new(vec![-1, 17]))
        );
    }

    #[test]
    fn test_non_integer_rejected() {
        let err = parse_line("12,abc", 2).unwrap_err();
        assert!(matches!(err, CaptureError::NotInteger { token, .. } if token == "abc"));
    }

    #[test]
    fn test_wrong_count_rejected() {
        let err = parse_line("1,2,3", 2).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::ChannelCount { expected: 2, actual: 3 }
        ));
    }

    proptest! {
        #[test]
        fn prop_emitted_rows_parse(samples in prop::collection::vec(-1i32..4096, 1..8)) {
            let row = Row::new(samples.clone());
            let line = format_row(&row);
            prop_assert_eq!(parse_line(&line, samples.len()).unwrap(), Line::Row(row));
        }

        #[test]
        fn prop_never_panics(line in "\\PC*", channels in 0usize..4) {
            let _ = parse_line(&line, channels);
        }
    }
}
