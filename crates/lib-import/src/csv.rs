//! Two-column waveform CSV reader.
//!
//! Accepts `time, amplitude` rows as written by circuit simulators (Qucs,
//! SPICE exports, scope dumps):
//! - columns separated by `,`, `;`, tabs or plain whitespace
//! - one optional header line before the first data row
//! - `#` and `!` start comments, on their own line or after a row
//! - time must strictly increase
//!
//! Samples are linearly interpolated onto a uniform grid starting at t = 0;
//! times outside the file hold the nearest end value.

use crate::error::ParseError;
use lib_dsp::{DspError, DspResult, WaveformImporter};
use lib_types::{Seconds, Waveform};
use nom::{
    branch::alt,
    character::complete::{one_of, space0, space1},
    combinator::value,
    number::complete::double,
    sequence::delimited,
    IResult, Parser,
};
use std::path::Path;
use tracing::debug;

/// Refuse to resample onto more points than this.
const MAX_SAMPLES: usize = 1 << 24;

/// Parsed `(time, amplitude)` rows.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformTable {
    pub time: Vec<f64>,
    pub amplitude: Vec<f64>,
}

impl WaveformTable {
    /// Linearly interpolate onto `t = 0, ts, 2*ts, ...` up to the last row.
    pub fn resample(&self, ts: Seconds) -> Result<Waveform, ParseError> {
        if !(ts.0 > 0.0) {
            return Err(ParseError::InvalidSamplePeriod(ts.0));
        }
        let t_last = self.time.last().copied().unwrap_or(0.0).max(0.0);
        // Absorb rounding in time stamps that are whole multiples of ts.
        let span = (t_last / ts.0 + 1e-9).floor();
        if !(span < MAX_SAMPLES as f64) {
            return Err(ParseError::SpanTooLong {
                span: t_last,
                max: MAX_SAMPLES,
            });
        }
        let n = span as usize + 1;

        let mut samples = Vec::with_capacity(n);
        let mut seg = 0;
        for k in 0..n {
            let t = k as f64 * ts.0;
            while seg + 1 < self.time.len() && self.time[seg + 1] < t {
                seg += 1;
            }
            samples.push(self.interpolate(seg, t));
        }

        Ok(Waveform::new(samples, ts, Seconds::ZERO))
    }

    fn interpolate(&self, seg: usize, t: f64) -> f64 {
        let (time, amp) = (&self.time, &self.amplitude);
        if t <= time[0] {
            return amp[0];
        }
        if seg + 1 >= time.len() || t >= time[time.len() - 1] {
            return amp[amp.len() - 1];
        }
        let frac = (t - time[seg]) / (time[seg + 1] - time[seg]);
        amp[seg] + frac * (amp[seg + 1] - amp[seg])
    }
}

/// Parse waveform CSV text.
pub fn parse_waveform_csv(content: &str) -> Result<WaveformTable, ParseError> {
    let mut time = Vec::new();
    let mut amplitude = Vec::new();
    let mut header_allowed = true;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw);
        if line.trim().is_empty() {
            continue;
        }

        let (t, v) = match parse_row(line) {
            Ok((rest, row)) if rest.trim().is_empty() => row,
            Ok((rest, _)) => {
                return Err(ParseError::syntax(
                    line_no,
                    column_of(line, rest),
                    format!("unexpected trailing text '{}'", rest.trim()),
                ));
            }
            Err(_) if header_allowed => {
                debug!(line = line_no, "skipping header line");
                header_allowed = false;
                continue;
            }
            Err(e) => {
                let column = match &e {
                    nom::Err::Error(inner) | nom::Err::Failure(inner) => column_of(line, inner.input),
                    nom::Err::Incomplete(_) => line.len() + 1,
                };
                return Err(ParseError::syntax(line_no, column, "expected 'time, amplitude'"));
            }
        };
        header_allowed = false;

        if !t.is_finite() || !v.is_finite() {
            return Err(ParseError::syntax(line_no, 1, "non-finite value"));
        }
        if let Some(&prev) = time.last() {
            if t <= prev {
                return Err(ParseError::TimeNotIncreasing {
                    line: line_no,
                    time: t,
                    previous: prev,
                });
            }
        }
        time.push(t);
        amplitude.push(v);
    }

    if time.len() < 2 {
        return Err(ParseError::TooFewRows(time.len()));
    }

    Ok(WaveformTable { time, amplitude })
}

/// Read and parse a waveform CSV file.
pub fn parse_waveform_csv_file(path: &Path) -> Result<WaveformTable, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_waveform_csv(&content)
}

/// [`WaveformImporter`] for waveform CSV files.
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvImporter;

impl WaveformImporter for CsvImporter {
    fn import(&self, path: &Path, ts: Seconds) -> DspResult<Waveform> {
        let table = parse_waveform_csv_file(path).map_err(|e| DspError::import(path, e.to_string()))?;
        let waveform = table
            .resample(ts)
            .map_err(|e| DspError::import(path, e.to_string()))?;
        debug!(
            path = %path.display(),
            rows = table.time.len(),
            samples = waveform.len(),
            "imported channel waveform"
        );
        Ok(waveform)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(|c: char| c == '#' || c == '!') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn column_of(line: &str, rest: &str) -> usize {
    line.len() - rest.len() + 1
}

fn separator(input: &str) -> IResult<&str, ()> {
    alt((
        value((), delimited(space0, one_of(",;"), space0)),
        value((), space1),
    ))
    .parse(input)
}

fn parse_row(input: &str) -> IResult<&str, (f64, f64)> {
    let (input, _) = space0(input)?;
    let (input, t) = double(input)?;
    let (input, _) = separator(input)?;
    let (input, v) = double(input)?;
    let (input, _) = space0(input)?;
    Ok((input, (t, v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_with_header_and_comments() {
        let content = "# exported step response\n\
                       \"time\",\"V(out)\"\n\
                       0.0, 0.0\n\
                       1e-12, 0.5 ! midpoint\n\
                       \n\
                       2e-12;1.0\n\
                       3e-12\t1.0\n\
                       4e-12   1.0\n";
        let table = parse_waveform_csv(content).unwrap();

        assert_eq!(table.time, vec![0.0, 1e-12, 2e-12, 3e-12, 4e-12]);
        assert_eq!(table.amplitude, vec![0.0, 0.5, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let content = "time,value\n0,0\n1,abc\n";
        match parse_waveform_csv(content) {
            Err(ParseError::Syntax { line, column, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(column, 3);
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_second_header_is_an_error() {
        let content = "time,value\nunits,volts\n0,0\n1,1\n";
        assert!(matches!(
            parse_waveform_csv(content),
            Err(ParseError::Syntax { line: 2, .. })
        ));
    }

    #[test]
    fn test_time_must_increase() {
        let content = "0,0\n1,1\n1,2\n";
        assert!(matches!(
            parse_waveform_csv(content),
            Err(ParseError::TimeNotIncreasing { line: 3, .. })
        ));
    }

    #[test]
    fn test_extra_column_rejected() {
        assert!(matches!(
            parse_waveform_csv("0,0,0\n1,1,1\n"),
            Err(ParseError::Syntax { line: 1, .. })
        ));
    }

    #[test]
    fn test_too_few_rows() {
        assert!(matches!(
            parse_waveform_csv("time,v\n0,1\n"),
            Err(ParseError::TooFewRows(1))
        ));
    }

    #[test]
    fn test_resample_rejects_bad_period() {
        let table = WaveformTable {
            time: vec![0.0, 1.0],
            amplitude: vec![0.0, 1.0],
        };
        assert!(matches!(
            table.resample(Seconds(0.0)),
            Err(ParseError::InvalidSamplePeriod(_))
        ));
        assert!(matches!(
            table.resample(Seconds(1e-9)),
            Err(ParseError::SpanTooLong { .. })
        ));
    }

    #[test]
    fn test_resample_from_zero() {
        let table = WaveformTable {
            time: vec![1.0, 3.0, 4.0],
            amplitude: vec![2.0, 4.0, 0.0],
        };
        let wf = table.resample(Seconds(1.0)).unwrap();

        assert_eq!(wf.t_start, Seconds::ZERO);
        assert_eq!(wf.samples, vec![2.0, 2.0, 3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_resample_fine_step() {
        let table = WaveformTable {
            time: vec![0.0, 1.0],
            amplitude: vec![0.0, 1.0],
        };
        let wf = table.resample(Seconds(0.25)).unwrap();

        assert_eq!(wf.len(), 5);
        for (k, v) in wf.samples.iter().enumerate() {
            assert!((v - 0.25 * k as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn test_importer_reads_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "time,v").unwrap();
        for k in 0..=10 {
            writeln!(file, "{:e},{}", k as f64 * 2e-12, if k >= 5 { 1.0 } else { 0.0 }).unwrap();
        }
        file.flush().unwrap();

        let wf = CsvImporter.import(file.path(), Seconds::from_ps(1.0)).unwrap();
        assert_eq!(wf.len(), 21);
        assert_eq!(wf.samples[0], 0.0);
        assert!((wf.samples[9] - 0.5).abs() < 1e-9);
        assert_eq!(wf.samples[20], 1.0);
    }

    #[test]
    fn test_importer_maps_errors() {
        let result = CsvImporter.import(Path::new("/nonexistent/chnl.csv"), Seconds::from_ps(1.0));
        assert!(matches!(result, Err(DspError::Import { .. })));
    }
}
