//! Decoder for the analyzer's line protocol.
//!
//! One analyzer run emits, in order: the finding header, zero or more
//! finding rows, a blank line, the metadata header, and a single metadata
//! row. Anything else is a [`ProtocolError`]; version skew between this
//! runner and the analyzer has to fail loudly rather than corrupt totals.

use crate::error::ProtocolError;
use crate::models::{
    Finding, MetadataRecord, PackageScan, FIELD_SEPARATOR, FINDING_COLUMNS, FINDING_HEADER,
    METADATA_HEADER, PATTERN_COLUMN,
};

/// Position of the scanner within the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ExpectFindingHeader,
    ReadFindings,
    ExpectMetadataHeader,
    ExpectMetadata,
    Done,
}

/// Incremental line scanner for one analyzer stream.
#[derive(Debug)]
pub struct StreamParser {
    package: String,
    state: State,
    line_no: usize,
    findings: Vec<Finding>,
    metadata: Option<MetadataRecord>,
}

impl StreamParser {
    /// Create a scanner for the output of `package`.
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            state: State::ExpectFindingHeader,
            line_no: 0,
            findings: Vec::new(),
            metadata: None,
        }
    }

    /// Feed the next line of output (without its terminator).
    pub fn feed_line(&mut self, raw: &str) -> Result<(), ProtocolError> {
        self.line_no += 1;
        let line = raw.trim();

        self.state = match self.state {
            State::ExpectFindingHeader => {
                if line != FINDING_HEADER {
                    return Err(ProtocolError::UnexpectedFindingHeader {
                        found: line.to_string(),
                    });
                }
                State::ReadFindings
            }
            State::ReadFindings => {
                if line.is_empty() {
                    State::ExpectMetadataHeader
                } else {
                    let finding = parse_finding(line, self.line_no)?;
                    self.findings.push(finding);
                    State::ReadFindings
                }
            }
            State::ExpectMetadataHeader => {
                if line != METADATA_HEADER {
                    return Err(ProtocolError::UnexpectedMetadataHeader {
                        found: line.to_string(),
                    });
                }
                State::ExpectMetadata
            }
            State::ExpectMetadata => {
                self.metadata = Some(MetadataRecord::new(line));
                State::Done
            }
            State::Done => {
                if !line.is_empty() {
                    return Err(ProtocolError::TrailingOutput {
                        line: self.line_no,
                        found: line.to_string(),
                    });
                }
                State::Done
            }
        };

        Ok(())
    }

    /// Finish the stream, returning the decoded scan.
    pub fn finish(self) -> Result<PackageScan, ProtocolError> {
        let expected = match self.state {
            State::Done => {
                return Ok(PackageScan {
                    package: self.package,
                    findings: self.findings,
                    metadata: self.metadata.unwrap_or_default(),
                })
            }
            State::ExpectFindingHeader => "finding header",
            State::ReadFindings => "blank line after findings",
            State::ExpectMetadataHeader => "metadata header",
            State::ExpectMetadata => "metadata row",
        };

        Err(ProtocolError::UnexpectedEof { expected })
    }
}

/// Decode the complete output of one analyzer run.
pub fn parse(package: &str, output: &[u8]) -> Result<PackageScan, ProtocolError> {
    let text = String::from_utf8_lossy(output);
    let mut parser = StreamParser::new(package);

    for line in text.lines() {
        parser.feed_line(line)?;
    }

    parser.finish()
}

fn parse_finding(line: &str, line_no: usize) -> Result<Finding, ProtocolError> {
    let columns: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if columns.len() != FINDING_COLUMNS {
        return Err(ProtocolError::MalformedFinding {
            line: line_no,
            reason: format!(
                "expected {} columns, found {}",
                FINDING_COLUMNS,
                columns.len()
            ),
        });
    }

    let number = |index: usize, name: &str| {
        columns[index]
            .parse::<usize>()
            .map_err(|_| ProtocolError::MalformedFinding {
                line: line_no,
                reason: format!("{} is not a number: {:?}", name, columns[index]),
            })
    };

    // The crate column is the analyzer's own name for the crate (hyphens
    // become underscores), so it is kept as reported.
    Ok(Finding {
        package: columns[0].to_string(),
        fn_decl: columns[1].to_string(),
        callee: columns[2].to_string(),
        pattern: columns[PATTERN_COLUMN].to_string(),
        dir: columns[4].to_string(),
        file: columns[5].to_string(),
        line: number(6, "line")?,
        col: number(7, "col")?,
    })
}
