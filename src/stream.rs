//! Runs a line operation over a reader, writing each result as soon as it is produced.

use log::debug;
use std::io::{self, BufRead, Write};

use crate::traits::LineOperation;
use crate::Settings;

#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("failed to read line {line} from input")]
    Read {
        line: u64,
        #[source]
        source: io::Error,
    },
    #[error("failed to write output")]
    Write(#[source] io::Error),
}

impl StreamError {
    /// True when the reading end of the output went away, e.g. `comment com < big | head -1`.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, StreamError::Write(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}

/// Applies `op` to every line of `reader` and writes the results to `writer`,
/// one output line per input line, each terminated by `\n`.
///
/// Lines are read as bytes, so input that is not UTF-8 passes through. A
/// trailing `\n` or `\r\n` is stripped before the operation sees the line.
///
/// Returns the number of lines processed. Processing stops at the first read or
/// write fault; lines already written are left in place.
pub fn filter<R, W>(
    op: &dyn LineOperation,
    settings: &Settings,
    mut reader: R,
    mut writer: W,
) -> Result<u64, StreamError>
where
    R: BufRead,
    W: Write,
{
    let mut count = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| StreamError::Read {
                line: count + 1,
                source,
            })?;
        if read == 0 {
            break;
        }

        let mut out = op.apply(strip_terminator(&buf), settings);
        out.push(b'\n');
        writer.write_all(&out).map_err(StreamError::Write)?;
        count += 1;
    }
    writer.flush().map_err(StreamError::Write)?;

    debug!("Processed {} line(s)", count);
    Ok(count)
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
