//! The interactive query loop.

use std::io::{self, BufRead, Write};
use switchboard_core::Orchestrator;

/// Entering this word (in any letter case) ends the session.
const EXIT_SENTINEL: &str = "quit";

/// Whether a line, with its terminator already removed, ends the session.
pub fn is_exit_sentinel(line: &str) -> bool {
    line.eq_ignore_ascii_case(EXIT_SENTINEL)
}

/// Read queries from `input` until the sentinel or end of input, answering
/// each one on `output`.
pub async fn run_shell<R: BufRead, W: Write>(
    mut input: R,
    output: &mut W,
    orchestrator: &Orchestrator<'_>,
    server_count: usize,
) -> io::Result<()> {
    writeln!(output, "\nMCP Client Started!")?;
    writeln!(output, "Connected to {server_count} MCP servers")?;
    writeln!(output, "Type your queries or '{EXIT_SENTINEL}' to exit.")?;

    let mut buf = Vec::new();
    loop {
        write!(output, "\nQuery: ")?;
        output.flush()?;

        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            writeln!(output)?;
            break;
        }
        // Bytes that are not UTF-8 become U+FFFD rather than ending the session.
        let line = String::from_utf8_lossy(&buf);
        let query = strip_line_ending(&line);
        if is_exit_sentinel(query) {
            break;
        }

        let answer = orchestrator.process_query(query).await;
        writeln!(output, "\n{answer}")?;
    }
    Ok(())
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
