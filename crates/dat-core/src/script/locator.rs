use std::fmt;

use serde::Serialize;

/// Human position inside a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    /// 1-based line.
    pub line: usize,
    /// Characters consumed on `line` up to and including the target.
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line={} col={}", self.line, self.column)
    }
}

/// Map a server-reported character offset into `script` to a line and column.
///
/// The offset is one before the offending character, so scanning covers
/// `offset + 1` characters. `\r\n`, `\r` and `\n` each count as one line
/// break, except when the break is the final character of the script.
pub fn locate(script: &str, offset: usize) -> Location {
    let chars: Vec<char> = script.chars().collect();
    let max = chars.len();
    let target = offset.saturating_add(1);

    let mut line = 1;
    let mut column = 0;
    let mut i = 0;

    while i < max && i < target {
        match chars[i] {
            '\r' => {
                if i + 1 < max && chars[i + 1] == '\n' {
                    i += 1;
                }
                if i + 1 < max {
                    line += 1;
                    column = 0;
                }
            }
            '\n' => {
                if i + 1 < max {
                    line += 1;
                    column = 0;
                }
            }
            _ => column += 1,
        }
        i += 1;
    }

    Location { line, column }
}

/// Like [`locate`] for offsets reported as text. Returns `None` when the
/// offset is not a number.
pub fn locate_reported(script: &str, offset: &str) -> Option<Location> {
    offset
        .trim()
        .parse::<usize>()
        .ok()
        .map(|offset| locate(script, offset))
}
