//! Batch splitting on a line-anchored separator token.
//!
//! A separator only counts when it starts a line and is immediately followed
//! by `\n`. The token is matched exactly: no trimming, no case folding.

/// Default batch separator.
pub const DEFAULT_SEPARATOR: &str = "GO";

/// Splits a script into batches.
///
/// Iteration is lazy and can be restarted by calling [`BatchSplitter::batches`]
/// again.
#[derive(Debug, Clone)]
pub struct BatchSplitter<'a> {
    script: &'a str,
    marker: String,
}

impl<'a> BatchSplitter<'a> {
    /// Create a splitter for `script` using `separator`.
    ///
    /// An empty separator never matches, so the script is yielded whole.
    pub fn new(script: &'a str, separator: &str) -> Self {
        let marker = if separator.is_empty() {
            String::new()
        } else {
            format!("{}\n", separator)
        };
        Self { script, marker }
    }

    /// Iterate over the batches in script order.
    pub fn batches(&self) -> Batches<'a, '_> {
        Batches {
            rest: Some(self.script),
            marker: &self.marker,
        }
    }
}

impl<'a, 's> IntoIterator for &'s BatchSplitter<'a> {
    type Item = &'a str;
    type IntoIter = Batches<'a, 's>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches()
    }
}

/// Iterator over the batches of a script.
#[derive(Debug, Clone)]
pub struct Batches<'a, 's> {
    rest: Option<&'a str>,
    marker: &'s str,
}

impl<'a, 's> Iterator for Batches<'a, 's> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;

        // Every batch begins at a line start, so a leading marker is anchored.
        if !self.marker.is_empty() {
            if let Some(after) = rest.strip_prefix(self.marker) {
                self.rest = Some(after);
                return Some("");
            }

            let mut from = 0;
            while let Some(idx) = rest[from..].find('\n') {
                let line_start = from + idx + 1;
                if rest[line_start..].starts_with(self.marker) {
                    self.rest = Some(&rest[line_start + self.marker.len()..]);
                    return Some(&rest[..line_start]);
                }
                from = line_start;
            }
        }

        self.rest = None;
        Some(rest)
    }
}

/// Split `script` on `separator`, collecting the batches.
pub fn split(script: &str, separator: &str) -> Vec<String> {
    BatchSplitter::new(script, separator)
        .batches()
        .map(str::to_string)
        .collect()
}
