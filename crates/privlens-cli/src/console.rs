//! Terminal rendering: status lines on stderr, result markup on stdout.

use std::io::{self, Stderr, Stdout, Write};

/// Status and result sink for one session.
///
/// Write failures are held until [`check`](Self::check) so rendering can be
/// driven from plain callbacks.
pub struct Console<O: Write, E: Write> {
    out: O,
    err: E,
    failed: Option<io::Error>,
}

impl Console<Stdout, Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Console<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            failed: None,
        }
    }

    pub fn status(&mut self, message: &str) {
        let result = writeln!(self.err, "{message}");
        self.record(result);
    }

    pub fn link(&mut self, url: &str) {
        let result = writeln!(self.err, "Privacy policy: {url}");
        self.record(result);
    }

    /// Append one streamed fragment to the result.
    pub fn token(&mut self, fragment: &str) {
        let result = self
            .out
            .write_all(fragment.as_bytes())
            .and_then(|()| self.out.flush());
        self.record(result);
    }

    /// Terminate a streamed result.
    pub fn end_result(&mut self) {
        let result = writeln!(self.out);
        self.record(result);
    }

    /// Print a complete result at once.
    pub fn result(&mut self, text: &str) {
        let result = writeln!(self.out, "{text}");
        self.record(result);
    }

    /// First write error since the last check, if any.
    pub fn check(&mut self) -> io::Result<()> {
        match self.failed.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (O, E) {
        (self.out, self.err)
    }

    fn record(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            self.failed.get_or_insert(e);
        }
    }
}
