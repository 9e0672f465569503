//! Line-oriented terminal prompts.

use std::io::{self, BufRead, Write};

/// Read one trimmed line; `None` at end of input.
pub fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Ask a yes/no question. Only a literal "yes" (any case) confirms.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> io::Result<bool> {
    write!(out, "\n{} (yes/no): ", question)?;
    out.flush()?;
    Ok(read_line(input)?.is_some_and(|l| l.eq_ignore_ascii_case("yes")))
}
