//! Interactive confirmation for destructive operations.

use crate::errors::AppResult;
use std::io::{self, BufRead, Write};

/// Ask a yes/no question on stdout and read the answer from stdin.
/// `assume_yes` (the `--yes` flag) skips the question. End of input counts
/// as "no", so a non-interactive run without `--yes` never proceeds.
pub fn confirm(question: &str, assume_yes: bool) -> AppResult<bool> {
    if assume_yes {
        return Ok(true);
    }
    let stdin = io::stdin();
    confirm_with(question, &mut stdin.lock(), &mut io::stdout())
}

pub fn confirm_with<R: BufRead, W: Write>(question: &str, input: &mut R, out: &mut W) -> AppResult<bool> {
    write!(out, "⚠️  {question} [y/N]: ")?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    writeln!(out)?;

    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
