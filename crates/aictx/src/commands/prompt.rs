//! Confirmation prompts for destructive commands.

use std::io::{self, BufRead, IsTerminal, Write};

/// Asks `[y/N]` questions, but only when someone can answer them.
#[derive(Debug, Clone, Copy)]
pub struct Prompt {
    assume_yes: bool,
    interactive: bool,
}

impl Prompt {
    /// Prompt on an interactive stdin unless `assume_yes` is set.
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            interactive: io::stdin().is_terminal(),
        }
    }

    /// Ask `question`. Non-interactive sessions proceed without asking.
    pub fn confirm(&self, question: &str) -> io::Result<bool> {
        if self.assume_yes || !self.interactive {
            return Ok(true);
        }

        print!("{question} [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(is_yes(&input))
    }
}

fn is_yes(input: &str) -> bool {
    let answer = input.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
