//! Confirmation prompts
//!
//! Handlers take a [`Confirm`] so they never read the terminal directly.

use std::io::{self, BufRead, Write};

use crate::error::Result;

/// Yes/no confirmation callback
pub trait Confirm {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Answers yes without asking (`--yes`)
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Asks on stdout and reads the answer from stdin
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> Result<bool> {
        print!("{} [y/N] ", question);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(is_yes(&input))
    }
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
