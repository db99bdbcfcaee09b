//! Operator prompt shown when the worker cap is reached.

use std::io::{BufRead, Write};

use gridsweep_core::ConfirmGate;

/// Interpret a y/n answer. Anything else, including an empty line, is `None`.
#[must_use]
pub fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Asks on `output` and reads the answer from `input`.
///
/// Unrecognised answers are asked again; end of input counts as "no".
pub struct PromptGate<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

/// Prompt on the terminal
pub fn terminal_gate() -> PromptGate<std::io::StdinLock<'static>, std::io::Stdout> {
    PromptGate::new(std::io::stdin().lock(), std::io::stdout())
}

impl<R: BufRead, W: Write> ConfirmGate for PromptGate<R, W> {
    fn confirm(&mut self, launched: usize, remaining: usize) -> bool {
        loop {
            let _ = write!(
                self.output,
                "{launched} workers launched, {remaining} chunk(s) waiting. Continue? [y/n] "
            );
            let _ = self.output.flush();

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return false,
                Ok(_) => {}
            }
            match parse_yes_no(&line) {
                Some(answer) => {
                    tracing::info!(launched, remaining, answer, "operator confirmation");
                    return answer;
                }
                None => {
                    let _ = writeln!(self.output, "Please answer y or n.");
                }
            }
        }
    }
}
