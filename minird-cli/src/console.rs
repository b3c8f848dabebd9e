//! Operator console used during recalibration

use chrono::Local;
use minird_bridge::{Prompter, Result};
use std::io::{self, BufRead, Write};

/// Prompts on a writer, answers from a reader
pub struct ConsolePrompter<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

impl<R: BufRead, W: Write> Prompter for ConsolePrompter<R, W> {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "[{}] --> {} ", timestamp(), prompt)?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "console closed").into());
        }
        Ok(answer.trim_end().to_string())
    }

    fn notify(&mut self, message: &str) {
        if let Err(e) = writeln!(self.output, "[{}] {}", timestamp(), message) {
            log::warn!("Console write failed: {}", e);
        }
    }
}
