//! Colored terminal output

use colored::Colorize;
use tidemark::migration::Reporter;

/// [`Reporter`] writing to the terminal
///
/// Output and info go to stdout, warnings and errors to stderr. With `quiet`
/// set only errors are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Reporter for ConsoleReporter {
    fn output(&self, message: &str) {
        if !self.quiet {
            println!("{}", message.green());
        }
    }

    fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", message.blue());
        }
    }

    fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message.yellow());
        }
    }

    fn error(&self, message: &str) {
        eprintln!("{}", message.red());
    }
}
