//! Test reporter - progress markers and the final summary

use crate::config::HarnessConfig;
use crate::error::{Failure, TestError};
use colored::{Color, Colorize};
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

/// Final counts of a run, as returned by `Harness::terminate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: u64,
    pub assertions: u64,
    pub skipped: u64,
    pub total_duration: Duration,
    pub failures: Vec<Failure>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure count, saturated to what a process can report
    pub fn exit_status(&self) -> u8 {
        u8::try_from(self.failures.len()).unwrap_or(u8::MAX)
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }

    /// End the process with the failure count as its status
    pub fn exit(&self) -> ! {
        std::process::exit(i32::from(self.exit_status()))
    }
}

/// Writes progress markers while tests run and the summary at the end
pub struct Reporter {
    color: bool,
    verbose: bool,
    out: Box<dyn Write>,
}

impl Reporter {
    /// Reporter writing to stdout
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            color: config.color,
            verbose: config.verbose,
            out: Box::new(io::stdout()),
        }
    }

    /// Redirect all output
    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    pub fn test_passed(&mut self, suite: &str, test: &str, duration: Duration) {
        if self.verbose {
            let line = format!(
                "{} {} - {} ({:.2?})",
                self.paint("PASS", Color::Green),
                suite,
                test,
                duration
            );
            self.line(&line);
        } else {
            let marker = self.paint(".", Color::Green);
            self.marker(&marker);
        }
    }

    pub fn test_failed(&mut self, suite: &str, test: &str, error: &TestError) {
        if self.verbose {
            let reason = if error.is_timeout() { "timeout" } else { "error" };
            let line = format!(
                "{} {} - {} ({})",
                self.paint("FAIL", Color::Red),
                suite,
                test,
                reason
            );
            self.line(&line);
        } else {
            let marker = self.paint("F", Color::Red);
            self.marker(&marker);
        }
    }

    pub fn test_skipped(&mut self, suite: &str, test: &str) {
        if self.verbose {
            let line = format!("{} {} - {}", self.paint("SKIP", Color::Yellow), suite, test);
            self.line(&line);
        } else {
            let marker = self.paint("S", Color::Yellow);
            self.marker(&marker);
        }
    }

    /// Print the summary block
    pub fn summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        let text = self.render_summary(summary);
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    /// The summary exactly as `summary` prints it
    pub fn render_summary(&self, summary: &RunSummary) -> String {
        let mut text = String::from("\n\n");
        text.push_str(&self.paint(
            &format!(
                "{} passed ({} assertions)",
                summary.passed, summary.assertions
            ),
            Color::Green,
        ));
        if summary.skipped > 0 {
            text.push_str(" - ");
            text.push_str(&self.paint(&format!("{} skipped", summary.skipped), Color::Yellow));
        }
        if !summary.failures.is_empty() {
            text.push_str(" - ");
            text.push_str(&self.paint(
                &format!("{} failed", summary.failures.len()),
                Color::Red,
            ));
        }
        text.push_str(&format!(
            " ({:.2} ms)\n",
            summary.total_duration.as_secs_f64() * 1000.0
        ));

        for (index, failure) in summary.failures.iter().enumerate() {
            text.push('\n');
            text.push_str(&format!(
                "{}) {} - {} FAILED!\n",
                index, failure.suite, failure.test
            ));
            if let (Some(expected), Some(actual)) = (&failure.expected, &failure.actual) {
                text.push_str(&format!(
                    "   expected: {}, actual: {}\n",
                    self.paint(expected, Color::Green),
                    self.paint(actual, Color::Red)
                ));
            }
            for line in failure.stacktrace.lines() {
                text.push_str(&self.paint(&format!("   {}", line), Color::Red));
                text.push('\n');
            }
        }
        text
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn marker(&mut self, marker: &str) {
        let _ = write!(self.out, "{}", marker);
        let _ = self.out.flush();
    }

    fn line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{}", line);
    }
}
