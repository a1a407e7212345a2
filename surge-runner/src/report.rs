//! Summary statistics of one measurement

use std::fmt;
use std::time::Duration;
use surge_http::HttpError;

use crate::error::WorkError;

/// Durations and errors collected for one measurement
#[derive(Debug, Clone, Default)]
pub struct TestResult {
    description: String,
    show_all_errors: bool,
    values: Vec<Duration>,
    errors: Vec<String>,
}

impl TestResult {
    pub fn new(description: impl Into<String>, show_all_errors: bool) -> Self {
        Self {
            description: description.into(),
            show_all_errors,
            values: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn add(&mut self, value: Duration) {
        self.values.push(value);
    }

    pub fn add_error(&mut self, error: impl fmt::Display) {
        self.errors.push(error.to_string());
    }

    /// Add one outcome of a fan-out; cancellations are not counted
    pub fn record(&mut self, result: Result<Duration, WorkError<HttpError>>) {
        match result {
            Ok(value) => self.add(value),
            Err(error) if error.is_cancelled() => {}
            Err(error) => self.add_error(error),
        }
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn min(&self) -> Duration {
        self.values.iter().min().copied().unwrap_or_default()
    }

    pub fn max(&self) -> Duration {
        self.values.iter().max().copied().unwrap_or_default()
    }

    /// Zero without samples
    pub fn mean(&self) -> Duration {
        if self.values.is_empty() {
            return Duration::ZERO;
        }
        let total: u128 = self.values.iter().map(Duration::as_nanos).sum();
        let mean = total / self.values.len() as u128;
        Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX))
    }

    /// Render the report, durations truncated to whole milliseconds
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.description)?;
        writeln!(f, "count: {}", self.count())?;
        writeln!(f, "min: {}ms", self.min().as_millis())?;
        writeln!(f, "max: {}ms", self.max().as_millis())?;
        writeln!(f, "mean: {}ms", self.mean().as_millis())?;

        if self.errors.is_empty() {
            return Ok(());
        }
        writeln!(f, "error count: {}", self.errors.len())?;
        if self.show_all_errors {
            for (i, error) in self.errors.iter().enumerate() {
                writeln!(f, "{:3} error: {}", i + 1, error)?;
            }
        } else {
            writeln!(f, "first error: {}", self.errors[0])?;
        }
        Ok(())
    }
}
