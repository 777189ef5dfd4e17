//! Best-effort progress tracking from trainer console output.
//!
//! The trainer's output format is not a contract, so nothing here is
//! allowed to fail: lines that do not match are simply ignored. Model
//! selection follows the dev F1; a test F1 only counts when it appears on
//! the same line as a new best dev F1.

use regex::Regex;

use crate::error::Result;

#[derive(Debug)]
pub struct ProgressTracker {
    epoch_re: Regex,
    dev_f1_re: Regex,
    test_f1_re: Regex,
    last_epoch: Option<u32>,
    best_f1: Option<f64>,
    test_f1: Option<f64>,
}

fn first_number(re: &Regex, line: &str) -> Option<f64> {
    re.captures(line).and_then(|c| c[1].parse::<f64>().ok())
}

impl ProgressTracker {
    pub fn new() -> Result<Self> {
        Ok(Self {
            epoch_re: Regex::new(r"(?i)\bepoch\b\s*[:=]?\s*(\d+)")?,
            dev_f1_re: Regex::new(r"(?i)\b(?:dev\s+f1|f1\s+on\s+dev)\b[^\d\n]{0,24}(\d+(?:\.\d+)?)")?,
            test_f1_re: Regex::new(
                r"(?i)\b(?:test\s+f1|f1\s+on\s+test)\b[^\d\n]{0,24}(\d+(?:\.\d+)?)",
            )?,
            last_epoch: None,
            best_f1: None,
            test_f1: None,
        })
    }

    /// Feed one line of trainer output.
    pub fn observe(&mut self, line: &str) {
        if let Some(epoch) = self
            .epoch_re
            .captures(line)
            .and_then(|c| c[1].parse::<u32>().ok())
        {
            self.last_epoch = Some(epoch);
        }

        if let Some(f1) = first_number(&self.dev_f1_re, line) {
            if self.best_f1.is_none_or(|best| f1 > best) {
                self.best_f1 = Some(f1);
                self.test_f1 = first_number(&self.test_f1_re, line);
            }
        }
    }

    pub fn last_epoch(&self) -> Option<u32> {
        self.last_epoch
    }

    /// Best dev F1 seen so far.
    pub fn best_f1(&self) -> Option<f64> {
        self.best_f1
    }

    /// Test F1 reported alongside the best dev F1.
    pub fn test_f1(&self) -> Option<f64> {
        self.test_f1
    }
}
