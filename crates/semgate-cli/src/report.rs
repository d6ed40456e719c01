// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Demo reports, rendered for people or as JSON.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::OutputFormat;
use crate::error::CliError;
use crate::output;

/// Schema version of the JSON report.
pub const REPORT_VERSION: u32 = 1;

/// Outcome of one demo run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub version: u32,
    pub demo: &'static str,
    /// Every check passed.
    pub success: bool,
    pub elapsed_ms: u128,
    /// Measured values, keyed by name.
    pub facts: Map<String, Value>,
    pub checks: Vec<Check>,
}

/// A property the run is expected to uphold.
#[derive(Debug, Serialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
}

impl Report {
    pub fn new(demo: &'static str, elapsed: Duration) -> Self {
        Self {
            version: REPORT_VERSION,
            demo,
            success: true,
            elapsed_ms: elapsed.as_millis(),
            facts: Map::new(),
            checks: Vec::new(),
        }
    }

    pub fn fact(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.facts.insert(key.to_string(), value.into());
        self
    }

    pub fn check(mut self, name: impl Into<String>, passed: bool) -> Self {
        self.success &= passed;
        self.checks.push(Check {
            name: name.into(),
            passed,
        });
        self
    }

    pub fn failed_checks(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn render(&self, format: OutputFormat) -> Result<String, CliError> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Human => Ok(self.render_human()),
        }
    }

    fn render_human(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.facts {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!("  {}: {}\n", output::key(key), value));
        }
        out.push('\n');
        for check in &self.checks {
            let mark = if check.passed {
                output::status_pass()
            } else {
                output::status_fail()
            };
            out.push_str(&format!("  {} {}\n", mark, check.name));
        }
        out.push('\n');
        let banner = if self.success {
            output::banner_ok(self.demo)
        } else {
            output::banner_fail(self.demo, self.failed_checks())
        };
        out.push_str(&format!(
            "{} {}",
            banner,
            output::note(&format!("({} ms)", self.elapsed_ms))
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        Report::new("bank", Duration::from_millis(12))
            .fact("total", 1000)
            .check("money is conserved", true)
    }

    #[test]
    fn one_failed_check_fails_the_report() {
        let report = sample().check("finished in time", false);
        assert!(!report.success);
        assert_eq!(report.failed_checks(), 1);
    }

    #[test]
    fn json_carries_facts_and_checks() {
        let json = sample().render(OutputFormat::Json).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["demo"], "bank");
        assert_eq!(value["success"], true);
        assert_eq!(value["facts"]["total"], 1000);
        assert_eq!(value["checks"][0]["name"], "money is conserved");
    }

    #[test]
    fn human_output_lists_checks() {
        colored::control::set_override(false);
        let text = sample().render(OutputFormat::Human).unwrap();
        assert!(text.contains("✓ money is conserved"));
        assert!(text.contains("bank OK"));
    }
}
