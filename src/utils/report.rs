//! Text output of a scan: a tab-separated findings table, or a condensed
//! per-category security report.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::rules::{RuleResult, Status};

pub const TABLE_HEADER: &str = "CATEGORY\tPLUGIN\t\t\t\tRESOURCE\t\t\tREGION\t\tSTATUS\tMESSAGE";

/// One line per finding, preceded by [`TABLE_HEADER`].
pub fn findings_table(results: &[RuleResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", TABLE_HEADER);
    for result in results {
        for finding in &result.output.findings {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t\t{}\t{}",
                result.rule.category,
                result.rule.title,
                finding.resource.as_deref().unwrap_or("N/A"),
                finding.region.as_deref().unwrap_or("Global"),
                finding.status.word(),
                finding.message
            );
        }
    }
    out
}

/// Condensed outcome of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Benchmark {
    Pass,
    Fail,
    Unknown,
}

impl Benchmark {
    pub fn word(self) -> &'static str {
        match self {
            Benchmark::Pass => "PASS",
            Benchmark::Fail => "FAIL",
            Benchmark::Unknown => "UNKN",
        }
    }

    /// Any unknown finding makes the rule unknown; otherwise any warning or
    /// failure fails it.
    pub fn of(statuses: impl IntoIterator<Item = Status>) -> Self {
        let mut benchmark = Benchmark::Pass;
        for status in statuses {
            match status {
                Status::Ok => {}
                Status::Warn | Status::Fail => {
                    if benchmark != Benchmark::Unknown {
                        benchmark = Benchmark::Fail;
                    }
                }
                Status::Unknown => benchmark = Benchmark::Unknown,
            }
        }
        benchmark
    }
}

/// Rules grouped by category, each with its benchmark word.
pub fn security_report(results: &[RuleResult]) -> String {
    let mut categories: BTreeMap<&str, Vec<(&str, Benchmark)>> = BTreeMap::new();
    for result in results {
        let benchmark = Benchmark::of(result.output.findings.iter().map(|f| f.status));
        categories
            .entry(result.rule.category)
            .or_default()
            .push((result.rule.title, benchmark));
    }

    let mut out = String::new();
    for (category, rules) in categories {
        let _ = writeln!(out, "\n{}", category);
        for (title, benchmark) in rules {
            let _ = writeln!(out, "     {} {}", benchmark.word(), title);
        }
    }
    out
}
