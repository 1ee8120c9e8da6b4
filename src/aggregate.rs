//! Post-processing of check results: per-rule counts, merged non-compliant ranges and a
//! staffing recommendation derived from the slices' detail lines.

use crate::model::{DayResult, Flag, Rule, Slice, ThreeUursSummary};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use time::macros::format_description;
use time::Time;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlagCounts {
    pub yes: usize,
    pub no: usize,
}

/// Count `Yes` and `No` verdicts for `rule`; other values are ignored.
pub fn count_flags(slices: &[Slice], rule: Rule) -> FlagCounts {
    slices
        .iter()
        .fold(FlagCounts::default(), |mut acc, s| {
            match s.flag(rule) {
                Flag::Yes => acc.yes += 1,
                Flag::No => acc.no += 1,
                Flag::NotApplicable => {}
            }
            acc
        })
}

/// A run of adjacent slices that fail the same rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonCompliantRange {
    pub rule: Rule,
    pub from: String,
    pub to: String,
    pub slices: usize,
    pub details: Vec<String>,
    pub shortfall: Option<i64>,
}

impl NonCompliantRange {
    fn start(rule: Rule, slice: &Slice) -> Self {
        let mut range = Self {
            rule,
            from: slice.from.clone(),
            to: slice.to.clone(),
            slices: 0,
            details: Vec::new(),
            shortfall: None,
        };
        range.absorb(slice);
        range
    }

    fn absorb(&mut self, slice: &Slice) {
        self.to = slice.to.clone();
        self.slices += 1;
        for line in &slice.details {
            if !self.details.iter().any(|d| d == line) {
                self.details.push(line.clone());
            }
        }
        self.shortfall = match (self.shortfall, shortfall(slice)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    pub fn recommendation(&self) -> String {
        match self.shortfall {
            Some(1) => format!("Add 1 staff member between {} and {}", self.from, self.to),
            Some(n) => format!("Add {n} staff members between {} and {}", self.from, self.to),
            None => format!("Review staffing between {} and {}", self.from, self.to),
        }
    }
}

fn parse_clock(raw: &str) -> Option<Time> {
    let raw = raw.trim();
    Time::parse(raw, format_description!("[hour padding:none]:[minute]:[second]"))
        .or_else(|_| Time::parse(raw, format_description!("[hour padding:none]:[minute]")))
        .ok()
}

/// Whether a slice ending at `to` is directly followed by one starting at `from`.
fn is_contiguous(to: &str, from: &str) -> bool {
    match (parse_clock(to), parse_clock(from)) {
        (Some(a), Some(b)) => a == b,
        _ => to.trim() == from.trim(),
    }
}

/// Merge adjacent slices failing `rule` into ranges. A compliant slice or a time gap ends a range.
pub fn merge_non_compliant(slices: &[Slice], rule: Rule) -> Vec<NonCompliantRange> {
    let mut ranges: Vec<NonCompliantRange> = Vec::new();
    let mut open = false;
    for slice in slices {
        if slice.flag(rule) != Flag::No {
            open = false;
            continue;
        }
        match ranges.last_mut() {
            Some(current) if open && is_contiguous(&current.to, &slice.from) => {
                current.absorb(slice)
            }
            _ => ranges.push(NonCompliantRange::start(rule, slice)),
        }
        open = true;
    }
    ranges
}

fn shortage_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)\b(?:short|shortage|tekort|missing|lacking)(?:\s+(?:by|of|van))?\s*:?\s*",
            r"(?P<post>\d+)(?P<clock>:\d{2})?",
            r"|(?:^|[^\d:])(?P<pre>\d+)",
            r"(?:\s+(?:more|extra|additional|missing)\b|(?:\s+[^\s\d]\S*)?\s+tekort\b)",
        ))
        .expect("static regex")
    })
}

/// Staff shortage of one slice, from its detail lines or else from the staff columns.
pub fn shortfall(slice: &Slice) -> Option<i64> {
    let from_details = slice
        .details
        .iter()
        .flat_map(|line| shortage_regex().captures_iter(line))
        // "Shortage 07:00-07:15" names a time, not a head count.
        .filter(|c| c.name("clock").is_none())
        .filter_map(|c| {
            c.name("pre")
                .or_else(|| c.name("post"))
                .and_then(|m| m.as_str().parse::<i64>().ok())
        })
        .max();
    if from_details.is_some() {
        return from_details;
    }
    match (slice.required_staff, slice.staff) {
        (Some(required), Some(present)) if required > present => Some(required - present),
        _ => None,
    }
}

/// Rules reported by the slices. BKR is always checked.
pub fn rules_present(slices: &[Slice]) -> Vec<Rule> {
    let mut rules = vec![Rule::Bkr];
    for rule in [Rule::Vgc, Rule::ThreeUurs] {
        if slices.iter().any(|s| s.flag(rule) != Flag::NotApplicable) {
            rules.push(rule);
        }
    }
    rules
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    pub rule: Rule,
    pub counts: FlagCounts,
    pub ranges: Vec<NonCompliantRange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub day: String,
    pub rules: Vec<RuleSummary>,
    pub three_uurs: Option<ThreeUursSummary>,
}

impl DaySummary {
    pub fn ranges(&self) -> impl Iterator<Item = &NonCompliantRange> {
        self.rules.iter().flat_map(|r| r.ranges.iter())
    }
}

pub fn summarize(day: &DayResult, rules: &[Rule]) -> DaySummary {
    DaySummary {
        day: day.day.clone(),
        rules: rules
            .iter()
            .map(|&rule| RuleSummary {
                rule,
                counts: count_flags(&day.slices, rule),
                ranges: merge_non_compliant(&day.slices, rule),
            })
            .collect(),
        three_uurs: day.three_uurs_summary.clone(),
    }
}
