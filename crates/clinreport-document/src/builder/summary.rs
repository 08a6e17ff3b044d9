// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Results statistics: counts and percentages per finding plus the generated
// analysis sentence.

use clinreport_core::types::{
    AudiometryFinding, EvaluatedPerson, Finding, ReportKind, Severity, SpirometryFinding,
};
use serde::Serialize;

/// How many persons received one finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingCount {
    pub finding: Finding,
    pub label: String,
    pub count: usize,
    /// Share of the total, 0-100.
    pub percent: f32,
}

/// Per-finding statistics for one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsSummary {
    pub kind: ReportKind,
    /// Every finding the kind can produce, in presentation order, zero
    /// counts included.
    pub rows: Vec<FindingCount>,
    pub total: usize,
}

impl ResultsSummary {
    pub fn from_persons(kind: ReportKind, persons: &[EvaluatedPerson]) -> Self {
        let findings: Vec<Finding> = persons.iter().map(|p| p.measurement.finding()).collect();
        let total = findings.len();
        let rows = Finding::all_for(kind)
            .into_iter()
            .map(|finding| {
                let count = findings.iter().filter(|f| **f == finding).count();
                FindingCount {
                    finding,
                    label: finding.label(),
                    count,
                    percent: percent(count, total),
                }
            })
            .collect();
        Self { kind, rows, total }
    }

    fn percent_where(&self, pred: impl Fn(&Finding) -> bool) -> f32 {
        let count = self
            .rows
            .iter()
            .filter(|r| pred(&r.finding))
            .map(|r| r.count)
            .sum();
        percent(count, self.total)
    }

    /// One-paragraph interpretation of the distribution.
    pub fn analysis_text(&self) -> String {
        if self.total == 0 {
            return "No evaluated persons were recorded for this study.".into();
        }
        match self.kind {
            ReportKind::Audiometry => {
                let normal =
                    self.percent_where(|f| *f == Finding::Audiometry(AudiometryFinding::Normal));
                let unilateral = self.percent_where(|f| {
                    *f == Finding::Audiometry(AudiometryFinding::UnilateralLoss)
                });
                let bilateral = self.percent_where(|f| {
                    *f == Finding::Audiometry(AudiometryFinding::BilateralLoss)
                });
                format!(
                    "Of the {} workers evaluated, {normal:.0}% show responses within normal limits, \
                     {unilateral:.0}% require hearing surveillance for unilateral loss and \
                     {bilateral:.0}% show bilateral loss.",
                    self.total
                )
            }
            ReportKind::Spirometry => {
                let graded = |severity: Severity| {
                    move |f: &Finding| {
                        matches!(
                            f,
                            Finding::Spirometry(
                                SpirometryFinding::Restriction(s) | SpirometryFinding::Obstruction(s)
                            ) if *s == severity
                        )
                    }
                };
                let normal =
                    self.percent_where(|f| *f == Finding::Spirometry(SpirometryFinding::Normal));
                let mild = self.percent_where(graded(Severity::Mild));
                let moderate = self.percent_where(graded(Severity::Moderate));
                let severe = self.percent_where(|f| {
                    graded(Severity::Severe)(f)
                        || *f == Finding::Spirometry(SpirometryFinding::Mixed)
                });
                format!(
                    "Of the {} spirometries performed, {normal:.0}% remain within normal parameters, \
                     {mild:.0}% show mild restriction or obstruction, {moderate:.0}% show moderate \
                     impairment and {severe:.0}% correspond to severe or mixed patterns.",
                    self.total
                )
            }
        }
    }
}

fn percent(count: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        count as f32 * 100.0 / total as f32
    }
}
