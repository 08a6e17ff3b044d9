// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: report metadata, evaluated persons, measurements and
// their clinical classification, paper geometry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The closed set of report kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Audiometry,
    Spirometry,
}

impl ReportKind {
    /// Upper-case study name used in headings ("AUDIOMETRY").
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Audiometry => "AUDIOMETRY",
            Self::Spirometry => "SPIROMETRY",
        }
    }

    /// Plural test label used in running text ("audiometries").
    pub fn tests_label(&self) -> &'static str {
        match self {
            Self::Audiometry => "audiometries",
            Self::Spirometry => "spirometries",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audiometry => f.write_str("audiometry"),
            Self::Spirometry => f.write_str("spirometry"),
        }
    }
}

/// Who performed and signs the evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorIdentity {
    pub name: String,
    /// e.g. "Respiratory therapist".
    #[serde(default)]
    pub profession: String,
    /// Professional registry number.
    #[serde(default)]
    pub registry: String,
}

/// Report-level metadata. Immutable once handed to the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub report_id: String,
    pub kind: ReportKind,
    /// Issuing institution shown in the page-1 header.
    pub institution: String,
    pub company: String,
    /// Site, plant or location of the occupational study.
    pub site: String,
    pub evaluator: EvaluatorIdentity,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub conclusions: String,
    #[serde(default)]
    pub recommendations: String,
    #[serde(default)]
    pub profile: CompanyProfile,
    /// Shown on the technical team page; the evaluator alone when empty.
    #[serde(default)]
    pub technical_team: Vec<TeamMember>,
}

impl ReportMetadata {
    /// The technical team, falling back to the evaluator.
    pub fn team(&self) -> Vec<TeamMember> {
        let named: Vec<TeamMember> = self
            .technical_team
            .iter()
            .filter(|m| !m.name.trim().is_empty())
            .cloned()
            .collect();
        if !named.is_empty() {
            return named;
        }
        let evaluator = &self.evaluator;
        vec![TeamMember {
            name: evaluator.name.clone(),
            details: [&evaluator.profession, &evaluator.registry]
                .into_iter()
                .filter(|d| !d.trim().is_empty())
                .cloned()
                .collect(),
        }]
    }
}

/// The evaluated company as shown on the company profile page.
/// Blank fields print as "N/A".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyProfile {
    /// Main economic activity.
    pub activity: String,
    pub country: String,
    /// Free text such as "12-14 March 2026"; the issue date when blank.
    pub study_dates: String,
    /// Technical counterpart on the company side.
    pub counterpart: String,
    pub counterpart_role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    /// Profession, role, licence and similar lines.
    #[serde(default)]
    pub details: Vec<String>,
}

/// Ear side for an audiometric threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ear {
    Right,
    Left,
}

/// A single pure-tone threshold reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdReading {
    pub ear: Ear,
    pub frequency_hz: u32,
    /// Hearing level in dB HL.
    pub level_db: i32,
}

/// Frequencies averaged into the pure-tone average.
pub const PTA_FREQUENCIES_HZ: [u32; 4] = [500, 1000, 2000, 4000];

/// Highest threshold (dB HL) still considered within normal limits.
pub const NORMAL_HEARING_LIMIT_DB: i32 = 25;

/// Audiometric payload: thresholds per frequency and ear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudiometryResult {
    pub thresholds: Vec<ThresholdReading>,
}

impl AudiometryResult {
    /// Pure-tone average for one ear over [`PTA_FREQUENCIES_HZ`], or `None`
    /// when none of those frequencies were measured.
    pub fn pure_tone_average(&self, ear: Ear) -> Option<f32> {
        let levels: Vec<i32> = self
            .thresholds
            .iter()
            .filter(|r| r.ear == ear && PTA_FREQUENCIES_HZ.contains(&r.frequency_hz))
            .map(|r| r.level_db)
            .collect();
        if levels.is_empty() {
            return None;
        }
        Some(levels.iter().sum::<i32>() as f32 / levels.len() as f32)
    }

    fn ear_has_loss(&self, ear: Ear) -> bool {
        self.thresholds
            .iter()
            .any(|r| r.ear == ear && r.level_db > NORMAL_HEARING_LIMIT_DB)
    }

    /// Classify the result.
    pub fn finding(&self) -> AudiometryFinding {
        match (self.ear_has_loss(Ear::Right), self.ear_has_loss(Ear::Left)) {
            (false, false) => AudiometryFinding::Normal,
            (true, true) => AudiometryFinding::BilateralLoss,
            _ => AudiometryFinding::UnilateralLoss,
        }
    }
}

/// Spirometric payload: volumes and percentages of predicted values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpirometryResult {
    pub fvc_liters: f32,
    pub fev1_liters: f32,
    pub fvc_percent_predicted: f32,
    pub fev1_percent_predicted: f32,
}

/// FEV1/FVC below this ratio indicates obstruction.
pub const OBSTRUCTION_RATIO: f32 = 0.70;

/// FVC % predicted below this value indicates restriction.
pub const RESTRICTION_FVC_PERCENT: f32 = 80.0;

impl SpirometryResult {
    /// FEV1/FVC ratio.
    pub fn ratio(&self) -> f32 {
        if self.fvc_liters > 0.0 {
            self.fev1_liters / self.fvc_liters
        } else {
            0.0
        }
    }

    /// Classify the result.
    pub fn finding(&self) -> SpirometryFinding {
        let obstructed = self.ratio() < OBSTRUCTION_RATIO;
        let restricted = self.fvc_percent_predicted < RESTRICTION_FVC_PERCENT;
        match (obstructed, restricted) {
            (false, false) => SpirometryFinding::Normal,
            (true, true) => SpirometryFinding::Mixed,
            (true, false) => SpirometryFinding::Obstruction(Severity::from_percent(
                self.fev1_percent_predicted,
                70.0,
            )),
            (false, true) => SpirometryFinding::Restriction(Severity::from_percent(
                self.fvc_percent_predicted,
                65.0,
            )),
        }
    }

    /// Whether every value is a positive finite number.
    pub fn is_well_formed(&self) -> bool {
        [
            self.fvc_liters,
            self.fev1_liters,
            self.fvc_percent_predicted,
            self.fev1_percent_predicted,
        ]
        .iter()
        .all(|v| v.is_finite() && *v > 0.0)
    }
}

/// Kind-specific measurement payload. The variant must match the report kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    Audiometry(AudiometryResult),
    Spirometry(SpirometryResult),
}

impl Measurement {
    /// The report kind this payload belongs to.
    pub fn kind(&self) -> ReportKind {
        match self {
            Self::Audiometry(_) => ReportKind::Audiometry,
            Self::Spirometry(_) => ReportKind::Spirometry,
        }
    }

    /// Clinical classification of the payload.
    pub fn finding(&self) -> Finding {
        match self {
            Self::Audiometry(result) => Finding::Audiometry(result.finding()),
            Self::Spirometry(result) => Finding::Spirometry(result.finding()),
        }
    }
}

/// One evaluated person (one table row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedPerson {
    pub full_name: String,
    pub identification: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub department: String,
    pub measurement: Measurement,
    #[serde(default)]
    pub observations: String,
}

/// Severity grade shared by spirometric findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Grade a percent-of-predicted value: `>= mild_floor` is mild, `>= 50`
    /// moderate, anything lower severe.
    fn from_percent(percent: f32, mild_floor: f32) -> Self {
        if percent >= mild_floor {
            Self::Mild
        } else if percent >= 50.0 {
            Self::Moderate
        } else {
            Self::Severe
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudiometryFinding {
    Normal,
    UnilateralLoss,
    BilateralLoss,
}

impl AudiometryFinding {
    pub const ALL: [AudiometryFinding; 3] = [Self::Normal, Self::UnilateralLoss, Self::BilateralLoss];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpirometryFinding {
    Normal,
    Restriction(Severity),
    Obstruction(Severity),
    Mixed,
}

impl SpirometryFinding {
    pub const ALL: [SpirometryFinding; 8] = [
        Self::Normal,
        Self::Restriction(Severity::Mild),
        Self::Restriction(Severity::Moderate),
        Self::Restriction(Severity::Severe),
        Self::Obstruction(Severity::Mild),
        Self::Obstruction(Severity::Moderate),
        Self::Obstruction(Severity::Severe),
        Self::Mixed,
    ];
}

/// Classification of one person's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "finding", rename_all = "snake_case")]
pub enum Finding {
    Audiometry(AudiometryFinding),
    Spirometry(SpirometryFinding),
}

impl Finding {
    /// Every finding a report of `kind` can contain, in presentation order.
    pub fn all_for(kind: ReportKind) -> Vec<Finding> {
        match kind {
            ReportKind::Audiometry => AudiometryFinding::ALL
                .iter()
                .copied()
                .map(Finding::Audiometry)
                .collect(),
            ReportKind::Spirometry => SpirometryFinding::ALL
                .iter()
                .copied()
                .map(Finding::Spirometry)
                .collect(),
        }
    }

    /// Upper-case label shown in the result column.
    pub fn label(&self) -> String {
        match self {
            Self::Audiometry(AudiometryFinding::Normal) => "NORMAL".into(),
            Self::Audiometry(AudiometryFinding::UnilateralLoss) => "UNILATERAL LOSS".into(),
            Self::Audiometry(AudiometryFinding::BilateralLoss) => "BILATERAL LOSS".into(),
            Self::Spirometry(SpirometryFinding::Normal) => "NORMAL".into(),
            Self::Spirometry(SpirometryFinding::Mixed) => "MIXED PATTERN".into(),
            Self::Spirometry(SpirometryFinding::Restriction(s)) => {
                format!("{} RESTRICTION", s.label().to_uppercase())
            }
            Self::Spirometry(SpirometryFinding::Obstruction(s)) => {
                format!("{} OBSTRUCTION", s.label().to_uppercase())
            }
        }
    }

    /// 0 = normal, 1 = mild, 2 = moderate, 3 = severe. Drives cell tinting.
    pub fn severity_rank(&self) -> u8 {
        match self {
            Self::Audiometry(AudiometryFinding::Normal)
            | Self::Spirometry(SpirometryFinding::Normal) => 0,
            Self::Audiometry(AudiometryFinding::UnilateralLoss) => 1,
            Self::Audiometry(AudiometryFinding::BilateralLoss) => 2,
            Self::Spirometry(SpirometryFinding::Restriction(s))
            | Self::Spirometry(SpirometryFinding::Obstruction(s)) => match s {
                Severity::Mild => 1,
                Severity::Moderate => 2,
                Severity::Severe => 3,
            },
            Self::Spirometry(SpirometryFinding::Mixed) => 3,
        }
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperSize {
    A4,
    Letter,
    Legal,
    Custom { width_mm: f32, height_mm: f32 },
}

impl PaperSize {
    /// Portrait dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::Letter => (215.9, 279.4),
            Self::Legal => (215.9, 355.6),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Concrete page dimensions in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PageGeometry {
    pub fn new(paper: PaperSize, orientation: Orientation) -> Self {
        let (w, h) = paper.dimensions_mm();
        let (short, long) = if w <= h { (w, h) } else { (h, w) };
        match orientation {
            Orientation::Portrait => Self {
                width_mm: short,
                height_mm: long,
            },
            Orientation::Landscape => Self {
                width_mm: long,
                height_mm: short,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ear: Ear, frequency_hz: u32, level_db: i32) -> ThresholdReading {
        ThresholdReading {
            ear,
            frequency_hz,
            level_db,
        }
    }

    fn spiro(fvc: f32, fev1: f32, fvc_pct: f32, fev1_pct: f32) -> SpirometryResult {
        SpirometryResult {
            fvc_liters: fvc,
            fev1_liters: fev1,
            fvc_percent_predicted: fvc_pct,
            fev1_percent_predicted: fev1_pct,
        }
    }

    #[test]
    fn audiometry_classification() {
        let normal = AudiometryResult {
            thresholds: vec![reading(Ear::Right, 1000, 10), reading(Ear::Left, 1000, 20)],
        };
        assert_eq!(normal.finding(), AudiometryFinding::Normal);

        let unilateral = AudiometryResult {
            thresholds: vec![reading(Ear::Right, 4000, 40), reading(Ear::Left, 4000, 15)],
        };
        assert_eq!(unilateral.finding(), AudiometryFinding::UnilateralLoss);

        let bilateral = AudiometryResult {
            thresholds: vec![reading(Ear::Right, 4000, 40), reading(Ear::Left, 6000, 35)],
        };
        assert_eq!(bilateral.finding(), AudiometryFinding::BilateralLoss);
    }

    #[test]
    fn pure_tone_average_ignores_other_frequencies() {
        let result = AudiometryResult {
            thresholds: vec![
                reading(Ear::Right, 500, 10),
                reading(Ear::Right, 1000, 20),
                reading(Ear::Right, 8000, 90),
            ],
        };
        assert_eq!(result.pure_tone_average(Ear::Right), Some(15.0));
        assert_eq!(result.pure_tone_average(Ear::Left), None);
    }

    #[test]
    fn spirometry_classification() {
        assert_eq!(spiro(4.0, 3.3, 95.0, 92.0).finding(), SpirometryFinding::Normal);
        assert_eq!(
            spiro(4.0, 2.4, 90.0, 72.0).finding(),
            SpirometryFinding::Obstruction(Severity::Mild)
        );
        assert_eq!(
            spiro(2.5, 2.2, 55.0, 60.0).finding(),
            SpirometryFinding::Restriction(Severity::Moderate)
        );
        assert_eq!(spiro(2.5, 1.2, 60.0, 45.0).finding(), SpirometryFinding::Mixed);
    }

    #[test]
    fn measurement_kind_matches_variant() {
        let m = Measurement::Spirometry(spiro(4.0, 3.3, 95.0, 92.0));
        assert_eq!(m.kind(), ReportKind::Spirometry);
        assert_eq!(m.finding().label(), "NORMAL");
    }

    #[test]
    fn landscape_geometry_swaps_dimensions() {
        let g = PageGeometry::new(PaperSize::Letter, Orientation::Landscape);
        assert!(g.width_mm > g.height_mm);
        assert_eq!(g.width_mm, 279.4);
    }

    #[test]
    fn every_finding_is_listed_for_its_kind() {
        let all = Finding::all_for(ReportKind::Spirometry);
        assert_eq!(all.len(), SpirometryFinding::ALL.len());
        assert!(all.contains(&Finding::Spirometry(SpirometryFinding::Mixed)));
        assert_eq!(Finding::all_for(ReportKind::Audiometry).len(), 3);
    }

    fn metadata_json(team: &str) -> String {
        format!(
            r#"{{
                "report_id": "A-1",
                "kind": "audiometry",
                "institution": "Clinic",
                "company": "Acme",
                "site": "Plant",
                "evaluator": {{ "name": "Dr. Ear", "profession": "Audiologist" }},
                "issue_date": "2026-04-02"{team}
            }}"#
        )
    }

    #[test]
    fn team_falls_back_to_the_evaluator() {
        let meta: ReportMetadata = serde_json::from_str(&metadata_json("")).unwrap();
        assert_eq!(meta.profile, CompanyProfile::default());
        let team = meta.team();
        assert_eq!(team.len(), 1);
        assert_eq!(team[0].name, "Dr. Ear");
        assert_eq!(team[0].details, vec!["Audiologist"]);
    }

    #[test]
    fn named_team_members_replace_the_evaluator() {
        let json = metadata_json(
            r#", "technical_team": [{ "name": "  " }, { "name": "Tech A", "details": ["Nurse"] }]"#,
        );
        let meta: ReportMetadata = serde_json::from_str(&json).unwrap();
        let names: Vec<String> = meta.team().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Tech A"]);
    }
}
