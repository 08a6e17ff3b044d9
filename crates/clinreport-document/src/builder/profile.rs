// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Company profile page and the technical team section.

use clinreport_core::types::{ReportMetadata, TeamMember};
use tracing::debug;

use super::layout::{BODY, LABEL, MARGIN_LEFT_MM, Sheet, or_na, wrap_text};
use super::sections::{
    BODY_LINE_MM, SECTION_GAP_MM, SECTION_HEADING_MM, format_date, section_heading,
};
use crate::page::{TextAlign, chars_per_width};

pub(crate) const COMPANY_PROFILE: &str = "COMPANY PROFILE";
pub(crate) const TECHNICAL_TEAM: &str = "TECHNICAL TEAM";

const FIELD_MM: f32 = 9.0;
const VALUE_X_MM: f32 = 70.0;
const NAME_MM: f32 = 7.0;
const MEMBER_GAP_MM: f32 = 4.0;

/// Page 3: who was evaluated, where and when.
pub(crate) fn layout_company_profile(sheet: &mut Sheet, metadata: &ReportMetadata) {
    sheet.start_page();
    section_heading(sheet, COMPANY_PROFILE);
    sheet.advance(4.0);

    let profile = &metadata.profile;
    let study_dates = if profile.study_dates.trim().is_empty() {
        format_date(metadata.issue_date)
    } else {
        profile.study_dates.clone()
    };
    let mut fields = vec![
        ("Company:", or_na(&metadata.company).to_string()),
        ("Site:", or_na(&metadata.site).to_string()),
        ("Activity:", or_na(&profile.activity).to_string()),
        ("Country:", or_na(&profile.country).to_string()),
    ];
    if !profile.counterpart.trim().is_empty() {
        fields.push(("Counterpart:", profile.counterpart.clone()));
        fields.push(("Role:", or_na(&profile.counterpart_role).to_string()));
    }
    fields.push(("Study dates:", study_dates));
    fields.push(("Study:", metadata.kind.heading().to_string()));

    let value_width = sheet.content_width_mm() - VALUE_X_MM;
    let max_chars = chars_per_width(value_width, BODY.size_pt);
    for (label, value) in fields {
        let baseline = sheet.cursor_mm() + 6.0;
        sheet.text_at(label, MARGIN_LEFT_MM, baseline, TextAlign::Left, LABEL);
        let lines = wrap_text(&value, max_chars);
        let extra = lines.len().saturating_sub(1) as f32 * BODY_LINE_MM;
        for (i, line) in lines.into_iter().enumerate() {
            sheet.text_at(
                line,
                MARGIN_LEFT_MM + VALUE_X_MM,
                baseline + i as f32 * BODY_LINE_MM,
                TextAlign::Left,
                BODY,
            );
        }
        sheet.advance(FIELD_MM + extra);
    }
}

fn member_height(member: &TeamMember) -> f32 {
    NAME_MM + member.details.len() as f32 * BODY_LINE_MM + MEMBER_GAP_MM
}

/// Technical team after the results summary. A member's lines are never
/// split across pages. Returns the 1-based page holding the heading.
pub(crate) fn layout_technical_team(sheet: &mut Sheet, team: &[TeamMember]) -> usize {
    let total: f32 = team.iter().map(member_height).sum();
    if sheet.fits(SECTION_GAP_MM + SECTION_HEADING_MM + total) {
        sheet.advance(SECTION_GAP_MM);
    } else {
        sheet.start_page();
    }
    section_heading(sheet, TECHNICAL_TEAM);
    let start = sheet.page_count();

    for member in team {
        if !sheet.fits(member_height(member)) {
            sheet.start_page();
            section_heading(sheet, &format!("{TECHNICAL_TEAM} (continued)"));
        }
        sheet.line(
            member.name.trim(),
            MARGIN_LEFT_MM,
            TextAlign::Left,
            LABEL,
            NAME_MM,
        );
        for detail in &member.details {
            sheet.line(
                detail.trim(),
                MARGIN_LEFT_MM,
                TextAlign::Left,
                BODY,
                BODY_LINE_MM,
            );
        }
        sheet.advance(MEMBER_GAP_MM);
    }
    debug!(members = team.len(), "Technical team laid out");
    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageSize;

    fn sheet() -> Sheet {
        let mut sheet = Sheet::new(PageSize {
            width_mm: 279.4,
            height_mm: 215.9,
        });
        sheet.start_page();
        sheet
    }

    #[test]
    fn members_are_never_split() {
        let team: Vec<TeamMember> = (0..12)
            .map(|i| TeamMember {
                name: format!("Member {i}"),
                details: vec!["Profession".into(), "Registry".into(), "Licence".into()],
            })
            .collect();
        let mut sheet = sheet();
        let start = layout_technical_team(&mut sheet, &team);
        let pages = sheet.into_pages();
        assert_eq!(start, 2, "the heading moves to a fresh page");
        assert!(pages.len() > 2);
        for page in &pages {
            let text = page.text();
            let names = text.matches("Member ").count();
            assert_eq!(text.matches("Licence").count(), names);
        }
        assert!(pages[2].text().contains("TECHNICAL TEAM (continued)"));
    }

    #[test]
    fn short_team_shares_the_page() {
        let team = vec![TeamMember {
            name: "Dr. Example".into(),
            details: vec!["Audiologist".into()],
        }];
        let mut sheet = sheet();
        assert_eq!(layout_technical_team(&mut sheet, &team), 1);
        assert_eq!(sheet.page_count(), 1);
    }
}
