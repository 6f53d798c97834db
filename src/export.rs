//! Plain-data handoff to a spreadsheet writer.
//!
//! Rows are grouped by tier (1, 2, 3), each group sorted by score descending,
//! alongside a summary section. The bundle only carries data and the per-tier fill
//! marker. Writing a workbook is the collaborator's job.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{AggregateStats, ScoredLead, Tier};
use crate::views::{sort_by, SortKey};

/// Row fill colour for a tier, as RGB hex. Lives here, not in classification.
pub fn tier_fill(tier: Tier) -> &'static str {
    match tier {
        Tier::HighPriority => "D4EDDA",
        Tier::Qualified => "FFF3CD",
        Tier::FollowUp => "E2E3E5",
    }
}

pub const COLUMNS: [&str; 14] = [
    "Tier",
    "Score",
    "Company",
    "Domain",
    "Industry",
    "Location",
    "Employees",
    "Revenue ($M)",
    "Contact Name",
    "Title",
    "Email",
    "Profile",
    "Discovery Date",
    "Source",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub tier: String,
    pub score: u8,
    pub company: String,
    pub domain: String,
    pub industry: String,
    pub location: String,
    pub employees: u64,
    pub revenue_millions: f64,
    pub contact_name: String,
    pub title: String,
    pub email: String,
    pub profile_url: String,
    pub discovery_date: NaiveDate,
    pub source: String,
}

impl From<&ScoredLead> for ExportRow {
    fn from(scored: &ScoredLead) -> Self {
        let lead = &scored.lead;
        let domain = lead
            .contact
            .email
            .split_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
            .unwrap_or("N/A")
            .to_string();

        Self {
            tier: format!("Tier {}", scored.tier.ordinal()),
            score: scored.score,
            company: lead.company.clone(),
            domain,
            industry: lead.industry.clone(),
            location: lead.location.clone(),
            employees: lead.employees,
            revenue_millions: (lead.revenue as f64 / 10_000.0).round() / 100.0,
            contact_name: lead.contact.name.clone(),
            title: lead.contact.title.clone(),
            email: or_na(&lead.contact.email),
            profile_url: or_na(&lead.contact.profile_url),
            discovery_date: lead.discovery_date,
            source: lead.source.clone(),
        }
    }
}

fn or_na(value: &str) -> String {
    if value.is_empty() {
        "N/A".to_string()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierGroup {
    pub ordinal: u8,
    pub label: &'static str,
    pub fill: &'static str,
    pub rows: Vec<ExportRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLine {
    pub metric: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub generated_on: NaiveDate,
    pub columns: Vec<&'static str>,
    pub groups: Vec<TierGroup>,
    pub summary: Vec<SummaryLine>,
}

/// Builds the export bundle for a completed collection.
pub fn build_export(
    leads: &[ScoredLead],
    stats: &AggregateStats,
    generated_on: NaiveDate,
) -> ExportBundle {
    let by_score = sort_by(leads, Some(SortKey::Score));

    let groups = Tier::ALL
        .iter()
        .map(|tier| TierGroup {
            ordinal: tier.ordinal(),
            label: tier.label(),
            fill: tier_fill(*tier),
            rows: by_score
                .iter()
                .filter(|l| l.tier == *tier)
                .map(ExportRow::from)
                .collect(),
        })
        .collect();

    let line = |metric: String, value: String| SummaryLine { metric, value };
    let mut summary = vec![line(
        "Total Leads Discovered".to_string(),
        stats.total.to_string(),
    )];
    for tier in Tier::ALL {
        summary.push(line(
            format!("Tier {} ({})", tier.ordinal(), tier.label()),
            format!(
                "{} ({}%)",
                stats.count_for(tier),
                stats.percentage_for(tier)
            ),
        ));
    }
    summary.push(line(
        "Average Lead Score".to_string(),
        stats.average_score.to_string(),
    ));
    summary.push(line(
        "Discovery Date".to_string(),
        generated_on.format("%Y-%m-%d").to_string(),
    ));

    ExportBundle {
        generated_on,
        columns: COLUMNS.to_vec(),
        groups,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::{FixedSignals, LeadSource, SyntheticLeadSource};
    use crate::models::{IcpConfig, Signals};
    use crate::scoring::qualify_all;
    use crate::views::aggregate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn collection() -> Vec<ScoredLead> {
        let signals = Signals {
            growth_indicators: true,
            ..Signals::default()
        };
        let leads = SyntheticLeadSource::new(FixedSignals(signals), "Web Search")
            .discover(date())
            .unwrap();
        qualify_all(&IcpConfig::default(), &leads)
    }

    #[test]
    fn test_groups_cover_every_lead_in_tier_order() {
        let leads = collection();
        let bundle = build_export(&leads, &aggregate(&leads), date());

        assert_eq!(
            bundle.groups.iter().map(|g| g.ordinal).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let rows: usize = bundle.groups.iter().map(|g| g.rows.len()).sum();
        assert_eq!(rows, leads.len());

        for group in &bundle.groups {
            assert!(group
                .rows
                .windows(2)
                .all(|pair| pair[0].score >= pair[1].score));
        }
    }

    #[test]
    fn test_row_fields() {
        let leads = collection();
        let row = ExportRow::from(&leads[0]);

        assert_eq!(row.domain, "techforgegmbh.com");
        assert_eq!(row.revenue_millions, 45.0);
        assert_eq!(row.tier, format!("Tier {}", leads[0].tier.ordinal()));
    }

    #[test]
    fn test_missing_email_exports_na() {
        let mut leads = collection();
        leads[0].lead.contact.email = String::new();
        let row = ExportRow::from(&leads[0]);
        assert_eq!(row.domain, "N/A");
        assert_eq!(row.email, "N/A");
    }

    #[test]
    fn test_summary_lines() {
        let leads = collection();
        let stats = aggregate(&leads);
        let bundle = build_export(&leads, &stats, date());

        assert_eq!(bundle.summary.len(), 6);
        assert_eq!(bundle.summary[0].value, "10");
        assert_eq!(bundle.summary[5].value, "2024-06-03");
    }

    #[test]
    fn test_tier_fill_markers() {
        assert_eq!(tier_fill(Tier::HighPriority), "D4EDDA");
        assert_eq!(tier_fill(Tier::FollowUp), "E2E3E5");
    }
}
