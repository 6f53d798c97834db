//! Five-factor lead scoring and tier classification.
//!
//! | Factor          | Condition                                   | Points |
//! |-----------------|---------------------------------------------|--------|
//! | Company fit     | industry listed in the ICP                  | +10    |
//! |                 | employees inside the size band              | +10    |
//! |                 | a geography token appears in the location   | +10    |
//! | Budget          | revenue at or above the revenue floor       | +15    |
//! |                 | growth indicators                           | +10    |
//! | Decision maker  | title contains "CEO", "Director" or "VP"    | +12    |
//! |                 | email contains "@"                          | +8     |
//! | Intent          | recent news                                 | +7     |
//! |                 | hiring                                      | +8     |
//! | Risk            | risk factors present                        | -5     |
//!
//! The raw sum (-5..=90) is clamped into 0..=100. Tier thresholds below are
//! calibrated against this exact table.

use chrono::NaiveDate;

use crate::models::{IcpConfig, LeadRecord, RawLead, ScoreBreakdown, ScoredLead, Tier};

const SENIOR_TITLE_MARKERS: [&str; 3] = ["CEO", "Director", "VP"];

pub const HIGH_PRIORITY_THRESHOLD: u8 = 75;
pub const QUALIFIED_THRESHOLD: u8 = 50;

/// Per-factor points for `lead` under `config`. Neither input is mutated.
pub fn score_breakdown(config: &IcpConfig, lead: &LeadRecord) -> ScoreBreakdown {
    let mut company_fit = 0;
    if config.industries.contains(&lead.industry) {
        company_fit += 10;
    }
    if config.company_size.contains(lead.employees) {
        company_fit += 10;
    }
    if config
        .geography
        .iter()
        .any(|geo| lead.location.contains(geo.as_str()))
    {
        company_fit += 10;
    }

    let mut budget = 0;
    if lead.revenue >= config.revenue.min {
        budget += 15;
    }
    if lead.signals.growth_indicators {
        budget += 10;
    }

    let mut decision_maker = 0;
    if SENIOR_TITLE_MARKERS
        .iter()
        .any(|marker| lead.contact.title.contains(marker))
    {
        decision_maker += 12;
    }
    if lead.contact.email.contains('@') {
        decision_maker += 8;
    }

    let mut intent = 0;
    if lead.signals.recent_news {
        intent += 7;
    }
    if lead.signals.hiring {
        intent += 8;
    }

    let risk = if lead.signals.risk_factors { -5 } else { 0 };

    ScoreBreakdown {
        company_fit,
        budget,
        decision_maker,
        intent,
        risk,
    }
}

/// Lead score in [0, 100].
pub fn score(config: &IcpConfig, lead: &LeadRecord) -> u8 {
    score_breakdown(config, lead).total()
}

/// Maps a score to its tier. First matching threshold wins.
///
/// Scores above 100 violate the scoring contract; debug builds assert, release
/// builds clamp.
pub fn classify(score: u8) -> Tier {
    debug_assert!(score <= 100, "score {} outside [0, 100]", score);
    let score = score.min(100);

    if score >= HIGH_PRIORITY_THRESHOLD {
        Tier::HighPriority
    } else if score >= QUALIFIED_THRESHOLD {
        Tier::Qualified
    } else {
        Tier::FollowUp
    }
}

/// Scores and classifies one lead, producing a new value.
pub fn qualify(config: &IcpConfig, lead: &LeadRecord) -> ScoredLead {
    let breakdown = score_breakdown(config, lead);
    let score = breakdown.total();
    ScoredLead {
        lead: lead.clone(),
        score,
        tier: classify(score),
        breakdown,
    }
}

/// Scores a slice of leads, preserving order.
pub fn qualify_all(config: &IcpConfig, leads: &[LeadRecord]) -> Vec<ScoredLead> {
    leads.iter().map(|lead| qualify(config, lead)).collect()
}

/// Ingests caller-supplied raw leads: ids assigned from 1, gaps filled, then scored.
pub fn score_raw_leads(config: &IcpConfig, raw: Vec<RawLead>, today: NaiveDate) -> Vec<ScoredLead> {
    raw.into_iter()
        .enumerate()
        .map(|(idx, raw_lead)| {
            let record = raw_lead.into_record(idx as u32 + 1, today);
            qualify(config, &record)
        })
        .collect()
}
