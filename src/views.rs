//! Read-only queries over a lead collection: filter by tier, sort, aggregate.
//!
//! Nothing here is cached; callers re-run the query on every parameter change.

use std::str::FromStr;

use crate::errors::AppError;
use crate::models::{AggregateStats, IndustryCount, ScoredLead, Tier};

/// Which tiers a filter lets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierFilter {
    #[default]
    All,
    Only(Tier),
}

impl FromStr for TierFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(TierFilter::All);
        }
        s.parse::<u8>()
            .ok()
            .and_then(Tier::from_ordinal)
            .map(TierFilter::Only)
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "tier must be one of all, 1, 2, 3 (got '{}')",
                    s
                ))
            })
    }
}

/// Numeric field to sort by, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Score,
    Revenue,
    Employees,
}

impl SortKey {
    /// `None` for unrecognised keys; callers leave order unchanged in that case.
    pub fn parse(key: &str) -> Option<Self> {
        match key.trim() {
            "score" => Some(SortKey::Score),
            "revenue" => Some(SortKey::Revenue),
            "employees" => Some(SortKey::Employees),
            _ => None,
        }
    }

    fn value(&self, lead: &ScoredLead) -> u64 {
        match self {
            SortKey::Score => lead.score as u64,
            SortKey::Revenue => lead.lead.revenue,
            SortKey::Employees => lead.lead.employees,
        }
    }
}

/// Sub-sequence matching `filter`, in original order.
pub fn filter_by_tier(leads: &[ScoredLead], filter: TierFilter) -> Vec<ScoredLead> {
    match filter {
        TierFilter::All => leads.to_vec(),
        TierFilter::Only(tier) => leads.iter().filter(|l| l.tier == tier).cloned().collect(),
    }
}

/// New sequence ordered descending by `key`. Stable: ties keep input order.
/// `None` returns the input order unchanged.
pub fn sort_by(leads: &[ScoredLead], key: Option<SortKey>) -> Vec<ScoredLead> {
    let mut sorted = leads.to_vec();
    if let Some(key) = key {
        sorted.sort_by(|a, b| key.value(b).cmp(&key.value(a)));
    }
    sorted
}

/// Filter then sort, as the results table does.
pub fn query(leads: &[ScoredLead], filter: TierFilter, key: Option<SortKey>) -> Vec<ScoredLead> {
    sort_by(&filter_by_tier(leads, filter), key)
}

/// Statistics over the full collection. All-zero for an empty one.
pub fn aggregate(leads: &[ScoredLead]) -> AggregateStats {
    let total = leads.len();
    if total == 0 {
        return AggregateStats::default();
    }

    let count = |tier: Tier| leads.iter().filter(|l| l.tier == tier).count();
    let tier1_count = count(Tier::HighPriority);
    let tier2_count = count(Tier::Qualified);
    let tier3_count = count(Tier::FollowUp);

    let score_sum: u64 = leads.iter().map(|l| l.score as u64).sum();
    let average_score = (score_sum as f64 / total as f64).round() as u32;

    let percentage = |n: usize| ((n as f64 / total as f64) * 1000.0).round() / 10.0;

    let mut industries: Vec<IndustryCount> = Vec::new();
    for lead in leads {
        match industries.iter_mut().find(|i| i.name == lead.lead.industry) {
            Some(existing) => existing.count += 1,
            None => industries.push(IndustryCount {
                name: lead.lead.industry.clone(),
                count: 1,
            }),
        }
    }

    AggregateStats {
        total,
        tier1_count,
        tier2_count,
        tier3_count,
        average_score,
        tier1_percentage: percentage(tier1_count),
        tier2_percentage: percentage(tier2_count),
        tier3_percentage: percentage(tier3_count),
        industries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, LeadRecord, ScoreBreakdown, Signals};
    use chrono::NaiveDate;

    fn scored(id: u32, score: u8, revenue: u64, industry: &str) -> ScoredLead {
        ScoredLead {
            lead: LeadRecord {
                id,
                company: format!("Company {}", id),
                industry: industry.to_string(),
                location: "Vienna, Austria".to_string(),
                employees: 100 * id as u64,
                revenue,
                contact: Contact {
                    name: "Anna Meyer".to_string(),
                    title: "CEO".to_string(),
                    email: "anna@example.com".to_string(),
                    profile_url: String::new(),
                },
                signals: Signals::default(),
                discovery_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                source: "Web Search".to_string(),
            },
            score,
            tier: crate::scoring::classify(score),
            breakdown: ScoreBreakdown::default(),
        }
    }

    fn ids(leads: &[ScoredLead]) -> Vec<u32> {
        leads.iter().map(|l| l.lead.id).collect()
    }

    #[test]
    fn test_tier_filter_parsing() {
        assert_eq!("all".parse::<TierFilter>().unwrap(), TierFilter::All);
        assert_eq!(
            "2".parse::<TierFilter>().unwrap(),
            TierFilter::Only(Tier::Qualified)
        );
        assert!("4".parse::<TierFilter>().is_err());
        assert!("gold".parse::<TierFilter>().is_err());
    }

    #[test]
    fn test_filter_keeps_relative_order() {
        let leads = vec![
            scored(1, 80, 0, "A"),
            scored(2, 40, 0, "A"),
            scored(3, 90, 0, "A"),
            scored(4, 60, 0, "A"),
        ];
        assert_eq!(ids(&filter_by_tier(&leads, TierFilter::All)), vec![1, 2, 3, 4]);
        assert_eq!(
            ids(&filter_by_tier(&leads, TierFilter::Only(Tier::HighPriority))),
            vec![1, 3]
        );
        assert!(filter_by_tier(&[], TierFilter::Only(Tier::FollowUp)).is_empty());
    }

    #[test]
    fn test_sort_descending_and_stable() {
        let leads = vec![
            scored(1, 60, 5, "A"),
            scored(2, 80, 9, "A"),
            scored(3, 60, 9, "A"),
            scored(4, 80, 1, "A"),
        ];
        assert_eq!(ids(&sort_by(&leads, Some(SortKey::Score))), vec![2, 4, 1, 3]);
        assert_eq!(ids(&sort_by(&leads, Some(SortKey::Revenue))), vec![2, 3, 1, 4]);
        assert_eq!(ids(&sort_by(&leads, Some(SortKey::Employees))), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_unknown_sort_key_leaves_order() {
        let leads = vec![scored(1, 10, 0, "A"), scored(2, 90, 0, "A")];
        assert_eq!(SortKey::parse("company"), None);
        assert_eq!(ids(&sort_by(&leads, SortKey::parse("company"))), vec![1, 2]);
    }

    #[test]
    fn test_aggregate_counts_and_rounding() {
        let leads = vec![
            scored(1, 80, 0, "Manufacturing"),
            scored(2, 55, 0, "Industrial Engineering"),
            scored(3, 20, 0, "Manufacturing"),
        ];
        let stats = aggregate(&leads);

        assert_eq!(stats.total, 3);
        assert_eq!(
            (stats.tier1_count, stats.tier2_count, stats.tier3_count),
            (1, 1, 1)
        );
        // 155 / 3 = 51.67
        assert_eq!(stats.average_score, 52);
        assert_eq!(stats.tier1_percentage, 33.3);
        assert_eq!(stats.industries.len(), 2);
        assert_eq!(stats.industries[0].name, "Manufacturing");
        assert_eq!(stats.industries[0].count, 2);
    }

    #[test]
    fn test_aggregate_half_rounds_up() {
        let leads = vec![scored(1, 50, 0, "A"), scored(2, 51, 0, "A")];
        assert_eq!(aggregate(&leads).average_score, 51);
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        let stats = aggregate(&[]);
        assert_eq!(stats, AggregateStats::default());
        assert_eq!(stats.average_score, 0);
    }
}
