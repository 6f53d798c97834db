use chrono::NaiveDate;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;

use crate::errors::AppError;

// ============ ICP Configuration ============

/// Inclusive numeric band, used for company size and revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub min: u64,
    pub max: u64,
}

impl Band {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u64) -> bool {
        self.min <= value && value <= self.max
    }

    fn validate(&self, name: &str) -> Result<(), AppError> {
        if self.min > self.max {
            return Err(AppError::InvalidConfig(format!(
                "{} band min ({}) must not exceed max ({})",
                name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Ideal Customer Profile: the targeting criteria leads are scored against.
///
/// Industries and geography are sets, so duplicates collapse on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcpConfig {
    /// Industries that count as a company-fit match (exact, case-sensitive).
    pub industries: BTreeSet<String>,
    /// Employee-count band, inclusive on both ends.
    pub company_size: Band,
    /// Country/region tokens searched for inside a lead's location.
    pub geography: BTreeSet<String>,
    /// Revenue band in currency units. Only `min` takes part in scoring.
    pub revenue: Band,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            industries: ["Manufacturing", "Industrial Engineering"]
                .into_iter()
                .map(String::from)
                .collect(),
            company_size: Band::new(100, 5000),
            geography: ["Germany", "Switzerland", "Austria"]
                .into_iter()
                .map(String::from)
                .collect(),
            revenue: Band::new(10_000_000, 500_000_000),
        }
    }
}

impl IcpConfig {
    /// Checks band invariants. Invalid bands are rejected, never swapped or clamped.
    pub fn validate(&self) -> Result<(), AppError> {
        self.company_size.validate("companySize")?;
        self.revenue.validate("revenue")?;
        Ok(())
    }

    /// Validates and returns the configuration, for use at edit time.
    pub fn validated(self) -> Result<Self, AppError> {
        self.validate()?;
        Ok(self)
    }
}

// ============ Lead Records ============

/// Contact person attached to a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    pub title: String,
    pub email: String,
    pub profile_url: String,
}

/// Intent and risk signals. Absent values deserialize as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Signals {
    pub recent_news: bool,
    pub hiring: bool,
    pub growth_indicators: bool,
    pub risk_factors: bool,
}

/// One candidate account, before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRecord {
    /// Sequential, unique within one discovery run.
    pub id: u32,
    pub company: String,
    pub industry: String,
    /// Free text, expected to contain a geography token ("Munich, Germany").
    pub location: String,
    pub employees: u64,
    pub revenue: u64,
    pub contact: Contact,
    #[serde(flatten)]
    pub signals: Signals,
    pub discovery_date: NaiveDate,
    pub source: String,
}

/// Caller-supplied lead for ad-hoc scoring. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLead {
    pub company: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub employees: Option<u64>,
    pub revenue: Option<u64>,
    pub contact: RawContact,
    #[serde(flatten)]
    pub signals: Signals,
    pub discovery_date: Option<NaiveDate>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawContact {
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub profile_url: Option<String>,
}

impl RawLead {
    /// Fills gaps with "Unknown" strings and zero counts.
    pub fn into_record(self, id: u32, today: NaiveDate) -> LeadRecord {
        let unknown = || "Unknown".to_string();
        LeadRecord {
            id,
            company: self.company.unwrap_or_else(unknown),
            industry: self.industry.unwrap_or_else(unknown),
            location: self.location.unwrap_or_else(unknown),
            employees: self.employees.unwrap_or(0),
            revenue: self.revenue.unwrap_or(0),
            contact: Contact {
                name: self.contact.name.unwrap_or_else(unknown),
                title: self.contact.title.unwrap_or_else(unknown),
                email: self.contact.email.unwrap_or_default(),
                profile_url: self.contact.profile_url.unwrap_or_default(),
            },
            signals: self.signals,
            discovery_date: self.discovery_date.unwrap_or(today),
            source: self.source.unwrap_or_else(unknown),
        }
    }
}

// ============ Scoring Output ============

/// Qualification bucket derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    HighPriority,
    Qualified,
    FollowUp,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::HighPriority, Tier::Qualified, Tier::FollowUp];

    pub fn ordinal(&self) -> u8 {
        match self {
            Tier::HighPriority => 1,
            Tier::Qualified => 2,
            Tier::FollowUp => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::HighPriority => "High Priority",
            Tier::Qualified => "Qualified",
            Tier::FollowUp => "Follow-up",
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            1 => Some(Tier::HighPriority),
            2 => Some(Tier::Qualified),
            3 => Some(Tier::FollowUp),
            _ => None,
        }
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Tier", 2)?;
        state.serialize_field("ordinal", &self.ordinal())?;
        state.serialize_field("label", self.label())?;
        state.end()
    }
}

/// Points contributed by each scoring factor, before clamping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    /// Industry, size and geography match (0..=30).
    pub company_fit: i32,
    /// Revenue floor and growth (0..=25).
    pub budget: i32,
    /// Senior title and reachable email (0..=20).
    pub decision_maker: i32,
    /// Recent news and hiring (0..=15).
    pub intent: i32,
    /// 0 or -5.
    pub risk: i32,
}

impl ScoreBreakdown {
    pub fn raw(&self) -> i32 {
        self.company_fit + self.budget + self.decision_maker + self.intent + self.risk
    }

    /// Raw sum clamped into [0, 100].
    pub fn total(&self) -> u8 {
        self.raw().clamp(0, 100) as u8
    }
}

/// A lead plus the score and tier computed against one ICP snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredLead {
    #[serde(flatten)]
    pub lead: LeadRecord,
    pub score: u8,
    pub tier: Tier,
    pub breakdown: ScoreBreakdown,
}

// ============ Aggregates ============

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryCount {
    pub name: String,
    pub count: usize,
}

/// Summary of a completed run. Recomputed wholesale, never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total: usize,
    pub tier1_count: usize,
    pub tier2_count: usize,
    pub tier3_count: usize,
    /// Mean score rounded to the nearest integer; 0 for an empty collection.
    pub average_score: u32,
    pub tier1_percentage: f64,
    pub tier2_percentage: f64,
    pub tier3_percentage: f64,
    /// Industry distribution in first-seen order.
    pub industries: Vec<IndustryCount>,
}

impl AggregateStats {
    pub fn count_for(&self, tier: Tier) -> usize {
        match tier {
            Tier::HighPriority => self.tier1_count,
            Tier::Qualified => self.tier2_count,
            Tier::FollowUp => self.tier3_count,
        }
    }

    pub fn percentage_for(&self, tier: Tier) -> f64 {
        match tier {
            Tier::HighPriority => self.tier1_percentage,
            Tier::Qualified => self.tier2_percentage,
            Tier::FollowUp => self.tier3_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_icp_is_valid() {
        assert!(IcpConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_band_rejected() {
        let mut icp = IcpConfig::default();
        icp.company_size = Band::new(5000, 100);
        match icp.validate() {
            Err(AppError::InvalidConfig(msg)) => assert!(msg.contains("companySize")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }

        let mut icp = IcpConfig::default();
        icp.revenue = Band::new(2, 1);
        assert!(matches!(icp.validated(), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn test_icp_deserializes_camel_case_and_dedupes() {
        let icp: IcpConfig = serde_json::from_value(serde_json::json!({
            "industries": ["Manufacturing", "Manufacturing"],
            "companySize": {"min": 1, "max": 2},
            "geography": ["Germany"],
            "revenue": {"min": 0, "max": 0}
        }))
        .unwrap();
        assert_eq!(icp.industries.len(), 1);
        assert_eq!(icp.company_size, Band::new(1, 2));
    }

    #[test]
    fn test_missing_signals_default_to_false() {
        let raw: RawLead = serde_json::from_value(serde_json::json!({
            "company": "Acme",
            "hiring": true
        }))
        .unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let record = raw.into_record(7, today);

        assert_eq!(record.id, 7);
        assert_eq!(record.industry, "Unknown");
        assert!(record.signals.hiring);
        assert!(!record.signals.recent_news);
        assert!(!record.signals.risk_factors);
        assert_eq!(record.discovery_date, today);
    }

    #[test]
    fn test_tier_serializes_as_ordinal_and_label() {
        let value = serde_json::to_value(Tier::Qualified).unwrap();
        assert_eq!(value, serde_json::json!({"ordinal": 2, "label": "Qualified"}));
    }
}
