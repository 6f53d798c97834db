//! Synthetic candidate pool used by discovery.
//!
//! No external data source is contacted. Ten fixed company templates are combined
//! with cyclic contact names and titles; only the four signal booleans vary, and
//! they come from an injectable [`SignalSource`].

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::OnceLock;

use crate::errors::AppError;
use crate::models::{Contact, LeadRecord, Signals};

struct CompanyTemplate {
    name: &'static str,
    industry: &'static str,
    location: &'static str,
    employees: u64,
    revenue: u64,
}

const COMPANIES: [CompanyTemplate; 10] = [
    CompanyTemplate {
        name: "TechForge GmbH",
        industry: "Manufacturing",
        location: "Munich, Germany",
        employees: 850,
        revenue: 45_000_000,
    },
    CompanyTemplate {
        name: "Alpine Industries AG",
        industry: "Industrial Engineering",
        location: "Zurich, Switzerland",
        employees: 1200,
        revenue: 78_000_000,
    },
    CompanyTemplate {
        name: "Precision Tools Austria",
        industry: "Manufacturing",
        location: "Vienna, Austria",
        employees: 450,
        revenue: 23_000_000,
    },
    CompanyTemplate {
        name: "Mechatronics Solutions",
        industry: "Industrial Engineering",
        location: "Stuttgart, Germany",
        employees: 2100,
        revenue: 120_000_000,
    },
    CompanyTemplate {
        name: "Swiss Manufacturing Pro",
        industry: "Manufacturing",
        location: "Basel, Switzerland",
        employees: 650,
        revenue: 38_000_000,
    },
    CompanyTemplate {
        name: "German Automation Tech",
        industry: "Industrial Engineering",
        location: "Berlin, Germany",
        employees: 1800,
        revenue: 95_000_000,
    },
    CompanyTemplate {
        name: "Austrian Precision Works",
        industry: "Manufacturing",
        location: "Graz, Austria",
        employees: 320,
        revenue: 18_000_000,
    },
    CompanyTemplate {
        name: "Rhein Industries",
        industry: "Manufacturing",
        location: "Frankfurt, Germany",
        employees: 950,
        revenue: 52_000_000,
    },
    CompanyTemplate {
        name: "Helvetic Engineering",
        industry: "Industrial Engineering",
        location: "Geneva, Switzerland",
        employees: 780,
        revenue: 41_000_000,
    },
    CompanyTemplate {
        name: "Vienna Tech Solutions",
        industry: "Manufacturing",
        location: "Vienna, Austria",
        employees: 560,
        revenue: 29_000_000,
    },
];

const TITLES: [&str; 6] = [
    "CEO",
    "VP Operations",
    "Director of Manufacturing",
    "Head of Engineering",
    "Operations Manager",
    "Procurement Director",
];

const FIRST_NAMES: [&str; 8] = [
    "Hans", "Maria", "Klaus", "Anna", "Stefan", "Julia", "Michael", "Sophia",
];

const LAST_NAMES: [&str; 8] = [
    "Schmidt", "Müller", "Weber", "Meyer", "Wagner", "Becker", "Schulz", "Hoffmann",
];

/// Source of the per-candidate signal booleans.
pub trait SignalSource: Send {
    fn draw(&mut self) -> Signals;
}

/// Independent Bernoulli draws per signal.
pub struct RandomSignals {
    rng: StdRng,
}

impl RandomSignals {
    pub const RECENT_NEWS_P: f64 = 0.5;
    pub const HIRING_P: f64 = 0.4;
    pub const GROWTH_P: f64 = 0.6;
    pub const RISK_P: f64 = 0.1;

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SignalSource for RandomSignals {
    fn draw(&mut self) -> Signals {
        Signals {
            recent_news: self.rng.gen_bool(Self::RECENT_NEWS_P),
            hiring: self.rng.gen_bool(Self::HIRING_P),
            growth_indicators: self.rng.gen_bool(Self::GROWTH_P),
            risk_factors: self.rng.gen_bool(Self::RISK_P),
        }
    }
}

/// Returns the same signals for every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSignals(pub Signals);

impl SignalSource for FixedSignals {
    fn draw(&mut self) -> Signals {
        self.0
    }
}

/// Produces the raw candidate records for one discovery run.
pub trait LeadSource: Send {
    fn discover(&mut self, run_date: NaiveDate) -> Result<Vec<LeadRecord>, AppError>;
}

/// The fixed ten-company pool with injected signals.
pub struct SyntheticLeadSource<S: SignalSource> {
    signals: S,
    source_label: String,
}

impl<S: SignalSource> SyntheticLeadSource<S> {
    pub fn new(signals: S, source_label: impl Into<String>) -> Self {
        Self {
            signals,
            source_label: source_label.into(),
        }
    }
}

impl<S: SignalSource> LeadSource for SyntheticLeadSource<S> {
    fn discover(&mut self, run_date: NaiveDate) -> Result<Vec<LeadRecord>, AppError> {
        let leads = COMPANIES
            .iter()
            .enumerate()
            .map(|(idx, company)| {
                let first = FIRST_NAMES[idx % FIRST_NAMES.len()];
                let last = LAST_NAMES[idx % LAST_NAMES.len()];
                let first_lower = first.to_lowercase();
                let last_lower = last.to_lowercase();

                LeadRecord {
                    id: idx as u32 + 1,
                    company: company.name.to_string(),
                    industry: company.industry.to_string(),
                    location: company.location.to_string(),
                    employees: company.employees,
                    revenue: company.revenue,
                    contact: Contact {
                        name: format!("{} {}", first, last),
                        title: TITLES[idx % TITLES.len()].to_string(),
                        email: format!(
                            "{}.{}@{}",
                            first_lower,
                            last_lower,
                            company_domain(company.name)
                        ),
                        profile_url: format!("linkedin.com/in/{}-{}", first_lower, last_lower),
                    },
                    signals: self.signals.draw(),
                    discovery_date: run_date,
                    source: self.source_label.clone(),
                }
            })
            .collect();

        Ok(leads)
    }
}

/// Lower-cased company name with everything outside `a-z` removed, plus ".com".
pub fn company_domain(company: &str) -> String {
    static NON_ALPHA: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALPHA.get_or_init(|| Regex::new(r"[^a-z]").expect("static regex"));
    format!("{}.com", re.replace_all(&company.to_lowercase(), ""))
}
