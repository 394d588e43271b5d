//! Budget report for administrators.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tycoon_core::{Business, BusinessId, Money, Result};
use tycoon_store::AccountStore;

/// One company in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyLine {
    pub business_id: BusinessId,
    pub name: String,
    pub business_type: String,
    pub budget: Money,
}

impl From<&Business> for CompanyLine {
    fn from(business: &Business) -> Self {
        Self {
            business_id: business.id,
            name: business.name.clone(),
            business_type: business.business_type.clone(),
            budget: business.budget,
        }
    }
}

/// Aggregate over all companies of one business type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSummary {
    pub business_type: String,
    pub count: usize,
    pub total: Money,
    /// Integer average of the budgets.
    pub average: Money,
    /// Members, richest first.
    pub members: Vec<CompanyLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetReport {
    /// Every owned company, richest first.
    pub companies: Vec<CompanyLine>,
    /// Per-type summaries ordered by type name.
    pub by_type: Vec<TypeSummary>,
}

impl BudgetReport {
    /// Build the report over businesses that have at least one owner.
    pub async fn build(store: &dyn AccountStore) -> Result<Self> {
        let owned: BTreeSet<BusinessId> = store
            .list_users()
            .await?
            .into_iter()
            .filter_map(|u| u.business_id)
            .collect();
        let businesses: Vec<Business> = store
            .list_businesses()
            .await?
            .into_iter()
            .filter(|b| owned.contains(&b.id))
            .collect();
        Ok(Self::from_businesses(&businesses))
    }

    pub fn from_businesses(businesses: &[Business]) -> Self {
        let mut companies: Vec<CompanyLine> = businesses.iter().map(CompanyLine::from).collect();
        sort_richest_first(&mut companies);

        let mut groups: BTreeMap<String, Vec<CompanyLine>> = BTreeMap::new();
        for company in &companies {
            groups
                .entry(company.business_type.clone())
                .or_default()
                .push(company.clone());
        }

        let by_type = groups
            .into_iter()
            .map(|(business_type, members)| {
                let total: Money = members.iter().map(|m| m.budget).sum();
                let count = members.len();
                TypeSummary {
                    business_type,
                    count,
                    total,
                    average: total / count.max(1) as Money,
                    members,
                }
            })
            .collect();

        Self { companies, by_type }
    }

    /// Plain-text rendering for the admin chat.
    pub fn render(&self) -> String {
        let mut out = String::from("Company budgets:\n");
        for (rank, company) in self.companies.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} ({}): {}",
                rank + 1,
                company.name,
                company.business_type,
                company.budget
            );
        }

        for summary in &self.by_type {
            let _ = write!(
                out,
                "\n{}: {} companies, total {}, average {}\n",
                summary.business_type, summary.count, summary.total, summary.average
            );
            for member in &summary.members {
                let _ = writeln!(out, "  - {}: {}", member.name, member.budget);
            }
        }
        out
    }
}

fn sort_richest_first(lines: &mut [CompanyLine]) {
    lines.sort_by(|a, b| b.budget.cmp(&a.budget).then(a.business_id.cmp(&b.business_id)));
}
