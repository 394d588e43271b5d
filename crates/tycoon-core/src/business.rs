//! Business accounts and the users that own them.
//!
//! A [`Business`] is one economic actor. Its budget is only ever changed through
//! [`Business::credited`] and [`Business::debited`], which return the next state of
//! the account instead of mutating in place, so a caller can stage both legs of a
//! transfer and commit them together.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TycoonError};
use crate::types::{ensure_non_negative, ensure_positive, BusinessId, Money, UserId};

/// One economic actor with a budget and a recurring expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    /// Stable identity.
    pub id: BusinessId,

    /// Category of the business (e.g. "courier").
    pub business_type: String,

    /// Display name, set by the owner at registration.
    pub name: String,

    /// Current budget. Never negative.
    pub budget: Money,

    /// Recurring debit applied by monthly settlement.
    pub monthly_expense: Money,

    /// Cumulative total of all credits ever applied.
    pub income: Money,

    /// Cumulative total of all debits ever applied.
    pub cost: Money,
}

impl Business {
    /// Create a new BusinessBuilder.
    pub fn builder() -> BusinessBuilder {
        BusinessBuilder::default()
    }

    /// Whether the budget covers `amount`.
    pub fn can_cover(&self, amount: Money) -> bool {
        self.budget >= amount
    }

    /// The account after crediting `amount`.
    pub fn credited(&self, amount: Money) -> Result<Business> {
        ensure_positive(amount, "credit amount")?;
        let budget = self
            .budget
            .checked_add(amount)
            .ok_or_else(|| TycoonError::invalid("credit would overflow the budget"))?;
        let income = self.income.saturating_add(amount);
        Ok(Business {
            budget,
            income,
            ..self.clone()
        })
    }

    /// The account after debiting `amount`.
    ///
    /// Fails with `InsufficientFunds` when the budget does not cover the amount.
    pub fn debited(&self, amount: Money) -> Result<Business> {
        ensure_positive(amount, "debit amount")?;
        if !self.can_cover(amount) {
            return Err(TycoonError::InsufficientFunds {
                business_id: self.id,
                available: self.budget,
                required: amount,
            });
        }
        Ok(Business {
            budget: self.budget - amount,
            cost: self.cost.saturating_add(amount),
            ..self.clone()
        })
    }

    /// The account with a new recurring expense.
    pub fn with_monthly_expense(&self, amount: Money) -> Result<Business> {
        ensure_non_negative(amount, "monthly expense")?;
        Ok(Business {
            monthly_expense: amount,
            ..self.clone()
        })
    }

    /// The account under a new display name.
    pub fn renamed(&self, name: &str) -> Result<Business> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TycoonError::invalid("business name cannot be empty"));
        }
        Ok(Business {
            name: name.to_string(),
            ..self.clone()
        })
    }

    /// Short multi-line overview shown to the owner.
    pub fn overview(&self) -> String {
        format!(
            "Business type: {}\nName: {}\nBudget: {}\nMonthly expenses: {}",
            self.business_type, self.name, self.budget, self.monthly_expense
        )
    }
}

/// Fields of a business that does not exist yet; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBusiness {
    pub business_type: String,
    pub name: String,
    #[serde(default)]
    pub budget: Money,
    #[serde(default)]
    pub monthly_expense: Money,
}

impl NewBusiness {
    /// Validate the provisioning values.
    pub fn validate(&self) -> Result<()> {
        if self.business_type.trim().is_empty() {
            return Err(TycoonError::invalid("business type cannot be empty"));
        }
        ensure_non_negative(self.budget, "initial budget")?;
        ensure_non_negative(self.monthly_expense, "monthly expense")?;
        Ok(())
    }

    /// Materialize with the id assigned by the store.
    pub fn into_business(self, id: BusinessId) -> Business {
        Business {
            id,
            business_type: self.business_type,
            name: self.name,
            budget: self.budget,
            monthly_expense: self.monthly_expense,
            income: 0,
            cost: 0,
        }
    }
}

/// Builder for provisioning businesses with a fluent API.
#[derive(Debug, Default)]
pub struct BusinessBuilder {
    business_type: Option<String>,
    name: Option<String>,
    budget: Money,
    monthly_expense: Money,
}

impl BusinessBuilder {
    pub fn business_type(mut self, business_type: impl Into<String>) -> Self {
        self.business_type = Some(business_type.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn budget(mut self, budget: Money) -> Self {
        self.budget = budget;
        self
    }

    pub fn monthly_expense(mut self, monthly_expense: Money) -> Self {
        self.monthly_expense = monthly_expense;
        self
    }

    /// Build the provisioning record.
    pub fn build(self) -> Result<NewBusiness> {
        let business_type = self
            .business_type
            .ok_or_else(|| TycoonError::invalid("business type is required"))?;
        let name = self.name.unwrap_or_else(|| business_type.clone());

        let new = NewBusiness {
            business_type,
            name,
            budget: self.budget,
            monthly_expense: self.monthly_expense,
        };
        new.validate()?;
        Ok(new)
    }
}

/// A participant. Owns at most one business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub business_id: Option<BusinessId>,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            business_id: None,
        }
    }

    pub fn owns(&self, business_id: BusinessId) -> bool {
        self.business_id == Some(business_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn courier(budget: Money) -> Business {
        Business::builder()
            .business_type("courier")
            .name("Fast Feet")
            .budget(budget)
            .build()
            .unwrap()
            .into_business(BusinessId(1))
    }

    #[test]
    fn test_credit_updates_budget_and_income() {
        let b = courier(100).credited(50).unwrap();
        assert_eq!(b.budget, 150);
        assert_eq!(b.income, 50);
        assert_eq!(b.cost, 0);
    }

    #[test]
    fn test_debit_updates_budget_and_cost() {
        let b = courier(100).debited(40).unwrap();
        assert_eq!(b.budget, 60);
        assert_eq!(b.cost, 40);
    }

    #[test]
    fn test_debit_rejects_overdraft() {
        let b = courier(30);
        let err = b.debited(31).unwrap_err();
        assert_eq!(
            err,
            TycoonError::InsufficientFunds {
                business_id: BusinessId(1),
                available: 30,
                required: 31,
            }
        );
    }

    #[test]
    fn test_debit_to_exactly_zero() {
        let b = courier(30).debited(30).unwrap();
        assert_eq!(b.budget, 0);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let b = courier(30);
        assert!(matches!(b.credited(0), Err(TycoonError::InvalidInput(_))));
        assert!(matches!(b.debited(-3), Err(TycoonError::InvalidInput(_))));
    }

    #[test]
    fn test_monthly_expense_must_not_be_negative() {
        let b = courier(30);
        assert_eq!(b.with_monthly_expense(0).unwrap().monthly_expense, 0);
        assert!(b.with_monthly_expense(-1).is_err());
    }

    #[test]
    fn test_builder_requires_type() {
        assert!(Business::builder().name("x").build().is_err());
        assert!(Business::builder()
            .business_type("bakery")
            .budget(-1)
            .build()
            .is_err());
    }

    #[test]
    fn test_rename_trims_and_rejects_empty() {
        let b = courier(0);
        assert_eq!(b.renamed("  Swift  ").unwrap().name, "Swift");
        assert!(b.renamed("   ").is_err());
    }
}
