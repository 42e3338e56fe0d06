use crate::models::{Amount, DurationUnit};
use serde::Serialize;

/// Billing cadence a plan is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanCategory {
    Monthly,
    Annual,
    QuickAccess,
}

/// A purchasable subscription tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub id: &'static str,
    pub category: PlanCategory,
    pub title: &'static str,
    pub amount: Amount,
    /// Entitlement length sent to `PATCH /users/premium`
    pub duration: u32,
    pub unit: DurationUnit,
    pub features: &'static [&'static str],
}

impl Plan {
    /// Free tiers cannot go through the card checkout
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.amount.is_zero()
    }

    /// Price label as listed, e.g. `FREE` or `$14.99`
    #[must_use]
    pub fn price_label(&self) -> String {
        if self.is_free() {
            "FREE".to_string()
        } else {
            self.amount.to_string()
        }
    }
}

const fn plan(
    id: &'static str,
    category: PlanCategory,
    title: &'static str,
    cents: u64,
    duration: u32,
    unit: DurationUnit,
    features: &'static [&'static str],
) -> Plan {
    Plan {
        id,
        category,
        title,
        amount: Amount::from_cents(cents),
        duration,
        unit,
        features,
    }
}

static CATALOG: [Plan; 9] = [
    plan(
        "monthly-digital-reader",
        PlanCategory::Monthly,
        "Digital Reader",
        0,
        1,
        DurationUnit::Month,
        &[
            "Access to all digital articles",
            "Daily e-paper delivery",
            "Advanced search archive (30 days)",
        ],
    ),
    plan(
        "monthly-premium-analyst",
        PlanCategory::Monthly,
        "Premium Analyst",
        1499,
        1,
        DurationUnit::Month,
        &[
            "Full historical archive access",
            "PDF edition downloads",
            "Exclusive columnist access",
        ],
    ),
    plan(
        "monthly-family-edition",
        PlanCategory::Monthly,
        "Family Edition",
        1999,
        1,
        DurationUnit::Month,
        &["Up to 5 user accounts", "Kids news section", "Weekly print edition"],
    ),
    plan(
        "annual-digital-reader",
        PlanCategory::Annual,
        "Digital Reader",
        8900,
        1,
        DurationUnit::Year,
        &["12 months for the price of 9", "Extended 90-day archive access"],
    ),
    plan(
        "annual-premium-analyst",
        PlanCategory::Annual,
        "Premium Analyst",
        14900,
        1,
        DurationUnit::Year,
        &["Unlimited archive access", "Complete PDF edition library"],
    ),
    plan(
        "annual-family-edition",
        PlanCategory::Annual,
        "Family Edition",
        19900,
        1,
        DurationUnit::Year,
        &["Annual family planner", "Educational supplements"],
    ),
    plan(
        "quick-trial-access",
        PlanCategory::QuickAccess,
        "Trial Access",
        100,
        1,
        DurationUnit::Minute,
        &["Full access for 1 minute", "Preview premium content"],
    ),
    plan(
        "quick-short-term",
        PlanCategory::QuickAccess,
        "Short Term",
        500,
        5,
        DurationUnit::Day,
        &["5 days unlimited access", "All premium articles"],
    ),
    plan(
        "quick-extended-access",
        PlanCategory::QuickAccess,
        "Extended Access",
        1000,
        10,
        DurationUnit::Day,
        &["10 days full access", "Offline reading"],
    ),
];

/// Every listed plan, grouped by category in listing order
#[must_use]
pub fn catalog() -> &'static [Plan] {
    &CATALOG
}

#[must_use]
pub fn find_plan(id: &str) -> Option<&'static Plan> {
    CATALOG.iter().find(|plan| plan.id == id)
}
