//! Revenue report for the admin dashboard
//!
//! Windows are computed in UTC:
//! - daily: since midnight today
//! - weekly: since midnight seven days ago
//! - monthly: since midnight on the first of the month

use crate::directory::{Directory, Worker};
use crate::ledger::{count_by_method, sum_since, Ledger};
use crate::types::{Amount, PaymentMethod, Transaction};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

const RECENT_LIMIT: usize = 5;
const TOP_WORKERS_LIMIT: usize = 5;

/// Start instants of the rollup windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueWindows {
    pub day: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub month: DateTime<Utc>,
}

impl RevenueWindows {
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let day = today.and_time(NaiveTime::MIN).and_utc();
        let month = today
            .with_day(1)
            .unwrap_or(today)
            .and_time(NaiveTime::MIN)
            .and_utc();
        Self {
            day,
            week: day - Duration::days(7),
            month,
        }
    }
}

/// Dashboard statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueReport {
    pub generated_at: DateTime<Utc>,
    pub total_transactions: usize,
    pub total_revenue: Amount,
    pub revenue_daily: Amount,
    pub revenue_weekly: Amount,
    pub revenue_monthly: Amount,
    pub payment_methods: IndexMap<PaymentMethod, usize>,
    pub recent: Vec<Transaction>,
    pub top_workers: Vec<Worker>,
    pub total_workers: usize,
}

impl RevenueReport {
    /// Build the report from the current ledger and directory
    #[must_use]
    pub fn build(ledger: &Ledger, directory: &Directory, now: DateTime<Utc>) -> Self {
        let transactions = ledger.list_all();
        let windows = RevenueWindows::at(now);

        Self {
            generated_at: now,
            total_transactions: transactions.len(),
            total_revenue: transactions
                .iter()
                .fold(0, |acc: Amount, tx| acc.saturating_add(tx.amount)),
            revenue_daily: sum_since(&transactions, windows.day),
            revenue_weekly: sum_since(&transactions, windows.week),
            revenue_monthly: sum_since(&transactions, windows.month),
            payment_methods: count_by_method(&transactions),
            recent: transactions.iter().take(RECENT_LIMIT).cloned().collect(),
            top_workers: directory.top_viewed(TOP_WORKERS_LIMIT),
            total_workers: directory.list_all().len(),
        }
    }
}
