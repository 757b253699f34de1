use crate::models::{CategorySpend, DailySpend, Expense, SpendingSummary};
use chrono::{Duration, Local, NaiveDate};
use std::collections::BTreeMap;

pub fn build_summary(expenses: &[Expense]) -> SpendingSummary {
    build_summary_at(Local::now().date_naive(), expenses)
}

pub fn build_summary_at(today: NaiveDate, expenses: &[Expense]) -> SpendingSummary {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut by_category: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    let mut total = 0.0;

    for expense in expenses {
        *by_day.entry(expense.date).or_default() += expense.amount;
        let entry = by_category.entry(expense.category.as_str()).or_default();
        entry.0 += expense.amount;
        entry.1 += 1;
        total += expense.amount;
    }

    let last_7_days = (0..7)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            DailySpend {
                date,
                total: by_day.get(&date).copied().unwrap_or_default(),
            }
        })
        .collect();

    let by_category = by_category
        .into_iter()
        .map(|(category, (total, count))| CategorySpend {
            category: category.to_string(),
            total,
            count,
        })
        .collect();

    SpendingSummary {
        last_7_days,
        by_category,
        total,
    }
}
