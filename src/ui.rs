use crate::models::{Expense, SpendingSummary};
use crate::notices::Toast;
use std::fmt::Write;

const EMPTY_LIST: &str = "No expenses yet. Add one with `expense_client add`.";

pub fn render_expenses(expenses: &[Expense]) -> String {
    if expenses.is_empty() {
        return format!("{EMPTY_LIST}\n");
    }

    let width = expenses
        .iter()
        .map(|expense| expense.description.chars().count())
        .max()
        .unwrap_or_default()
        .max("Description".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6}  {:<10}  {:<width$}  {:<12}  {:>12}",
        "ID", "Date", "Description", "Category", "Amount"
    );
    for expense in expenses {
        let _ = writeln!(
            out,
            "{:>6}  {:<10}  {:<width$}  {:<12}  {:>12}",
            expense.id,
            expense.date.format("%d/%m/%Y").to_string(),
            expense.description,
            expense.category,
            format_amount(expense.amount),
        );
    }
    out
}

pub fn render_summary(summary: &SpendingSummary) -> String {
    let mut out = String::from("Last 7 days:\n");
    for day in &summary.last_7_days {
        let _ = writeln!(
            out,
            "  {}  {:>12}",
            day.date.format("%a %d/%m"),
            format_amount(day.total)
        );
    }

    if !summary.by_category.is_empty() {
        out.push_str("By category:\n");
        for category in &summary.by_category {
            let _ = writeln!(
                out,
                "  {:<12}  {:>12}  ({})",
                category.category,
                format_amount(category.total),
                category.count
            );
        }
    }

    let _ = writeln!(out, "Total: {}", format_amount(summary.total));
    out
}

pub fn render_notices(error: Option<&str>, toast: Option<&Toast>) -> String {
    let mut out = String::new();
    if let Some(error) = error {
        let _ = writeln!(out, "error: {error}");
    }
    if let Some(toast) = toast {
        if toast.undo {
            let _ = writeln!(out, "{} (type `u` + Enter to undo)", toast.message);
        } else {
            let _ = writeln!(out, "{}", toast.message);
        }
    }
    out
}

pub fn format_amount(amount: f64) -> String {
    format!("₹{amount:.2}")
}
