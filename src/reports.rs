// 📊 Reports - category and monthly aggregates over a set of expenses
//
// Three views feed the charts: totals per category (pie), totals per month
// over the trailing 12 months (bar) and over the trailing 6 months (trend).
// Month windows are always fully populated; a month with no spending is 0.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::{Expense, UserExpense};

pub const BAR_WINDOW_MONTHS: usize = 12;
pub const TREND_WINDOW_MONTHS: usize = 6;

// ============================================================================
// AGGREGATES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

/// Sum per literal category string, in order of first appearance.
pub fn sum_by_category<'a, I>(expenses: I) -> Vec<CategoryTotal>
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut totals: Vec<CategoryTotal> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for e in expenses {
        match index.get(e.category.as_str()) {
            Some(&i) => totals[i].total += e.amount,
            None => {
                index.insert(e.category.as_str(), totals.len());
                totals.push(CategoryTotal {
                    category: e.category.clone(),
                    total: e.amount,
                });
            }
        }
    }
    totals
}

pub fn total<'a, I>(expenses: I) -> f64
where
    I: IntoIterator<Item = &'a Expense>,
{
    expenses.into_iter().map(|e| e.amount).sum()
}

/// `YYYY-MM` bucket for an expense; `None` when its date does not parse.
pub fn month_key(expense: &Expense) -> Option<String> {
    expense
        .timestamp()
        .map(|t| format!("{:04}-{:02}", t.year(), t.month()))
}

/// The `n` calendar months ending with `anchor`'s month, oldest first.
pub fn trailing_months(anchor: NaiveDate, n: usize) -> Vec<String> {
    let current = anchor.year() * 12 + anchor.month0() as i32;
    (0..n as i32)
        .rev()
        .map(|back| {
            let m = current - back;
            format!("{:04}-{:02}", m.div_euclid(12), m.rem_euclid(12) + 1)
        })
        .collect()
}

pub fn monthly_totals<'a, I>(expenses: I) -> HashMap<String, f64>
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut monthly = HashMap::new();
    for e in expenses {
        if let Some(key) = month_key(e) {
            *monthly.entry(key).or_insert(0.0) += e.amount;
        }
    }
    monthly
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries {
    pub months: Vec<String>,
    pub totals: Vec<f64>,
}

impl MonthlySeries {
    pub fn window(monthly: &HashMap<String, f64>, anchor: NaiveDate, n: usize) -> Self {
        let months = trailing_months(anchor, n);
        let totals = months
            .iter()
            .map(|m| monthly.get(m).copied().unwrap_or(0.0))
            .collect();
        MonthlySeries { months, totals }
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub by_category: Vec<CategoryTotal>,
    pub monthly: MonthlySeries,
    pub trend: MonthlySeries,
    pub total: f64,
    pub expense_count: usize,
    /// Distinct users contributing to the report, in first-seen order
    pub users: Vec<String>,
}

impl Report {
    pub fn build(expenses: &[UserExpense], anchor: NaiveDate) -> Self {
        let plain = || expenses.iter().map(|ue| &ue.expense);
        let monthly = monthly_totals(plain());

        let mut users: Vec<String> = Vec::new();
        for ue in expenses {
            if !users.contains(&ue.username) {
                users.push(ue.username.clone());
            }
        }

        Report {
            by_category: sum_by_category(plain()),
            monthly: MonthlySeries::window(&monthly, anchor, BAR_WINDOW_MONTHS),
            trend: MonthlySeries::window(&monthly, anchor, TREND_WINDOW_MONTHS),
            total: total(plain()),
            expense_count: expenses.len(),
            users,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expense_count == 0
    }

    pub fn category_total(&self, category: &str) -> Option<f64> {
        self.by_category
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.total)
    }

    /// Chart descriptors for the rendering collaborator.
    pub fn charts(&self) -> Vec<ChartSpec> {
        let pie_labels: Vec<String> = self.by_category.iter().map(|c| c.category.clone()).collect();
        let pie_colors = palette(pie_labels.len());

        vec![
            ChartSpec {
                id: PIE_CHART_ID.to_string(),
                kind: ChartKind::Pie,
                values: self.by_category.iter().map(|c| c.total).collect(),
                labels: pie_labels,
                colors: pie_colors,
            },
            ChartSpec {
                id: BAR_CHART_ID.to_string(),
                kind: ChartKind::Bar,
                labels: self.monthly.months.clone(),
                values: self.monthly.totals.clone(),
                colors: vec![BAR_COLOR.to_string()],
            },
            ChartSpec {
                id: TREND_CHART_ID.to_string(),
                kind: ChartKind::Line,
                labels: self.trend.months.clone(),
                values: self.trend.totals.clone(),
                colors: vec![TREND_COLOR.to_string()],
            },
        ]
    }
}

// ============================================================================
// CHARTS (rendering collaborator)
// ============================================================================

pub const PIE_CHART_ID: &str = "by-category";
pub const BAR_CHART_ID: &str = "monthly";
pub const TREND_CHART_ID: &str = "trend";

const BAR_COLOR: &str = "#ffa99f";
const TREND_COLOR: &str = "#2ecc71";

const PALETTE: [&str; 12] = [
    "#3498db", "#e67e22", "#2ecc71", "#e74c3c", "#9b59b6", "#95a5a6", "#f1c40f", "#1abc9c",
    "#e84393", "#fdcb6e", "#6c5ce7", "#00b894",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Pie,
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub id: String,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub colors: Vec<String>,
}

/// `n` colors cycling through the fixed palette.
pub fn palette(n: usize) -> Vec<String> {
    PALETTE.iter().cycle().take(n).map(|c| c.to_string()).collect()
}

/// Something that can draw and destroy charts.
pub trait ChartRenderer {
    /// Replace whatever chart is currently shown under `chart.id`.
    fn draw(&mut self, chart: &ChartSpec);
    fn clear(&mut self, id: &str);
}

/// Draw all report charts, or clear them when there is nothing to show.
pub fn render_report(report: &Report, renderer: &mut dyn ChartRenderer) {
    if report.is_empty() {
        for id in [PIE_CHART_ID, BAR_CHART_ID, TREND_CHART_ID] {
            renderer.clear(id);
        }
        return;
    }
    for chart in report.charts() {
        renderer.draw(&chart);
    }
}

/// Renderer that just keeps the latest chart per id; the TUI and the HTTP
/// API read charts from here.
#[derive(Debug, Default, Clone)]
pub struct ChartBoard {
    charts: Vec<ChartSpec>,
}

impl ChartBoard {
    pub fn get(&self, id: &str) -> Option<&ChartSpec> {
        self.charts.iter().find(|c| c.id == id)
    }

    pub fn charts(&self) -> &[ChartSpec] {
        &self.charts
    }
}

impl ChartRenderer for ChartBoard {
    fn draw(&mut self, chart: &ChartSpec) {
        self.clear(&chart.id);
        self.charts.push(chart.clone());
    }

    fn clear(&mut self, id: &str) {
        self.charts.retain(|c| c.id != id);
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Amount in Costa Rican colones notation: space-grouped thousands (only from
/// five integer digits up), comma decimal, at most two decimals.
pub fn format_colones(amount: f64) -> String {
    let thousandths = (amount.abs() * 1000.0).round() as u64;
    let int_part = (thousandths / 1000).to_string();
    let frac = thousandths % 1000;

    let grouped = if int_part.len() < 5 {
        int_part
    } else {
        let mut out = String::new();
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                out.push('\u{a0}');
            }
            out.push(ch);
        }
        out
    };

    let sign = if amount < 0.0 && thousandths > 0 { "-" } else { "" };
    if frac == 0 {
        return format!("{}{}", sign, grouped);
    }
    let digits = format!("{:03}", frac);
    format!("{}{},{}", sign, grouped, digits.trim_end_matches('0'))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ExpenseType;

    fn create_test_expense(user: &str, amount: f64, category: &str, date: &str, ts: i64) -> UserExpense {
        UserExpense {
            username: user.to_string(),
            expense: Expense {
                description: format!("Test expense: {}", category),
                amount,
                category: category.to_string(),
                kind: ExpenseType::Variable,
                date: date.to_string(),
                created_at_millis: ts,
            },
        }
    }

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    #[test]
    fn test_food_transport_example() {
        let expenses = vec![
            create_test_expense("ana", 100.0, "Food", "2025-03-01T10:00:00Z", 1),
            create_test_expense("ana", 50.0, "Food", "2025-03-02T10:00:00Z", 2),
            create_test_expense("ana", 200.0, "Transport", "2025-03-03T10:00:00Z", 3),
        ];

        let report = Report::build(&expenses, anchor());

        assert_eq!(
            report.by_category,
            vec![
                CategoryTotal { category: "Food".into(), total: 150.0 },
                CategoryTotal { category: "Transport".into(), total: 200.0 },
            ]
        );
        assert_eq!(report.total, 350.0);
        assert_eq!(report.expense_count, 3);
        assert_eq!(report.monthly.totals.last(), Some(&350.0));

        println!("✅ Report: {} total over {} expenses", report.total, report.expense_count);
    }

    #[test]
    fn test_trailing_months_crosses_year_boundary() {
        let months = trailing_months(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(), 4);
        assert_eq!(months, vec!["2024-11", "2024-12", "2025-01", "2025-02"]);
    }

    #[test]
    fn test_windows_are_fully_populated() {
        let report = Report::build(&[], anchor());

        assert_eq!(report.monthly.len(), BAR_WINDOW_MONTHS);
        assert_eq!(report.trend.len(), TREND_WINDOW_MONTHS);
        assert!(report.monthly.totals.iter().all(|t| *t == 0.0));
        assert_eq!(report.monthly.months.first().map(String::as_str), Some("2024-04"));
        assert_eq!(report.trend.months.first().map(String::as_str), Some("2024-10"));
        assert!(report.is_empty());

        for k in [1, 5, 24] {
            let series = MonthlySeries::window(&HashMap::new(), anchor(), k);
            assert_eq!(series.len(), k);
        }
    }

    #[test]
    fn test_monthly_buckets_and_out_of_window() {
        let expenses = vec![
            create_test_expense("ana", 10.0, "Food", "2025-01-31T23:00:00Z", 1),
            create_test_expense("bob", 5.0, "Food", "2025-01-01T00:00:00Z", 2),
            create_test_expense("ana", 7.0, "Food", "2024-09-10T00:00:00Z", 3), // bar only
            create_test_expense("ana", 1000.0, "Food", "2023-01-01T00:00:00Z", 4), // neither
            create_test_expense("ana", 3.0, "Food", "not a date", 5),
        ];
        let report = Report::build(&expenses, anchor());

        let jan = report.monthly.months.iter().position(|m| m == "2025-01").unwrap();
        assert_eq!(report.monthly.totals[jan], 15.0);
        let sep = report.monthly.months.iter().position(|m| m == "2024-09").unwrap();
        assert_eq!(report.monthly.totals[sep], 7.0);
        assert!(!report.trend.months.contains(&"2024-09".to_string()));

        // undated and old expenses still count in the overall total
        assert_eq!(report.total, 1025.0);
        assert_eq!(report.users, vec!["ana".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_unknown_categories_pass_through() {
        let expenses = vec![create_test_expense("ana", 1.0, "Lottery", "2025-03-01T00:00:00Z", 1)];
        let report = Report::build(&expenses, anchor());
        assert_eq!(report.category_total("Lottery"), Some(1.0));
    }

    #[test]
    fn test_palette_cycles() {
        let colors = palette(14);
        assert_eq!(colors.len(), 14);
        assert_eq!(colors[0], colors[12]);
        assert_eq!(colors[1], colors[13]);
        assert!(palette(0).is_empty());
    }

    #[test]
    fn test_render_report_draws_then_clears() {
        let mut board = ChartBoard::default();
        let expenses = vec![create_test_expense("ana", 1.0, "Food", "2025-03-01T00:00:00Z", 1)];

        render_report(&Report::build(&expenses, anchor()), &mut board);
        assert_eq!(board.charts().len(), 3);
        assert_eq!(board.get(PIE_CHART_ID).unwrap().kind, ChartKind::Pie);
        assert_eq!(board.get(BAR_CHART_ID).unwrap().values.len(), 12);
        assert_eq!(board.get(TREND_CHART_ID).unwrap().values.len(), 6);

        // redrawing replaces rather than stacking
        render_report(&Report::build(&expenses, anchor()), &mut board);
        assert_eq!(board.charts().len(), 3);

        render_report(&Report::build(&[], anchor()), &mut board);
        assert!(board.charts().is_empty());
    }

    #[test]
    fn test_format_colones() {
        assert_eq!(format_colones(0.0), "0");
        assert_eq!(format_colones(1234.0), "1234");
        assert_eq!(format_colones(12345.0), "12\u{a0}345");
        assert_eq!(format_colones(1234567.5), "1\u{a0}234\u{a0}567,5");
        assert_eq!(format_colones(99.99), "99,99");
        assert_eq!(format_colones(-25000.05), "-25\u{a0}000,05");
        assert_eq!(format_colones(0.125), "0,125");
        assert_eq!(format_colones(1.0004), "1");
    }
}
