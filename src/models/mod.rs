// Data models for the expense API wire format

pub mod category;
pub mod dashboard;
pub mod expense;

pub use category::{Category, MainCategory, PaymentMethod};
pub use dashboard::{
    Cards, CategoryBreakdown, CategoryCard, CategoryRanking, ChartCategory, ChartPeriod,
    DashboardOverview, DashboardSummary, DateRange, ExpenseCard, Period, SpenderCard,
};
pub use expense::{Expense, ExpenseQuery, ExpensesPage, NewExpense, Pagination};
