pub mod currency;
pub mod expense;
pub mod money;

pub use currency::{CurrencyCode, CurrencyError};
pub use expense::{Expense, ExpenseStatus, NewExpense};
pub use money::{Amount, ParseAmountError};
