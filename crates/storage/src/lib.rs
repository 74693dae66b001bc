pub mod db;

pub use db::{
    create_db, get_expense, insert_expense, list_expenses, update_expense_status, DbPool,
    StorageError,
};
