//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.
//! The tables themselves are created by `migrations/postgres`.

use sea_query::Iden;

/// Users table schema. Rows are provisioned outside this service.
#[derive(Iden)]
pub enum Users {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "balance"]
    Balance,
}

/// Transactions table schema.
#[derive(Iden)]
pub enum Transactions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "user_id"]
    UserId,
    #[iden = "datetime"]
    Datetime,
    #[iden = "amount"]
    Amount,
}
