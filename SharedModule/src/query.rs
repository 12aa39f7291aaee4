//! # Subscription Queries
//!
//! Builds the declarative `SELECT * FROM <table> [WHERE ...]` strings the
//! client subscribes with.

use std::fmt;

use crate::tables::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionQuery {
    table: Table,
    filter: Option<String>,
}

impl SubscriptionQuery {
    pub fn all(table: Table) -> Self {
        Self { table, filter: None }
    }

    /// Restrict rows with a SQL predicate, e.g. `identity = 0x01ab`
    pub fn filtered(table: Table, predicate: impl Into<String>) -> Self {
        Self {
            table,
            filter: Some(predicate.into()),
        }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// One unfiltered query per game table
    pub fn game_state() -> Vec<SubscriptionQuery> {
        Table::ALL.into_iter().map(SubscriptionQuery::all).collect()
    }
}

impl fmt::Display for SubscriptionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT * FROM {}", self.table.name())?;
        if let Some(filter) = &self.filter {
            write!(f, " WHERE {}", filter)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_state_covers_all_tables() {
        let queries: Vec<String> = SubscriptionQuery::game_state()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            queries,
            vec![
                "SELECT * FROM user",
                "SELECT * FROM character",
                "SELECT * FROM character_appearance",
                "SELECT * FROM session",
            ]
        );
    }

    #[test]
    fn filter_is_appended() {
        let query = SubscriptionQuery::filtered(Table::Session, "character_id = 3");
        assert_eq!(query.to_string(), "SELECT * FROM session WHERE character_id = 3");
    }
}
