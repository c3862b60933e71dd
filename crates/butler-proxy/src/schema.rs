//! Schema bootstrap, run through a [`QueryChannel`].
//!
//! Every statement is idempotent, so bootstrap runs on each start of the
//! dialog process. Seed rows are inserted with `ON CONFLICT DO NOTHING`;
//! editing a seed in the config does not overwrite a row that already
//! exists.

use butler_types::QueryRequest;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::client::QueryChannel;
use crate::error::ClientError;

/// Table definitions, in creation order.
pub const TABLES: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS users (
        id BIGINT PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS spend_log (
        username TEXT NOT NULL,
        category TEXT NOT NULL,
        amount NUMERIC(12, 2) NOT NULL,
        notes TEXT,
        tx_timestamp TIMESTAMP NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS gift_log (
        username TEXT NOT NULL,
        recipient TEXT NOT NULL,
        item TEXT NOT NULL,
        amount NUMERIC(12, 2) NOT NULL,
        notes TEXT,
        tx_timestamp TIMESTAMP NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS monthly_budgets (
        category TEXT PRIMARY KEY,
        max_budget NUMERIC(12, 2),
        max_tx_amount NUMERIC(12, 2)
    )",
];

/// A user allowed to talk to the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedUser {
    /// Chat-network user ID.
    pub id: i64,
    /// Display name.
    pub name: String,
}

/// A per-category monthly budget.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedBudget {
    /// Expense category.
    pub category: String,
    /// Monthly budget for the category.
    pub max_budget: Option<Decimal>,
    /// Largest single transaction before the assistant complains.
    pub max_tx_amount: Option<Decimal>,
}

/// Create missing tables and insert missing seed rows.
///
/// # Errors
///
/// Returns the first [`ClientError`] encountered; earlier statements stay
/// committed.
pub async fn bootstrap<Q: QueryChannel>(
    channel: &mut Q,
    users: &[SeedUser],
    budgets: &[SeedBudget],
) -> Result<(), ClientError> {
    for table in TABLES {
        channel.execute(QueryRequest::new(table).with_commit()).await?;
    }

    for user in users {
        channel
            .execute(
                QueryRequest::new(
                    "INSERT INTO users (id, name) VALUES (%(id)s, %(name)s) \
                     ON CONFLICT DO NOTHING",
                )
                .with_param("id", user.id)
                .with_param("name", user.name.as_str())
                .with_commit(),
            )
            .await?;
    }

    for budget in budgets {
        channel
            .execute(
                QueryRequest::new(
                    "INSERT INTO monthly_budgets (category, max_budget, max_tx_amount) \
                     VALUES (%(category)s, %(max_budget)s, %(max_tx_amount)s) \
                     ON CONFLICT DO NOTHING",
                )
                .with_param("category", budget.category.as_str())
                .with_param("max_budget", budget.max_budget)
                .with_param("max_tx_amount", budget.max_tx_amount)
                .with_commit(),
            )
            .await?;
    }

    info!(
        tables = TABLES.len(),
        users = users.len(),
        budgets = budgets.len(),
        "Schema bootstrap complete"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use butler_db::mock::{MockConnector, Scripted};
    use butler_types::Value;

    use super::*;
    use crate::config::ServiceConfig;
    use crate::loopback::Loopback;
    use crate::service::DbService;

    async fn loopback(probe: &MockConnector) -> Loopback<MockConnector> {
        Loopback::new(
            DbService::start(probe.clone(), &ServiceConfig::default())
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn creates_tables_then_seeds_with_commit() {
        let probe = MockConnector::new();
        let mut channel = loopback(&probe).await;
        let users = [SeedUser { id: 42, name: "Ann".to_owned() }];
        let budgets = [SeedBudget {
            category: "Rent".to_owned(),
            max_budget: Some(Decimal::new(2_000, 0)),
            max_tx_amount: None,
        }];

        bootstrap(&mut channel, &users, &budgets).await.unwrap();

        let executed = probe.executed();
        assert_eq!(executed.len(), 6);
        assert!(executed[..4].iter().all(|e| e.statement.contains("CREATE TABLE IF NOT EXISTS")));
        assert!(executed[4].statement.contains("ON CONFLICT DO NOTHING"));
        let budget_params = executed[5].params.as_ref().unwrap();
        assert_eq!(budget_params["max_tx_amount"], Value::Null);
        assert_eq!(probe.commits(), 6);
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let probe = MockConnector::new();
        probe.push(Scripted::Ack);
        probe.push(Scripted::Statement("permission denied for schema public".to_owned()));
        let mut channel = loopback(&probe).await;

        let err = bootstrap(&mut channel, &[], &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Statement(_)));
        assert_eq!(probe.executed().len(), 2);
    }

    #[test]
    fn seeds_deserialize_from_yaml() {
        let budgets: Vec<SeedBudget> = serde_yml::from_str(
            "- category: Rent\n  max_budget: 2000\n  max_tx_amount: 2000\n- category: Other\n",
        )
        .unwrap();
        assert_eq!(budgets[0].max_budget, Some(Decimal::new(2_000, 0)));
        assert_eq!(budgets[1].max_budget, None);
    }
}
