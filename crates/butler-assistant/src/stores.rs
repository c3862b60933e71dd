//! Table operations issued through a [`QueryChannel`].
//!
//! Each store borrows the channel for the duration of one dialog step.
//! Values are always bound as named parameters.

use butler_proxy::QueryChannel;
use butler_types::{QueryRequest, Row, Value};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::budget::BudgetLimits;
use crate::error::AssistantError;

/// Operations on the `users` allow-list.
pub struct UserStore<'a, Q> {
    channel: &'a mut Q,
}

impl<'a, Q: QueryChannel> UserStore<'a, Q> {
    /// Create a user store over a channel.
    pub const fn new(channel: &'a mut Q) -> Self {
        Self { channel }
    }

    /// Whether `id` is on the allow-list.
    pub async fn is_allowed(&mut self, id: i64) -> Result<bool, AssistantError> {
        let rows = self
            .channel
            .fetch(
                QueryRequest::new("SELECT COUNT(id) > 0 FROM users WHERE id = %(id)s")
                    .with_param("id", id),
            )
            .await?;
        first_value(&rows)?
            .as_bool()
            .ok_or_else(|| AssistantError::InvalidRow("allow-list check is not a boolean".to_owned()))
    }

    /// Add a user to the allow-list.
    pub async fn add(&mut self, id: i64, name: &str) -> Result<(), AssistantError> {
        self.channel
            .execute(
                QueryRequest::new("INSERT INTO users (id, name) VALUES (%(id)s, %(name)s)")
                    .with_param("id", id)
                    .with_param("name", name)
                    .with_commit(),
            )
            .await?;
        tracing::info!(user_id = id, name, "User added to allow-list");
        Ok(())
    }

    /// Remove a user from the allow-list.
    pub async fn remove(&mut self, id: i64) -> Result<(), AssistantError> {
        self.channel
            .execute(
                QueryRequest::new("DELETE FROM users WHERE id = %(id)s")
                    .with_param("id", id)
                    .with_commit(),
            )
            .await?;
        tracing::info!(user_id = id, "User removed from allow-list");
        Ok(())
    }
}

/// A row for `spend_log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    /// Sender's username, or their numeric ID when they have none.
    pub username: String,
    /// Expense category.
    pub category: String,
    /// Amount spent.
    pub amount: Decimal,
    /// Free-text notes.
    pub notes: String,
    /// Local time the expense was confirmed.
    pub tx_timestamp: NaiveDateTime,
}

/// One line of the monthly summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySpend {
    /// Expense category.
    pub category: String,
    /// Spend so far this month.
    pub spent: Decimal,
    /// The category's monthly budget, or the default limit.
    pub budget: Decimal,
}

/// One logged expense, as listed by [`ExpenseStore::recent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// When it was logged.
    pub at: NaiveDateTime,
    /// Amount spent.
    pub amount: Decimal,
    /// Category, present only when listing every category.
    pub category: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
}

/// Operations on `spend_log` and `monthly_budgets`.
pub struct ExpenseStore<'a, Q> {
    channel: &'a mut Q,
}

impl<'a, Q: QueryChannel> ExpenseStore<'a, Q> {
    /// Create an expense store over a channel.
    pub const fn new(channel: &'a mut Q) -> Self {
        Self { channel }
    }

    /// Spend in `category` since the start of the current month.
    pub async fn month_spend_for(&mut self, category: &str) -> Result<Decimal, AssistantError> {
        let rows = self
            .channel
            .fetch(
                QueryRequest::new(
                    "SELECT COALESCE(SUM(amount), 0) FROM spend_log \
                     WHERE category = %(category)s \
                     AND tx_timestamp >= date_trunc('month', localtimestamp)",
                )
                .with_param("category", category),
            )
            .await?;
        decimal_or_zero(first_value(&rows)?)
    }

    /// Limits for `category`; a missing row or `NULL` column falls back to
    /// the default limit.
    pub async fn budget_for(&mut self, category: &str) -> Result<BudgetLimits, AssistantError> {
        let rows = self
            .channel
            .fetch(
                QueryRequest::new(
                    "SELECT max_budget, max_tx_amount FROM monthly_budgets \
                     WHERE category = %(category)s",
                )
                .with_param("category", category),
            )
            .await?;
        let Some(row) = rows.first() else {
            return Ok(BudgetLimits::default());
        };
        Ok(BudgetLimits::from_columns(
            optional_decimal(column(row, 0)?)?,
            optional_decimal(column(row, 1)?)?,
        ))
    }

    /// Record an expense.
    pub async fn insert(&mut self, expense: &Expense) -> Result<(), AssistantError> {
        self.channel
            .execute(
                QueryRequest::new(
                    "INSERT INTO spend_log (username, category, amount, notes, tx_timestamp) \
                     VALUES (%(username)s, %(category)s, %(amount)s, %(notes)s, %(tx_timestamp)s)",
                )
                .with_param("username", expense.username.as_str())
                .with_param("category", expense.category.as_str())
                .with_param("amount", expense.amount)
                .with_param("notes", expense.notes.as_str())
                .with_param("tx_timestamp", expense.tx_timestamp)
                .with_commit(),
            )
            .await?;
        tracing::debug!(
            username = expense.username,
            category = expense.category,
            amount = %expense.amount,
            "Expense recorded"
        );
        Ok(())
    }

    /// This month's spend per category with its budget, largest first.
    pub async fn month_summary(&mut self) -> Result<Vec<CategorySpend>, AssistantError> {
        let rows = self
            .channel
            .fetch(QueryRequest::new(
                "SELECT month_spd.category, month_spd.total_spend, \
                        COALESCE(monthly_budgets.max_budget, 1e9) \
                 FROM ( \
                     SELECT category, SUM(amount) AS total_spend \
                     FROM spend_log \
                     WHERE tx_timestamp >= date_trunc('month', localtimestamp) \
                     GROUP BY category \
                 ) AS month_spd \
                 LEFT JOIN monthly_budgets ON month_spd.category = monthly_budgets.category \
                 ORDER BY month_spd.total_spend DESC",
            ))
            .await?;
        rows.iter()
            .map(|row| {
                Ok(CategorySpend {
                    category: text(column(row, 0)?)?,
                    spent: decimal_or_zero(column(row, 1)?)?,
                    budget: decimal_or_zero(column(row, 2)?)?,
                })
            })
            .collect()
    }

    /// The most recent `limit` expenses, newest first, in one category or
    /// in all of them.
    pub async fn recent(
        &mut self,
        category: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Transaction>, AssistantError> {
        let request = match category {
            Some(category) => QueryRequest::new(
                "SELECT tx_timestamp, amount, notes FROM spend_log \
                 WHERE category = %(category)s \
                 ORDER BY tx_timestamp DESC LIMIT %(limit)s",
            )
            .with_param("category", category),
            None => QueryRequest::new(
                "SELECT tx_timestamp, amount, category, notes FROM spend_log \
                 ORDER BY tx_timestamp DESC LIMIT %(limit)s",
            ),
        };
        let rows = self.channel.fetch(request.with_param("limit", limit)).await?;

        rows.iter()
            .map(|row| {
                let (category, notes) = if category.is_some() {
                    (None, optional_text(column(row, 2)?)?)
                } else {
                    (Some(text(column(row, 2)?)?), optional_text(column(row, 3)?)?)
                };
                Ok(Transaction {
                    at: timestamp(column(row, 0)?)?,
                    amount: decimal_or_zero(column(row, 1)?)?,
                    category,
                    notes,
                })
            })
            .collect()
    }
}

/// A row for `gift_log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gift {
    /// Sender's username, or their numeric ID when they have none.
    pub username: String,
    /// Who the gift is for.
    pub recipient: String,
    /// What was bought.
    pub item: String,
    /// Amount spent.
    pub amount: Decimal,
    /// Free-text notes.
    pub notes: String,
    /// Local time the gift was confirmed.
    pub tx_timestamp: NaiveDateTime,
}

/// Operations on `gift_log`.
pub struct GiftStore<'a, Q> {
    channel: &'a mut Q,
}

impl<'a, Q: QueryChannel> GiftStore<'a, Q> {
    /// Create a gift store over a channel.
    pub const fn new(channel: &'a mut Q) -> Self {
        Self { channel }
    }

    /// Record a gift.
    pub async fn insert(&mut self, gift: &Gift) -> Result<(), AssistantError> {
        self.channel
            .execute(
                QueryRequest::new(
                    "INSERT INTO gift_log (username, recipient, item, amount, notes, tx_timestamp) \
                     VALUES (%(username)s, %(recipient)s, %(item)s, %(amount)s, %(notes)s, \
                     %(tx_timestamp)s)",
                )
                .with_param("username", gift.username.as_str())
                .with_param("recipient", gift.recipient.as_str())
                .with_param("item", gift.item.as_str())
                .with_param("amount", gift.amount)
                .with_param("notes", gift.notes.as_str())
                .with_param("tx_timestamp", gift.tx_timestamp)
                .with_commit(),
            )
            .await?;
        tracing::debug!(username = gift.username, amount = %gift.amount, "Gift recorded");
        Ok(())
    }

    /// Total spent on gifts since the start of the current month.
    pub async fn month_total(&mut self) -> Result<Decimal, AssistantError> {
        let rows = self
            .channel
            .fetch(QueryRequest::new(
                "SELECT COALESCE(SUM(amount), 0) FROM gift_log \
                 WHERE tx_timestamp >= date_trunc('month', localtimestamp)",
            ))
            .await?;
        decimal_or_zero(first_value(&rows)?)
    }
}

fn first_value(rows: &[Row]) -> Result<&Value, AssistantError> {
    let row = rows
        .first()
        .ok_or_else(|| AssistantError::InvalidRow("expected one row, got none".to_owned()))?;
    column(row, 0)
}

fn column(row: &Row, index: usize) -> Result<&Value, AssistantError> {
    row.get(index).ok_or_else(|| {
        AssistantError::InvalidRow(format!("row has {} columns, wanted column {index}", row.len()))
    })
}

fn decimal_or_zero(value: &Value) -> Result<Decimal, AssistantError> {
    Ok(optional_decimal(value)?.unwrap_or(Decimal::ZERO))
}

fn optional_decimal(value: &Value) -> Result<Option<Decimal>, AssistantError> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_decimal()
        .map(Some)
        .ok_or_else(|| AssistantError::InvalidRow(format!("expected a number, got {value:?}")))
}

fn text(value: &Value) -> Result<String, AssistantError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| AssistantError::InvalidRow(format!("expected text, got {value:?}")))
}

fn optional_text(value: &Value) -> Result<Option<String>, AssistantError> {
    if value.is_null() {
        Ok(None)
    } else {
        text(value).map(Some)
    }
}

fn timestamp(value: &Value) -> Result<NaiveDateTime, AssistantError> {
    value
        .as_timestamp()
        .ok_or_else(|| AssistantError::InvalidRow(format!("expected a timestamp, got {value:?}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use butler_db::mock::{MockConnector, Scripted};
    use chrono::NaiveDate;

    use super::*;
    use crate::budget::DEFAULT_LIMIT;
    use crate::testing::loopback;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 3)
            .unwrap()
            .and_hms_opt(hour, 15, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn allow_list_reads_the_boolean() {
        let probe = MockConnector::new();
        probe.push(Scripted::Rows(vec![vec![Value::Bool(true)]]));
        probe.push(Scripted::Rows(vec![vec![Value::Bool(false)]]));
        let mut channel = loopback(&probe).await;
        let mut users = UserStore::new(&mut channel);

        assert!(users.is_allowed(7).await.unwrap());
        assert!(!users.is_allowed(8).await.unwrap());
        let executed = probe.executed();
        assert_eq!(executed[1].params.as_ref().unwrap()["id"], Value::Int(8));
    }

    #[tokio::test]
    async fn add_and_remove_commit() {
        let probe = MockConnector::new();
        let mut channel = loopback(&probe).await;
        let mut users = UserStore::new(&mut channel);

        users.add(7, "Ann").await.unwrap();
        users.remove(7).await.unwrap();
        assert_eq!(probe.commits(), 2);
        assert!(probe.executed()[1].statement.starts_with("DELETE FROM users"));
    }

    #[tokio::test]
    async fn missing_budget_row_uses_default_limits() {
        let probe = MockConnector::new();
        probe.push(Scripted::Rows(Vec::new()));
        probe.push(Scripted::Rows(vec![vec![Value::Decimal(Decimal::from(500)), Value::Null]]));
        let mut channel = loopback(&probe).await;
        let mut expenses = ExpenseStore::new(&mut channel);

        assert_eq!(expenses.budget_for("Other").await.unwrap(), BudgetLimits::default());
        let limits = expenses.budget_for("Shopping").await.unwrap();
        assert_eq!(limits.max_budget, Decimal::from(500));
        assert_eq!(limits.max_tx, DEFAULT_LIMIT);
    }

    #[tokio::test]
    async fn month_spend_treats_null_as_zero() {
        let probe = MockConnector::new();
        probe.push(Scripted::Rows(vec![vec![Value::Null]]));
        let mut channel = loopback(&probe).await;

        let spent = ExpenseStore::new(&mut channel).month_spend_for("Rent").await.unwrap();
        assert_eq!(spent, Decimal::ZERO);
    }

    #[tokio::test]
    async fn insert_binds_every_column() {
        let probe = MockConnector::new();
        let mut channel = loopback(&probe).await;
        let expense = Expense {
            username: "ann".to_owned(),
            category: "Quick Meal".to_owned(),
            amount: Decimal::new(1_250, 2),
            notes: "no comment".to_owned(),
            tx_timestamp: at(12),
        };

        ExpenseStore::new(&mut channel).insert(&expense).await.unwrap();
        let executed = probe.executed();
        let params = executed[0].params.as_ref().unwrap();
        assert_eq!(params["amount"], Value::Decimal(Decimal::new(1_250, 2)));
        assert_eq!(params["tx_timestamp"], Value::Timestamp(at(12)));
        assert_eq!(probe.commits(), 1);
    }

    #[tokio::test]
    async fn recent_binds_category_instead_of_splicing_it() {
        let probe = MockConnector::new();
        probe.push(Scripted::Rows(vec![vec![
            Value::Timestamp(at(9)),
            Value::Decimal(Decimal::new(45, 1)),
            Value::from("kopi"),
        ]]));
        let mut channel = loopback(&probe).await;

        let txns = ExpenseStore::new(&mut channel)
            .recent(Some("Quick Meal'; DROP TABLE spend_log; --"), 8)
            .await
            .unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].category, None);
        assert_eq!(txns[0].notes.as_deref(), Some("kopi"));

        let executed = probe.executed();
        assert!(!executed[0].statement.contains("DROP TABLE"));
        let params = executed[0].params.as_ref().unwrap();
        assert_eq!(params["limit"], Value::Int(8));
    }

    #[tokio::test]
    async fn recent_across_categories_reads_category_column() {
        let probe = MockConnector::new();
        probe.push(Scripted::Rows(vec![vec![
            Value::Timestamp(at(20)),
            Value::Decimal(Decimal::from(1_800)),
            Value::from("Rent"),
            Value::Null,
        ]]));
        let mut channel = loopback(&probe).await;

        let txns = ExpenseStore::new(&mut channel).recent(None, 3).await.unwrap();
        assert_eq!(txns[0].category.as_deref(), Some("Rent"));
        assert_eq!(txns[0].notes, None);
        assert!(probe.executed()[0].params.as_ref().unwrap().get("category").is_none());
    }

    #[tokio::test]
    async fn summary_decodes_rows() {
        let probe = MockConnector::new();
        probe.push(Scripted::Rows(vec![
            vec![
                Value::from("Rent"),
                Value::Decimal(Decimal::from(1_800)),
                Value::Decimal(Decimal::from(2_000)),
            ],
            vec![
                Value::from("Other"),
                Value::Decimal(Decimal::from(30)),
                Value::Decimal(DEFAULT_LIMIT),
            ],
        ]));
        let mut channel = loopback(&probe).await;

        let summary = ExpenseStore::new(&mut channel).month_summary().await.unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].category, "Rent");
        assert_eq!(summary[1].budget, DEFAULT_LIMIT);
    }

    #[tokio::test]
    async fn malformed_row_is_reported() {
        let probe = MockConnector::new();
        probe.push(Scripted::Rows(vec![vec![Value::from("not a number")]]));
        let mut channel = loopback(&probe).await;

        let err = GiftStore::new(&mut channel).month_total().await.unwrap_err();
        assert!(matches!(err, AssistantError::InvalidRow(_)));
    }

    #[tokio::test]
    async fn gift_insert_commits() {
        let probe = MockConnector::new();
        let mut channel = loopback(&probe).await;
        let gift = Gift {
            username: "42".to_owned(),
            recipient: "Mum".to_owned(),
            item: "Scarf".to_owned(),
            amount: Decimal::from(60),
            notes: "birthday".to_owned(),
            tx_timestamp: at(18),
        };

        GiftStore::new(&mut channel).insert(&gift).await.unwrap();
        assert_eq!(probe.commits(), 1);
        assert!(probe.executed()[0].statement.starts_with("INSERT INTO gift_log"));
    }
}
