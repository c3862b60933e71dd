//! The conversation state machine.
//!
//! Each user is always in exactly one [`Stage`]. An incoming [`Update`] is
//! checked against the stage's guards, handled, and answered with a
//! [`Turn`]: the replies to send and the stage to move to. Handlers never
//! fail outward; a database error becomes the apology and lands the user
//! back on the menu.
//!
//! ```text
//! Ended --any text--> Menu --Log Expense--> ExpenseCategory -> ExpenseAmount
//!   ^                  ^ |                  -> ExpenseNotes -> ExpenseReview --Yes--> Menu
//!   |                  | +--Log Gift--> GiftRecipient -> GiftItem -> GiftAmount
//!   +----/cancel-------+                -> GiftNote -> GiftReview --Yes--> Menu
//! ```

use butler_proxy::QueryChannel;
use chrono::Local;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::budget::{BudgetCheck, BudgetLimits, format_money};
use crate::config::AssistantConfig;
use crate::error::AssistantError;
use crate::guard::{Guard, Verdict, parse_amount, run_guards};
use crate::keyboard::{Keyboard, gen_keyboard};
use crate::lines;
use crate::stores::{CategorySpend, Expense, ExpenseStore, Gift, GiftStore, Transaction};

const START: &str = "/start";
const MENU: &str = "/menu";
const CANCEL: &str = "/cancel";

const ENTRY_GUARDS: &[Guard] = &[Guard::AllowList];
const EXPENSE_CATEGORY_GUARDS: &[Guard] = &[Guard::OneOf(&lines::EXPENSE_CATEGORIES)];
const TXN_CATEGORY_GUARDS: &[Guard] = &[Guard::OneOf(&lines::TXN_CATEGORIES)];
const AMOUNT_GUARDS: &[Guard] = &[Guard::Amount];
const REVIEW_GUARDS: &[Guard] = &[Guard::OneOf(&[lines::YES, lines::NO])];

/// Who sent an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Chat-network user ID, checked against the allow-list.
    pub id: i64,
    /// First name, used to address the user.
    pub first_name: String,
    /// Handle, if the user has one.
    pub username: Option<String>,
}

impl Sender {
    /// Name shown in logs.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.first_name)
    }

    /// Value recorded in the `username` column: the handle, or the numeric
    /// ID when there is none.
    pub fn log_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// One incoming text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Chat the replies go to.
    pub chat_id: i64,
    /// Who sent it.
    pub sender: Sender,
    /// Message text.
    pub text: String,
}

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Message text.
    pub text: String,
    /// Suggested answers, if the reply asks a closed question.
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    /// A plain text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    /// A reply offering a keyboard of answers.
    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// The outcome of handling one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Replies, in sending order.
    pub replies: Vec<Reply>,
    /// Stage the user is in afterwards.
    pub next: Stage,
}

/// Where a user is in the conversation, carrying what they have entered
/// so far. Every stage except [`Stage::Ended`] is waiting for an answer to
/// the question [`Stage::prompt`] asks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Stage {
    /// No conversation in progress.
    #[default]
    Ended,
    /// Waiting for a menu choice.
    Menu,
    /// Waiting for an expense category.
    ExpenseCategory,
    /// Waiting for the expense amount.
    ExpenseAmount {
        /// Chosen category.
        category: String,
        /// Spend in the category so far this month.
        spent: Decimal,
        /// The category's limits.
        limits: BudgetLimits,
    },
    /// Waiting for expense notes.
    ExpenseNotes {
        /// Chosen category.
        category: String,
        /// Entered amount.
        amount: Decimal,
    },
    /// Waiting for confirmation of the expense.
    ExpenseReview {
        /// Chosen category.
        category: String,
        /// Entered amount.
        amount: Decimal,
        /// Entered notes.
        notes: String,
    },
    /// Waiting for the category to list transactions for.
    TxnCategory,
    /// Waiting for the gift recipient.
    GiftRecipient,
    /// Waiting for the gift item.
    GiftItem {
        /// Entered recipient.
        recipient: String,
    },
    /// Waiting for the gift amount.
    GiftAmount {
        /// Entered recipient.
        recipient: String,
        /// Entered item.
        item: String,
    },
    /// Waiting for the gift note.
    GiftNote {
        /// Entered recipient.
        recipient: String,
        /// Entered item.
        item: String,
        /// Entered amount.
        amount: Decimal,
    },
    /// Waiting for confirmation of the gift.
    GiftReview {
        /// Entered recipient.
        recipient: String,
        /// Entered item.
        item: String,
        /// Entered amount.
        amount: Decimal,
        /// Entered note.
        notes: String,
    },
}

impl Stage {
    /// Short name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ended => "ended",
            Self::Menu => "menu",
            Self::ExpenseCategory => "expense_category",
            Self::ExpenseAmount { .. } => "expense_amount",
            Self::ExpenseNotes { .. } => "expense_notes",
            Self::ExpenseReview { .. } => "expense_review",
            Self::TxnCategory => "txn_category",
            Self::GiftRecipient => "gift_recipient",
            Self::GiftItem { .. } => "gift_item",
            Self::GiftAmount { .. } => "gift_amount",
            Self::GiftNote { .. } => "gift_note",
            Self::GiftReview { .. } => "gift_review",
        }
    }

    /// The question this stage is waiting on an answer to.
    pub fn prompt(&self) -> Vec<Reply> {
        match self {
            Self::Ended => Vec::new(),
            Self::Menu => vec![menu()],
            Self::ExpenseCategory => vec![Reply::with_keyboard(
                lines::ASK_EXPENSE_CATEGORY,
                gen_keyboard(&lines::EXPENSE_CATEGORIES, Some(2), None),
            )],
            Self::ExpenseAmount { .. } => vec![Reply::text(lines::ASK_EXPENSE_AMOUNT)],
            Self::ExpenseNotes { .. } => vec![Reply::text(lines::ASK_EXPENSE_NOTES)],
            Self::ExpenseReview {
                category,
                amount,
                notes,
            } => vec![review(&[
                ("category", category.clone()),
                ("amount", amount.to_string()),
                ("notes", notes.clone()),
            ])],
            Self::TxnCategory => vec![Reply::with_keyboard(
                lines::ASK_TXN_CATEGORY,
                gen_keyboard(&lines::TXN_CATEGORIES, Some(2), None),
            )],
            Self::GiftRecipient => vec![
                Reply::text(lines::pick(&lines::LINES_ENTHUSIASM)),
                Reply::text(lines::ASK_GIFT_RECIPIENT),
            ],
            Self::GiftItem { .. } => vec![Reply::text(lines::ASK_GIFT_ITEM)],
            Self::GiftAmount { .. } => vec![Reply::text(lines::ASK_GIFT_AMOUNT)],
            Self::GiftNote { .. } => vec![Reply::text(lines::ASK_GIFT_NOTE)],
            Self::GiftReview {
                recipient,
                item,
                amount,
                notes,
            } => vec![review(&[
                ("recipient", recipient.clone()),
                ("item", item.clone()),
                ("amount", amount.to_string()),
                ("notes", notes.clone()),
            ])],
        }
    }

    /// Guards checked before this stage's handler runs.
    pub const fn guards(&self) -> &'static [Guard] {
        match self {
            Self::Ended | Self::Menu => ENTRY_GUARDS,
            Self::ExpenseCategory => EXPENSE_CATEGORY_GUARDS,
            Self::TxnCategory => TXN_CATEGORY_GUARDS,
            Self::ExpenseAmount { .. } | Self::GiftAmount { .. } => AMOUNT_GUARDS,
            Self::ExpenseReview { .. } | Self::GiftReview { .. } => REVIEW_GUARDS,
            Self::ExpenseNotes { .. }
            | Self::GiftRecipient
            | Self::GiftItem { .. }
            | Self::GiftNote { .. } => &[],
        }
    }
}

/// Handles updates for every user; per-user state lives in the caller.
#[derive(Debug)]
pub struct Assistant {
    config: AssistantConfig,
    budget: BudgetCheck,
}

impl Assistant {
    /// Create an assistant with the given dialog settings.
    pub const fn new(config: AssistantConfig) -> Self {
        let budget = BudgetCheck::new(config.warn_threshold);
        Self { config, budget }
    }

    /// The dialog settings.
    pub const fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Handle one update from a user currently in `stage`.
    pub async fn handle<Q: QueryChannel>(
        &self,
        stage: Stage,
        update: &Update,
        channel: &mut Q,
    ) -> Turn {
        debug!(
            user = update.sender.display_name(),
            stage = stage.name(),
            text = update.text,
            "Handling update"
        );
        match self.step(stage, update, channel).await {
            Ok(turn) => turn,
            Err(e) => {
                warn!(
                    user = update.sender.display_name(),
                    error = %e,
                    "Update caused an error"
                );
                self.apologize()
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    async fn step<Q: QueryChannel>(
        &self,
        stage: Stage,
        update: &Update,
        channel: &mut Q,
    ) -> Result<Turn, AssistantError> {
        let text = update.text.trim();
        if text == CANCEL {
            return Ok(farewell(update));
        }

        let guards = if text == START || text == MENU {
            ENTRY_GUARDS
        } else {
            stage.guards()
        };
        if let Verdict::Fallback(turn) = run_guards(guards, update, &stage, channel).await? {
            return Ok(turn);
        }

        if text == START {
            return Ok(self.greet(update));
        }
        if text == MENU {
            return Ok(ask(Stage::Menu));
        }
        if text.starts_with('/') {
            return Ok(confused());
        }

        match stage {
            Stage::Ended => Ok(self.greet(update)),
            Stage::Menu => self.choose_task(text, update, channel).await,
            Stage::ExpenseCategory => self.expense_category(text, channel).await,
            Stage::ExpenseAmount {
                category,
                spent,
                limits,
            } => Ok(self.expense_amount(text, category, spent, &limits)),
            Stage::ExpenseNotes { category, amount } => Ok(ask(Stage::ExpenseReview {
                category,
                amount,
                notes: text.to_owned(),
            })),
            Stage::ExpenseReview {
                category,
                amount,
                notes,
            } => {
                if text != lines::YES {
                    return Ok(retry(lines::EXPENSE_RETRY, Stage::ExpenseCategory));
                }
                let expense = Expense {
                    username: update.sender.log_name(),
                    category,
                    amount,
                    notes,
                    tx_timestamp: Local::now().naive_local(),
                };
                upload_expense(&expense, update, channel).await
            }
            Stage::TxnCategory => self.transactions(text, channel).await,
            Stage::GiftRecipient => Ok(ask(Stage::GiftItem {
                recipient: text.to_owned(),
            })),
            Stage::GiftItem { recipient } => Ok(ask(Stage::GiftAmount {
                recipient,
                item: text.to_owned(),
            })),
            Stage::GiftAmount { recipient, item } => {
                let Some(amount) = parse_amount(text) else {
                    return Ok(ask(Stage::GiftAmount { recipient, item }));
                };
                Ok(ask(Stage::GiftNote {
                    recipient,
                    item,
                    amount,
                }))
            }
            Stage::GiftNote {
                recipient,
                item,
                amount,
            } => Ok(ask(Stage::GiftReview {
                recipient,
                item,
                amount,
                notes: text.to_owned(),
            })),
            Stage::GiftReview {
                recipient,
                item,
                amount,
                notes,
            } => {
                if text != lines::YES {
                    return Ok(retry(lines::GIFT_RETRY, Stage::GiftRecipient));
                }
                let gift = Gift {
                    username: update.sender.log_name(),
                    recipient,
                    item,
                    amount,
                    notes,
                    tx_timestamp: Local::now().naive_local(),
                };
                upload_gift(&gift, update, channel).await
            }
        }
    }

    async fn choose_task<Q: QueryChannel>(
        &self,
        text: &str,
        update: &Update,
        channel: &mut Q,
    ) -> Result<Turn, AssistantError> {
        match text {
            lines::LOG_EXPENSE => Ok(ask(Stage::ExpenseCategory)),
            lines::LAST_TXNS => Ok(ask(Stage::TxnCategory)),
            lines::LOG_GIFT => Ok(ask(Stage::GiftRecipient)),
            lines::SPEND_MONTH => {
                let summary = ExpenseStore::new(channel).month_summary().await?;
                Ok(land(vec![Reply::text(month_summary(&summary))]))
            }
            lines::GIFT_SPEND => {
                let total = GiftStore::new(channel).month_total().await?;
                Ok(land(vec![Reply::text(format!(
                    "Total spent on gifts this month:\n\t{} {}",
                    self.config.currency,
                    format_money(total)
                ))]))
            }
            lines::EXIT_STR => Ok(farewell(update)),
            _ => Ok(confused()),
        }
    }

    async fn expense_category<Q: QueryChannel>(
        &self,
        category: &str,
        channel: &mut Q,
    ) -> Result<Turn, AssistantError> {
        let mut expenses = ExpenseStore::new(channel);
        let spent = expenses.month_spend_for(category).await?;
        let limits = expenses.budget_for(category).await?;

        let warning = self.budget.before_amount(category, spent, &limits);
        let next = Stage::ExpenseAmount {
            category: category.to_owned(),
            spent,
            limits,
        };
        let mut replies: Vec<Reply> = warning.into_iter().map(Reply::text).collect();
        replies.extend(next.prompt());
        Ok(Turn { replies, next })
    }

    fn expense_amount(
        &self,
        text: &str,
        category: String,
        spent: Decimal,
        limits: &BudgetLimits,
    ) -> Turn {
        let Some(amount) = parse_amount(text) else {
            return ask(Stage::ExpenseAmount {
                category,
                spent,
                limits: *limits,
            });
        };
        let remarks = self.budget.after_amount(&category, spent, amount, limits);
        let next = Stage::ExpenseNotes { category, amount };
        let mut replies: Vec<Reply> = remarks.into_iter().map(Reply::text).collect();
        replies.extend(next.prompt());
        Turn { replies, next }
    }

    async fn transactions<Q: QueryChannel>(
        &self,
        text: &str,
        channel: &mut Q,
    ) -> Result<Turn, AssistantError> {
        let category = (!text.eq_ignore_ascii_case(lines::ALL)).then_some(text);
        let txns = ExpenseStore::new(channel)
            .recent(category, self.config.recent_txn_limit)
            .await?;
        let listing = txns
            .iter()
            .map(|txn| format_transaction(txn, &self.config.currency))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(land(vec![Reply::text(format!(
            "Recent transactions for {text}\n\n{listing}"
        ))]))
    }

    fn greet(&self, update: &Update) -> Turn {
        info!(user = update.sender.display_name(), "Start");
        Turn {
            replies: vec![
                Reply::text(lines::greeting(&update.sender.first_name, self.config.vacation)),
                menu(),
            ],
            next: Stage::Menu,
        }
    }

    fn apologize(&self) -> Turn {
        Turn {
            replies: vec![
                Reply::text(lines::apology(&self.config.dev_name)),
                Reply::text(lines::APOLOGY_FOLLOW_UP),
                menu(),
            ],
            next: Stage::Menu,
        }
    }
}

async fn upload_expense<Q: QueryChannel>(
    expense: &Expense,
    update: &Update,
    channel: &mut Q,
) -> Result<Turn, AssistantError> {
    ExpenseStore::new(channel).insert(expense).await?;
    info!(
        user = update.sender.display_name(),
        category = expense.category,
        amount = %expense.amount,
        "Expense logged"
    );
    Ok(land(vec![Reply::text(lines::EXPENSE_UPLOADED)]))
}

async fn upload_gift<Q: QueryChannel>(
    gift: &Gift,
    update: &Update,
    channel: &mut Q,
) -> Result<Turn, AssistantError> {
    GiftStore::new(channel).insert(gift).await?;
    info!(
        user = update.sender.display_name(),
        amount = %gift.amount,
        "Gift logged"
    );
    Ok(land(vec![Reply::text(lines::GIFT_UPLOADED)]))
}

fn menu() -> Reply {
    let mut keyboard = gen_keyboard(&lines::TASKS, None, None);
    keyboard.push(vec![lines::EXIT_STR.to_owned()]);
    Reply::with_keyboard(lines::MENU, keyboard)
}

fn review(fields: &[(&str, String)]) -> Reply {
    Reply::with_keyboard(
        lines::review(fields),
        gen_keyboard(&[lines::YES, lines::NO], Some(2), None),
    )
}

/// Move to `next` and ask its question.
fn ask(next: Stage) -> Turn {
    Turn {
        replies: next.prompt(),
        next,
    }
}

/// Say `line`, then start a flow over at `next`.
fn retry(line: &str, next: Stage) -> Turn {
    let mut turn = ask(next);
    turn.replies.insert(0, Reply::text(line));
    turn
}

/// Finish a task and offer the menu again.
fn land(mut replies: Vec<Reply>) -> Turn {
    replies.push(Reply::text(lines::LAND));
    replies.push(menu());
    Turn {
        replies,
        next: Stage::Menu,
    }
}

fn confused() -> Turn {
    Turn {
        replies: vec![Reply::text(lines::CONFUSED), menu()],
        next: Stage::Menu,
    }
}

fn farewell(update: &Update) -> Turn {
    info!(user = update.sender.display_name(), "Cancel");
    Turn {
        replies: vec![Reply::text(lines::farewell(&update.sender.first_name))],
        next: Stage::Ended,
    }
}

fn month_summary(summary: &[CategorySpend]) -> String {
    let total = summary
        .iter()
        .fold(Decimal::ZERO, |acc, row| acc.saturating_add(row.spent));
    let rows = summary
        .iter()
        .map(|row| {
            let over = if row.spent > row.budget { "*" } else { " " };
            format!("    - {}{over} : {}", row.category, format_money(row.spent))
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Here is the running spend summary this month for both the sir and the madam\n\n\
         Total: {}\n{rows}",
        format_money(total)
    )
}

fn format_transaction(txn: &Transaction, currency: &str) -> String {
    let stamp = txn.at.format("%b-%d %H:%M");
    let amount = txn.amount.round_dp(1);
    let notes = txn.notes.as_deref().unwrap_or_default();
    match &txn.category {
        Some(category) => format!("[{stamp}] {currency} {amount:.1}; {category} - {notes}"),
        None => format!("[{stamp}] {currency} {amount:.1}; {notes}"),
    }
}
