//! Checks that run before a dialog step's handler.
//!
//! A step declares an ordered list of guards. The first guard that does not
//! let the update through supplies the whole turn instead of the handler.

use std::str::FromStr as _;

use butler_proxy::QueryChannel;
use rust_decimal::Decimal;
use tracing::error;

use crate::dialog::{Reply, Stage, Turn, Update};
use crate::error::AssistantError;
use crate::lines;
use crate::stores::UserStore;

/// Outcome of a guard.
#[derive(Debug)]
pub enum Verdict {
    /// Run the next guard, or the handler if this was the last.
    Proceed,
    /// Skip the handler and answer with this turn.
    Fallback(Turn),
}

/// A single precondition on an update.
#[derive(Debug, Clone, Copy)]
pub enum Guard {
    /// The sender must be on the `users` allow-list.
    AllowList,
    /// The text must be one of these answers exactly.
    OneOf(&'static [&'static str]),
    /// The text must be a positive amount.
    Amount,
}

impl Guard {
    /// Evaluate the guard for `update` arriving while in `stage`.
    ///
    /// Validation failures re-ask the stage's question and stay in it.
    pub async fn check<Q: QueryChannel>(
        self,
        update: &Update,
        stage: &Stage,
        channel: &mut Q,
    ) -> Result<Verdict, AssistantError> {
        let passed = match self {
            Self::AllowList => {
                if UserStore::new(channel).is_allowed(update.sender.id).await? {
                    true
                } else {
                    error!(
                        name = update.sender.display_name(),
                        id = update.sender.id,
                        "Access attempt by unknown sender"
                    );
                    return Ok(Verdict::Fallback(Turn {
                        replies: vec![Reply::text(lines::ACCESS_DENIED)],
                        next: Stage::Ended,
                    }));
                }
            }
            Self::OneOf(answers) => answers.contains(&update.text.trim()),
            Self::Amount => parse_amount(&update.text).is_some(),
        };

        if passed {
            return Ok(Verdict::Proceed);
        }
        let mut replies = vec![Reply::text(lines::not_an_answer(&update.text))];
        replies.extend(stage.prompt());
        Ok(Verdict::Fallback(Turn {
            replies,
            next: stage.clone(),
        }))
    }
}

/// Evaluate `guards` in order, stopping at the first fallback.
pub async fn run_guards<Q: QueryChannel>(
    guards: &[Guard],
    update: &Update,
    stage: &Stage,
    channel: &mut Q,
) -> Result<Verdict, AssistantError> {
    for guard in guards {
        if let Verdict::Fallback(turn) = guard.check(update, stage, channel).await? {
            return Ok(Verdict::Fallback(turn));
        }
    }
    Ok(Verdict::Proceed)
}

/// Parse a strictly positive amount, tolerating surrounding whitespace.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    Decimal::from_str(text.trim())
        .ok()
        .filter(|amount| amount.is_sign_positive() && !amount.is_zero())
}
