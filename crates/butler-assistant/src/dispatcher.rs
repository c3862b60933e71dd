//! Concurrent handling of incoming updates.
//!
//! Every update runs on its own Tokio task. Updates from one user are
//! serialized by that user's stage lock, so a user's turns apply in
//! arrival order; different users proceed concurrently and only queue up
//! on the shared query channel, one request at a time.

use std::collections::BTreeMap;
use std::sync::Arc;

use butler_proxy::{ClientError, QueryChannel};
use butler_types::{QueryRequest, Row};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument as _, debug};

use crate::dialog::{Assistant, Reply, Stage, Update};

/// Capacity of the outgoing reply queue.
const OUTBOX_CAPACITY: usize = 256;

/// A [`QueryChannel`] shared between tasks.
///
/// Each request takes the lock for its own round trip only, which keeps
/// the underlying channel's one-outstanding-request rule.
pub struct SharedChannel<Q> {
    inner: Arc<Mutex<Q>>,
}

impl<Q> SharedChannel<Q> {
    /// Share `channel`.
    pub fn new(channel: Q) -> Self {
        Self {
            inner: Arc::new(Mutex::new(channel)),
        }
    }
}

impl<Q> Clone for SharedChannel<Q> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Q: QueryChannel> QueryChannel for SharedChannel<Q> {
    async fn send_query(&mut self, request: &QueryRequest) -> Result<Option<Vec<Row>>, ClientError> {
        self.inner.lock().await.send_query(request).await
    }
}

/// A reply addressed to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// Destination chat.
    pub chat_id: i64,
    /// What to send.
    pub reply: Reply,
}

/// Routes updates to the [`Assistant`] and queues the replies.
pub struct Dispatcher<Q> {
    assistant: Arc<Assistant>,
    channel: SharedChannel<Q>,
    stages: Arc<Mutex<BTreeMap<i64, Arc<Mutex<Stage>>>>>,
    outbox: mpsc::Sender<Outgoing>,
}

impl<Q: QueryChannel + 'static> Dispatcher<Q> {
    /// Create a dispatcher and the receiving end of its reply queue.
    pub fn new(assistant: Assistant, channel: Q) -> (Self, mpsc::Receiver<Outgoing>) {
        let (outbox, replies) = mpsc::channel(OUTBOX_CAPACITY);
        let dispatcher = Self {
            assistant: Arc::new(assistant),
            channel: SharedChannel::new(channel),
            stages: Arc::new(Mutex::new(BTreeMap::new())),
            outbox,
        };
        (dispatcher, replies)
    }

    /// Handle `update` on a new task.
    ///
    /// Replies are queued in order once the turn completes. The returned
    /// handle may be dropped; the task runs to completion regardless.
    pub fn dispatch(&self, update: Update) -> JoinHandle<()> {
        let assistant = Arc::clone(&self.assistant);
        let mut channel = self.channel.clone();
        let stages = Arc::clone(&self.stages);
        let outbox = self.outbox.clone();

        tokio::spawn(
            async move {
                let slot = stage_slot(&stages, update.sender.id).await;
                let mut stage = slot.lock().await;
                let current = std::mem::take(&mut *stage);
                let turn = assistant.handle(current, &update, &mut channel).await;
                *stage = turn.next;
                debug!(
                    user_id = update.sender.id,
                    stage = stage.name(),
                    replies = turn.replies.len(),
                    "Turn complete"
                );

                for reply in turn.replies {
                    let outgoing = Outgoing {
                        chat_id: update.chat_id,
                        reply,
                    };
                    if outbox.send(outgoing).await.is_err() {
                        debug!(chat_id = update.chat_id, "Reply queue closed, dropping replies");
                        break;
                    }
                }
            }
            .in_current_span(),
        )
    }

    /// The stage `user_id` is currently in.
    pub async fn stage_of(&self, user_id: i64) -> Stage {
        let slot = stage_slot(&self.stages, user_id).await;
        let stage = slot.lock().await;
        stage.clone()
    }
}

/// Fetch or create the stage lock for a user.
async fn stage_slot(
    stages: &Mutex<BTreeMap<i64, Arc<Mutex<Stage>>>>,
    user_id: i64,
) -> Arc<Mutex<Stage>> {
    let mut stages = stages.lock().await;
    Arc::clone(stages.entry(user_id).or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use butler_db::mock::{MockConnector, Scripted};
    use butler_types::Value;

    use super::*;
    use crate::config::AssistantConfig;
    use crate::dialog::Sender;
    use crate::lines;
    use crate::testing::loopback;

    fn update(user_id: i64, text: &str) -> Update {
        Update {
            chat_id: user_id,
            sender: Sender {
                id: user_id,
                first_name: format!("user{user_id}"),
                username: None,
            },
            text: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn updates_from_one_user_apply_in_order() {
        let probe = MockConnector::new();
        for _ in 0..2 {
            probe.push(Scripted::Rows(vec![vec![Value::Bool(true)]]));
        }
        let (dispatcher, mut replies) =
            Dispatcher::new(Assistant::new(AssistantConfig::default()), loopback(&probe).await);

        dispatcher.dispatch(update(1, "hi")).await.unwrap();
        dispatcher.dispatch(update(1, lines::LOG_EXPENSE)).await.unwrap();

        assert_eq!(dispatcher.stage_of(1).await, Stage::ExpenseCategory);
        assert_eq!(dispatcher.stage_of(2).await, Stage::Ended);

        let first = replies.recv().await.unwrap();
        assert_eq!(first.chat_id, 1);
        assert!(first.reply.text.starts_with("Hello Master user1"));
    }

    #[tokio::test]
    async fn users_keep_separate_stages() {
        let probe = MockConnector::new();
        let (dispatcher, _replies) =
            Dispatcher::new(Assistant::new(AssistantConfig::default()), loopback(&probe).await);

        let a = dispatcher.dispatch(update(1, "/cancel"));
        let b = dispatcher.dispatch(update(2, "/cancel"));
        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(dispatcher.stage_of(1).await, Stage::Ended);
        assert_eq!(dispatcher.stage_of(2).await, Stage::Ended);
        assert!(probe.executed().is_empty());
    }

    #[tokio::test]
    async fn closed_reply_queue_does_not_fail_the_turn() {
        let probe = MockConnector::new();
        let (dispatcher, replies) =
            Dispatcher::new(Assistant::new(AssistantConfig::default()), loopback(&probe).await);
        drop(replies);

        dispatcher.dispatch(update(3, "/cancel")).await.unwrap();
        assert_eq!(dispatcher.stage_of(3).await, Stage::Ended);
    }
}
