//! Push-based reads of a user's confirmed progress.
//!
//! Repositories publish every progress write here; readers hold a
//! [`ProgressSubscription`] and await changes instead of polling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use doric_core::model::{ProgressRecord, UserId};
use tokio::sync::watch;

use crate::repository::StorageError;

/// One user's channel. `seeded` flips once a publish or the first subscriber
/// has set a value from storage.
struct Slot {
    tx: watch::Sender<Option<ProgressRecord>>,
    seeded: bool,
}

/// Fan-out hub keyed by user. Cloning shares the same channels.
#[derive(Clone, Default)]
pub struct ProgressFeed {
    channels: Arc<Mutex<HashMap<UserId, Slot>>>,
}

impl ProgressFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes the latest value for `user_id` to all live subscribers.
    ///
    /// Channels without receivers are dropped; the next subscriber reseeds
    /// from storage.
    pub fn publish(&self, user_id: &UserId, record: Option<ProgressRecord>) {
        let Ok(mut guard) = self.channels.lock() else {
            return;
        };
        let drop_slot = match guard.get_mut(user_id) {
            Some(slot) if slot.tx.receiver_count() == 0 => true,
            Some(slot) => {
                slot.tx.send_replace(record);
                slot.seeded = true;
                false
            }
            None => false,
        };
        if drop_slot {
            guard.remove(user_id);
        }
    }

    /// Opens a subscription before storage is read, so no write between the
    /// read and the subscription can be missed. Follow up with
    /// [`seed`](Self::seed) once the stored value is known.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the channel table is poisoned.
    pub fn subscribe(&self, user_id: &UserId) -> Result<ProgressSubscription, StorageError> {
        let mut guard = self
            .channels
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let rx = match guard.get(user_id) {
            Some(slot) if slot.tx.receiver_count() > 0 => slot.tx.subscribe(),
            _ => {
                let (tx, rx) = watch::channel(None);
                guard.insert(user_id.clone(), Slot { tx, seeded: false });
                rx
            }
        };
        Ok(ProgressSubscription {
            user_id: user_id.clone(),
            rx,
        })
    }

    /// Sets the value read from storage unless a write was published after
    /// `subscription` was opened. The value counts as already seen.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the channel table is poisoned.
    pub fn seed(
        &self,
        subscription: &mut ProgressSubscription,
        stored: Option<ProgressRecord>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .channels
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if let Some(slot) = guard.get_mut(&subscription.user_id) {
            if !slot.seeded {
                slot.tx.send_if_modified(|current| {
                    if *current == stored {
                        false
                    } else {
                        *current = stored;
                        true
                    }
                });
                slot.seeded = true;
            }
        }
        subscription.rx.borrow_and_update();
        Ok(())
    }
}

/// A live view of one user's progress row. Dropping it (or calling
/// [`cancel`](Self::cancel)) ends the subscription.
pub struct ProgressSubscription {
    user_id: UserId,
    rx: watch::Receiver<Option<ProgressRecord>>,
}

impl ProgressSubscription {
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The most recently published value; `None` when the row does not exist.
    #[must_use]
    pub fn current(&self) -> Option<ProgressRecord> {
        self.rx.borrow().clone()
    }

    /// Waits for the next write and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Closed` once the owning repository is gone.
    pub async fn changed(&mut self) -> Result<Option<ProgressRecord>, StorageError> {
        self.rx.changed().await.map_err(|_| StorageError::Closed)?;
        Ok(self.rx.borrow_and_update().clone())
    }

    pub fn cancel(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use doric_core::model::StepProgress;

    fn uid(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn subscriber_sees_published_values() {
        let feed = ProgressFeed::new();
        let user = uid("u1");
        let mut sub = feed.subscribe(&user).unwrap();
        feed.seed(&mut sub, None).unwrap();
        assert!(sub.current().is_none());

        let record = ProgressRecord::new(user.clone(), StepProgress::at_step(2));
        feed.publish(&user, Some(record.clone()));
        assert_eq!(sub.changed().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn second_subscriber_keeps_latest_value() {
        let feed = ProgressFeed::new();
        let user = uid("u1");
        let mut first = feed.subscribe(&user).unwrap();
        feed.seed(&mut first, None).unwrap();
        let record = ProgressRecord::new(user.clone(), StepProgress::at_step(4));
        feed.publish(&user, Some(record.clone()));

        let mut second = feed.subscribe(&user).unwrap();
        feed.seed(&mut second, Some(ProgressRecord::zeroed(user.clone())))
            .unwrap();
        assert_eq!(second.current(), Some(record));
    }

    #[tokio::test]
    async fn publish_only_reaches_matching_user() {
        let feed = ProgressFeed::new();
        let a = uid("a");
        let b = uid("b");
        let sub_a = feed.subscribe(&a).unwrap();
        feed.publish(&b, Some(ProgressRecord::zeroed(b.clone())));
        assert!(sub_a.current().is_none());
    }

    #[tokio::test]
    async fn cancelled_channel_is_pruned_on_publish() {
        let feed = ProgressFeed::new();
        let user = uid("u1");
        feed.subscribe(&user).unwrap().cancel();
        feed.publish(&user, Some(ProgressRecord::zeroed(user.clone())));
        assert!(feed.channels.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_between_subscribe_and_seed_wins() {
        let feed = ProgressFeed::new();
        let user = uid("u1");
        let mut sub = feed.subscribe(&user).unwrap();

        let newer = ProgressRecord::new(user.clone(), StepProgress::at_step(6));
        feed.publish(&user, Some(newer.clone()));
        let stale = Some(ProgressRecord::new(user.clone(), StepProgress::at_step(5)));
        feed.seed(&mut sub, stale).unwrap();

        assert_eq!(sub.current(), Some(newer));
    }

    #[tokio::test]
    async fn seeded_value_is_not_reported_as_a_change() {
        let feed = ProgressFeed::new();
        let user = uid("u1");
        let mut sub = feed.subscribe(&user).unwrap();
        feed.seed(&mut sub, Some(ProgressRecord::zeroed(user.clone())))
            .unwrap();
        assert_eq!(sub.current().unwrap().last_step_index(), 0);

        let next = ProgressRecord::new(user.clone(), StepProgress::at_step(1));
        feed.publish(&user, Some(next.clone()));
        assert_eq!(sub.changed().await.unwrap(), Some(next));
    }
}
