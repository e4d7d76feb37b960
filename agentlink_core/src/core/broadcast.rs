use log::{debug, warn};
use tokio::sync::mpsc::error::TrySendError;

use super::protocol::{Reply, ReplyTo};

/// Identifies one bound subscriber for `unbind`.
pub type SubscriberId = u64;

/// Best-effort fan-out of status snapshots to every bound caller.
///
/// A subscriber whose receiver has gone away is pruned on the next
/// broadcast. One that is merely full misses that snapshot.
#[derive(Default)]
pub struct SubscriberSet {
    subscribers: Vec<(SubscriberId, ReplyTo)>,
    next_id: SubscriberId,
}

impl SubscriberSet {
    pub fn bind(&mut self, reply_to: ReplyTo) -> SubscriberId {
        self.next_id += 1;
        let id = self.next_id;
        self.subscribers.push((id, reply_to));
        debug!("Subscriber {} bound ({} total)", id, self.subscribers.len());
        id
    }

    pub fn unbind(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        before != self.subscribers.len()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Sends `message` to everyone bound right now. Returns how many took it.
    pub fn broadcast(&mut self, message: &Reply) -> usize {
        let mut delivered = 0;
        self.subscribers
            .retain(|(id, tx)| match tx.try_send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!("Subscriber {} is not keeping up; snapshot dropped", id);
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscriber {} went away; unbinding", id);
                    false
                }
            });
        delivered
    }
}
