//! Single-slot, latest-wins channels.
//!
//! Built on a `crossbeam_channel::bounded(1)`. The sending half keeps a clone
//! of the receiver so that, when the slot is full, it can pull the stale value
//! out and put the new one in instead of blocking. Readers only ever see the
//! freshest value; nothing queues up behind a slow consumer.

use crossbeam_channel::{Receiver, TrySendError};

/// Sending half of an overwrite channel.
pub struct OverwriteSender<T> {
    tx: crossbeam_channel::Sender<T>,
    evict: Receiver<T>,
}

impl<T> Clone for OverwriteSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            evict: self.evict.clone(),
        }
    }
}

/// Create a single-slot overwrite channel.
pub fn overwrite_channel<T>() -> (OverwriteSender<T>, Receiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let sender = OverwriteSender {
        tx,
        evict: rx.clone(),
    };
    (sender, rx)
}

impl<T> OverwriteSender<T> {
    /// Put `value` in the slot, never blocking.
    ///
    /// Returns whatever unread value it displaced. If several senders race,
    /// only the most recently displaced value is returned; older ones are
    /// dropped.
    pub fn send_replace(&self, value: T) -> Option<T> {
        let mut value = value;
        let mut displaced = None;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return displaced,
                Err(TrySendError::Full(v)) => {
                    value = v;
                    if let Ok(stale) = self.evict.try_recv() {
                        displaced = Some(stale);
                    }
                }
                // `evict` keeps a receiver alive for as long as we exist.
                Err(TrySendError::Disconnected(_)) => unreachable!("overwrite channel lost its receiver"),
            }
        }
    }

    /// True if a value is waiting in the slot.
    pub fn is_occupied(&self) -> bool {
        !self.tx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_value_wins() {
        let (tx, rx) = overwrite_channel();
        assert_eq!(tx.send_replace(1), None);
        assert_eq!(tx.send_replace(2), Some(1));
        assert_eq!(tx.send_replace(3), Some(2));
        assert_eq!(rx.try_recv().ok(), Some(3));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_receiver_disconnects_when_senders_drop() {
        let (tx, rx) = overwrite_channel::<u32>();
        let tx2 = tx.clone();
        drop(tx);
        assert!(rx.try_recv().is_err());
        drop(tx2);
        assert!(matches!(
            rx.recv(),
            Err(crossbeam_channel::RecvError)
        ));
    }

    #[test]
    fn test_is_occupied() {
        let (tx, rx) = overwrite_channel();
        assert!(!tx.is_occupied());
        tx.send_replace("a");
        assert!(tx.is_occupied());
        rx.recv().unwrap();
        assert!(!tx.is_occupied());
    }
}
