//! # Bounded multi-producer, multi-consumer channel.
//!
//! [`bounded`] returns a cloneable [`Sender`] / [`Receiver`] pair sharing one
//! fixed-capacity FIFO queue.
//!
//! ## Rules
//! - **Backpressure**: `send` suspends while `capacity` values are buffered.
//! - **Rendezvous**: with `capacity == 0`, `send` returns only after a receiver took the value.
//! - **FIFO**: values leave in the order they entered the queue.
//! - **Close once**: [`Sender::close`] is a one-shot transition; a second explicit
//!   close panics. Dropping the last `Sender` closes the channel implicitly.
//! - **Drain after close**: buffered values stay receivable; afterwards `recv()`
//!   returns `None` immediately instead of suspending.
//! - **No receivers**: once every `Receiver` is dropped, `send` fails and hands the value back.
//!
//! ## Wakeups
//! ```text
//! send ─► push ─► recv_ready.notify_waiters() ─► blocked receivers re-check
//! recv ─► pop  ─► send_ready.notify_waiters() ─► blocked senders re-check (slot / ack)
//! close ───────► both notifies
//! ```
//! Every waiter registers its `Notified` future **before** inspecting the state,
//! so a change between the check and the await is never missed.
//!
//! ## Example
//! ```rust
//! use flowvisor::channel::bounded;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (tx, rx) = bounded::<u32>(2);
//! tx.send(1).await.unwrap();
//! tx.send(2).await.unwrap();
//! tx.close();
//!
//! assert_eq!(rx.recv().await, Some(1));
//! assert_eq!(rx.recv().await, Some(2));
//! assert_eq!(rx.recv().await, None);
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::Stream;
use tokio::sync::Notify;

use crate::error::{SendError, TryRecvError, TrySendError};

/// Creates a bounded channel holding at most `capacity` values in transit.
///
/// `capacity == 0` builds a synchronous hand-off: the sender is suspended until a
/// receiver takes the value.
pub fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        capacity,
        state: Mutex::new(State {
            queue: VecDeque::with_capacity(capacity.clamp(1, 1024)),
            closed: false,
            senders: 1,
            receivers: 1,
            waiting_receivers: 0,
            pushed: 0,
            taken: 0,
        }),
        recv_ready: Notify::new(),
        send_ready: Notify::new(),
    });
    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver { shared },
    )
}

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
    senders: usize,
    receivers: usize,
    /// Receivers currently suspended in `recv` (used by rendezvous `try_send`).
    waiting_receivers: usize,
    /// Total values ever enqueued; the ticket of the next value.
    pushed: u64,
    /// Total values ever dequeued.
    taken: u64,
}

struct Shared<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    /// Fired when a value was pushed or the channel closed.
    recv_ready: Notify,
    /// Fired when a value was taken, the channel closed, or the last receiver left.
    send_ready: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of queue slots; a rendezvous channel parks one value while the sender waits.
    fn slots(&self) -> usize {
        self.capacity.max(1)
    }

    fn try_push(&self, value: T, rendezvous_needs_receiver: bool) -> Result<u64, TrySendError<T>> {
        let mut st = self.lock();
        if st.closed || st.receivers == 0 {
            return Err(TrySendError::Closed(value));
        }
        if st.queue.len() >= self.slots() {
            return Err(TrySendError::Full(value));
        }
        if rendezvous_needs_receiver && self.capacity == 0 && st.waiting_receivers == 0 {
            return Err(TrySendError::Full(value));
        }
        st.queue.push_back(value);
        let ticket = st.pushed;
        st.pushed += 1;
        drop(st);
        self.recv_ready.notify_waiters();
        Ok(ticket)
    }

    fn try_pop(&self) -> Result<T, TryRecvError> {
        let mut st = self.lock();
        match st.queue.pop_front() {
            Some(value) => {
                st.taken += 1;
                drop(st);
                self.send_ready.notify_waiters();
                Ok(value)
            }
            None if st.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    fn close(&self) {
        let mut st = self.lock();
        if st.closed {
            drop(st);
            panic!("flowvisor: close of closed channel");
        }
        st.closed = true;
        drop(st);
        self.recv_ready.notify_waiters();
        self.send_ready.notify_waiters();
    }
}

/// Sending half of a [`bounded`] channel.
///
/// Cloning adds a producer. The channel closes when [`close`](Sender::close) is
/// called once, or when the last `Sender` is dropped.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// Sends a value, suspending while the channel is full.
    ///
    /// For a rendezvous channel (`capacity == 0`) this returns only after a receiver
    /// took the value.
    ///
    /// Fails with the value handed back when the channel is closed or every receiver
    /// has been dropped.
    pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
        let mut value = value;
        let ticket = loop {
            let notified = self.shared.send_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.shared.try_push(value, false) {
                Ok(ticket) => break ticket,
                Err(TrySendError::Closed(v)) => return Err(SendError(v)),
                Err(TrySendError::Full(v)) => value = v,
            }
            notified.await;
        };

        if self.shared.capacity == 0 {
            self.await_handoff(ticket).await
        } else {
            Ok(())
        }
    }

    /// Waits until the value with `ticket` has been taken by a receiver.
    async fn await_handoff(&self, ticket: u64) -> Result<(), SendError<T>> {
        loop {
            let notified = self.shared.send_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut st = self.shared.lock();
                if st.taken > ticket {
                    return Ok(());
                }
                if st.receivers == 0 {
                    // At most one value is parked in a rendezvous queue and it is ours.
                    if let Some(v) = st.queue.pop_front() {
                        st.pushed -= 1;
                        return Err(SendError(v));
                    }
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    /// Attempts to send without suspending.
    ///
    /// A rendezvous channel accepts the value only when a receiver is already waiting.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        self.shared.try_push(value, true).map(|_| ())
    }

    /// Closes the channel.
    ///
    /// Buffered values remain receivable; suspended receivers on an empty channel
    /// return `None` right away.
    ///
    /// # Panics
    /// Panics if the channel was already closed. Exactly one owner may close a channel.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Returns `true` once the channel is closed.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity (`0` = rendezvous).
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.lock().senders += 1;
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut st = self.shared.lock();
        st.senders -= 1;
        if st.senders == 0 && !st.closed {
            st.closed = true;
            drop(st);
            self.shared.recv_ready.notify_waiters();
            self.shared.send_ready.notify_waiters();
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.shared.lock();
        f.debug_struct("Sender")
            .field("capacity", &self.shared.capacity)
            .field("len", &st.queue.len())
            .field("closed", &st.closed)
            .finish()
    }
}

/// Receiving half of a [`bounded`] channel.
///
/// Cloning adds a consumer; concurrent consumers race for values.
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

/// Marks a receiver as suspended for the lifetime of one wait.
struct WaitingGuard<'a, T> {
    shared: &'a Shared<T>,
}

impl<'a, T> WaitingGuard<'a, T> {
    fn new(shared: &'a Shared<T>) -> Self {
        shared.lock().waiting_receivers += 1;
        Self { shared }
    }
}

impl<T> Drop for WaitingGuard<'_, T> {
    fn drop(&mut self) {
        self.shared.lock().waiting_receivers -= 1;
    }
}

impl<T> Receiver<T> {
    /// Receives the next value.
    ///
    /// Suspends while the channel is empty and open. Returns `None` once the channel
    /// is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        loop {
            let notified = self.shared.recv_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.shared.try_pop() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Closed) => return None,
                Err(TryRecvError::Empty) => {}
            }

            let _waiting = WaitingGuard::new(&self.shared);
            notified.await;
        }
    }

    /// Attempts to receive without suspending.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.shared.try_pop()
    }

    /// Returns `true` once the channel is closed (values may still be buffered).
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity (`0` = rendezvous).
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Converts the receiver into a [`Stream`] that ends when the channel is drained.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures::stream::unfold(self, |rx| async move {
            let value = rx.recv().await?;
            Some((value, rx))
        })
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.shared.lock().receivers += 1;
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut st = self.shared.lock();
        st.receivers -= 1;
        if st.receivers == 0 {
            drop(st);
            self.shared.send_ready.notify_waiters();
        }
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.shared.lock();
        f.debug_struct("Receiver")
            .field("capacity", &self.shared.capacity)
            .field("len", &st.queue.len())
            .field("closed", &st.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_single_producer() {
        let (tx, rx) = bounded(4);
        let producer = tokio::spawn(async move {
            for i in 0..100u32 {
                tx.send(i).await.unwrap();
            }
        });

        let mut got = Vec::new();
        while let Some(v) = rx.recv().await {
            got.push(v);
        }
        producer.await.unwrap();
        assert_eq!(got, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn close_keeps_buffered_values() {
        let (tx, rx) = bounded(3);
        tx.send("a").await.unwrap();
        tx.send("b").await.unwrap();
        tx.close();

        assert!(rx.is_closed());
        assert_eq!(rx.len(), 2);
        assert_eq!(rx.recv().await, Some("a"));
        assert_eq!(rx.recv().await, Some("b"));
        assert_eq!(rx.recv().await, None);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
    }

    #[tokio::test]
    async fn send_after_close_hands_value_back() {
        let (tx, _rx) = bounded(1);
        tx.close();
        let err = tx.send(5).await.unwrap_err();
        assert_eq!(err.into_inner(), 5);
    }

    #[tokio::test]
    #[should_panic(expected = "close of closed channel")]
    async fn double_close_panics() {
        let (tx, _rx) = bounded::<()>(1);
        tx.close();
        tx.close();
    }

    #[tokio::test]
    async fn dropping_last_sender_closes() {
        let (tx, rx) = bounded::<u8>(1);
        let tx2 = tx.clone();
        drop(tx);
        assert!(!rx.is_closed());
        drop(tx2);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn full_channel_applies_backpressure() {
        let (tx, rx) = bounded(1);
        tx.send(1).await.unwrap();
        assert!(matches!(tx.try_send(2), Err(TrySendError::Full(2))));

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(2)).await;
        assert!(blocked.is_err(), "send must suspend while full");

        assert_eq!(rx.recv().await, Some(1));
        tx.send(3).await.unwrap();
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn rendezvous_waits_for_receiver() {
        let (tx, rx) = bounded(0);
        let pending = tokio::time::timeout(Duration::from_millis(50), tx.send(1)).await;
        assert!(pending.is_err(), "rendezvous send must wait for a receiver");

        // The timed-out send left its value parked; a receiver still observes it.
        assert_eq!(rx.recv().await, Some(1));

        let sender = tokio::spawn(async move {
            tx.send(2).await.unwrap();
            tx.send(3).await.unwrap();
        });
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
        sender.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn rendezvous_try_send_needs_waiting_receiver() {
        let (tx, rx) = bounded(0);
        assert!(matches!(tx.try_send(1), Err(TrySendError::Full(1))));

        let receiver = tokio::spawn(async move { rx.recv().await });
        while tx.try_send(9).is_err() {
            tokio::task::yield_now().await;
        }
        assert_eq!(receiver.await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn send_fails_when_receivers_are_gone() {
        let (tx, rx) = bounded(0);
        let sender = tokio::spawn(async move { tx.send(1).await });
        tokio::task::yield_now().await;
        drop(rx);
        let err = sender.await.unwrap().unwrap_err();
        assert_eq!(err.into_inner(), 1);
    }

    #[tokio::test]
    async fn blocked_receivers_wake_on_close() {
        let (tx, rx) = bounded::<u8>(2);
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let rx = rx.clone();
                tokio::spawn(async move { rx.recv().await })
            })
            .collect();
        tokio::task::yield_now().await;
        tx.close();
        for w in waiters {
            assert_eq!(w.await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn stream_adapter_ends_after_drain() {
        let (tx, rx) = bounded(8);
        for i in 0..5 {
            tx.send(i).await.unwrap();
        }
        drop(tx);
        let all: Vec<i32> = rx.into_stream().collect().await;
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
    }
}
