// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded FIFO of formatted lines shared by producers and the writer thread.
//!
//! One [`parking_lot::Mutex`] guards the messages, the capacity, the policy,
//! the dropped counter and the completion flag. One [`Condvar`] wakes both
//! sides: producers waiting for space under [`QueueFullPolicy::Wait`] and the
//! consumer waiting for a message.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::QueueFullPolicy;

/// Builds the line reporting messages dropped under
/// [`QueueFullPolicy::DropWrite`].
pub fn dropped_notice(count: u64) -> String {
    format!("Dropped {count} messages due to queue overflow.\n")
}

/// Result of offering a line to the queue.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub enum Enqueued {
    /// The line was queued, or dropped and counted under
    /// [`QueueFullPolicy::DropWrite`]. Either way the caller must not write it.
    Accepted,
    /// The queue is completed; the line is handed back to the caller.
    Rejected(String),
}

#[derive(Debug)]
struct QueueState {
    messages:         VecDeque<String>,
    max_queue_length: usize,
    policy:           QueueFullPolicy,
    dropped:          u64,
    completed:        bool,
    /// The consumer holds a line it has not finished writing.
    in_flight:        bool,
}

#[derive(Debug)]
pub struct MessageQueue {
    state:  Mutex<QueueState>,
    signal: Condvar,
}

impl MessageQueue {
    pub fn new(policy: QueueFullPolicy, max_queue_length: usize) -> Self {
        Self {
            state:  Mutex::new(QueueState {
                messages: VecDeque::with_capacity(max_queue_length.min(1024) + 1),
                max_queue_length,
                policy,
                dropped: 0,
                completed: false,
                in_flight: false,
            }),
            signal: Condvar::new(),
        }
    }

    /// Offers `line` to the queue, blocking under [`QueueFullPolicy::Wait`]
    /// while the queue is full.
    pub fn enqueue(&self, line: String) -> Enqueued {
        let mut state = self.state.lock();

        while state.messages.len() >= state.max_queue_length && !state.completed {
            if state.policy == QueueFullPolicy::DropWrite {
                state.dropped += 1;
                return Enqueued::Accepted;
            }
            self.signal.wait(&mut state);
        }

        if state.completed {
            return Enqueued::Rejected(line);
        }

        let was_empty = state.messages.is_empty();
        if state.dropped > 0 {
            let notice = dropped_notice(state.dropped);
            state.messages.push_back(notice);
            state.dropped = 0;
        }
        state.messages.push_back(line);
        if was_empty {
            self.signal.notify_all();
        }
        Enqueued::Accepted
    }

    /// Takes the oldest line, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is both empty and completed; lines queued
    /// before completion are still handed out. Calling `dequeue` again marks
    /// the previously returned line as written.
    pub fn dequeue(&self) -> Option<String> {
        let mut state = self.state.lock();
        state.in_flight = false;

        while state.messages.is_empty() && !state.completed {
            self.signal.wait(&mut state);
        }

        let line = state.messages.pop_front()?;
        state.in_flight = true;
        if state.messages.len() == state.max_queue_length.saturating_sub(1) {
            self.signal.notify_all();
        }
        Some(line)
    }

    /// Replaces policy and capacity and wakes every waiter so it re-checks
    /// its condition against the new values.
    pub fn update_settings(&self, policy: QueueFullPolicy, max_queue_length: usize) {
        let mut state = self.state.lock();
        state.policy = policy;
        state.max_queue_length = max_queue_length;
        self.signal.notify_all();
    }

    /// Stops accepting lines and releases every blocked producer and the
    /// consumer. Drops not yet reported are queued as a final notice.
    pub fn complete(&self) {
        let mut state = self.state.lock();
        if state.completed {
            return;
        }
        state.completed = true;
        if state.dropped > 0 {
            let notice = dropped_notice(state.dropped);
            state.messages.push_back(notice);
            state.dropped = 0;
        }
        self.signal.notify_all();
    }

    /// `true` when nothing is queued and the consumer is not in the middle of
    /// writing a line.
    pub fn is_drained(&self) -> bool {
        let state = self.state.lock();
        state.messages.is_empty() && !state.in_flight
    }

    pub fn is_completed(&self) -> bool { self.state.lock().completed }

    pub fn len(&self) -> usize { self.state.lock().messages.len() }

    pub fn is_empty(&self) -> bool { self.state.lock().messages.is_empty() }

    pub fn dropped_count(&self) -> u64 { self.state.lock().dropped }

    pub fn settings(&self) -> (QueueFullPolicy, usize) {
        let state = self.state.lock();
        (state.policy, state.max_queue_length)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    fn accept(queue: &MessageQueue, line: &str) {
        assert_eq!(queue.enqueue(line.to_string()), Enqueued::Accepted);
    }

    #[test]
    fn test_fifo_order() {
        let queue = MessageQueue::new(QueueFullPolicy::Wait, 16);
        for i in 0..10 {
            accept(&queue, &format!("line-{i}"));
        }
        for i in 0..10 {
            assert_eq!(queue.dequeue().unwrap(), format!("line-{i}"));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_wait_blocks_until_dequeued() {
        let queue = Arc::new(MessageQueue::new(QueueFullPolicy::Wait, 2));
        accept(&queue, "A");
        accept(&queue, "B");

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.enqueue("C".to_string()))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.dequeue().as_deref(), Some("A"));
        assert_eq!(producer.join().unwrap(), Enqueued::Accepted);

        assert_eq!(queue.dequeue().as_deref(), Some("B"));
        assert_eq!(queue.dequeue().as_deref(), Some("C"));
    }

    #[test]
    fn test_drop_write_never_blocks_and_reports_once() {
        let queue = MessageQueue::new(QueueFullPolicy::DropWrite, 2);
        accept(&queue, "A");
        accept(&queue, "B");
        for i in 0..5 {
            accept(&queue, &format!("dropped-{i}"));
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped_count(), 5);

        assert_eq!(queue.dequeue().as_deref(), Some("A"));
        accept(&queue, "C");
        assert_eq!(queue.dropped_count(), 0);
        // The notice takes the slack slot.
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.dequeue().as_deref(), Some("B"));
        assert_eq!(queue.dequeue(), Some(dropped_notice(5)));
        assert_eq!(queue.dequeue().as_deref(), Some("C"));
    }

    #[test]
    fn test_complete_rejects_and_drains() {
        let queue = MessageQueue::new(QueueFullPolicy::Wait, 4);
        accept(&queue, "A");
        queue.complete();

        assert_eq!(
            queue.enqueue("B".to_string()),
            Enqueued::Rejected("B".to_string())
        );
        assert_eq!(queue.dequeue().as_deref(), Some("A"));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_complete_reports_pending_drops() {
        let queue = MessageQueue::new(QueueFullPolicy::DropWrite, 1);
        accept(&queue, "A");
        accept(&queue, "lost-1");
        accept(&queue, "lost-2");
        queue.complete();
        queue.complete();

        assert_eq!(queue.dropped_count(), 0);
        assert_eq!(queue.dequeue().as_deref(), Some("A"));
        assert_eq!(queue.dequeue(), Some(dropped_notice(2)));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_drained_only_after_consumer_returns() {
        let queue = MessageQueue::new(QueueFullPolicy::Wait, 4);
        assert!(queue.is_drained());
        accept(&queue, "A");
        assert!(!queue.is_drained());

        assert_eq!(queue.dequeue().as_deref(), Some("A"));
        assert!(queue.is_empty());
        assert!(!queue.is_drained());

        queue.complete();
        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_drained());
    }

    #[test]
    fn test_complete_wakes_blocked_producer() {
        let queue = Arc::new(MessageQueue::new(QueueFullPolicy::Wait, 1));
        accept(&queue, "A");

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.enqueue("B".to_string()))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!producer.is_finished());

        queue.complete();
        assert_eq!(
            producer.join().unwrap(),
            Enqueued::Rejected("B".to_string())
        );
    }

    #[test]
    fn test_complete_wakes_blocked_consumer() {
        let queue = Arc::new(MessageQueue::new(QueueFullPolicy::Wait, 1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!consumer.is_finished());

        queue.complete();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_update_settings_releases_waiting_producer() {
        let queue = Arc::new(MessageQueue::new(QueueFullPolicy::Wait, 1));
        accept(&queue, "A");

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.enqueue("B".to_string()))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!producer.is_finished());

        queue.update_settings(QueueFullPolicy::Wait, 2);
        assert_eq!(producer.join().unwrap(), Enqueued::Accepted);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.settings(), (QueueFullPolicy::Wait, 2));
    }

    #[test]
    fn test_switch_to_drop_write_releases_waiting_producer() {
        let queue = Arc::new(MessageQueue::new(QueueFullPolicy::Wait, 1));
        accept(&queue, "A");

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.enqueue("B".to_string()))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!producer.is_finished());

        queue.update_settings(QueueFullPolicy::DropWrite, 1);
        assert_eq!(producer.join().unwrap(), Enqueued::Accepted);
        assert_eq!(queue.dropped_count(), 1);
    }

    #[test]
    fn test_consumer_wakes_on_first_message() {
        let queue = Arc::new(MessageQueue::new(QueueFullPolicy::Wait, 4));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };
        thread::sleep(Duration::from_millis(20));
        accept(&queue, "A");
        assert_eq!(consumer.join().unwrap().as_deref(), Some("A"));
    }
}
