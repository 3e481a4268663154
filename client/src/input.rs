//! Client input sequencing with change detection and send throttling

use shared::InputKeys;

/// An input that was sent to the server and has not been acknowledged yet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingInput {
    pub seq: u32,
    pub keys: InputKeys,
    /// Client clock in milliseconds when the input was sent
    pub timestamp: u64,
}

/// Decides when the held keys are worth a datagram and numbers the ones that are
///
/// An input goes out when the keys changed or the keep-alive timer elapsed, but never
/// sooner than the minimum interval after the previous send.
#[derive(Debug)]
pub struct InputSender {
    next_sequence: u32,
    last_keys: InputKeys,
    last_send_ms: Option<u64>,
    min_interval_ms: u64,
    send_rate_ms: u64,
}

impl InputSender {
    pub fn new(min_interval_ms: u64, send_rate_ms: u64) -> Self {
        Self {
            next_sequence: 0,
            last_keys: InputKeys::default(),
            last_send_ms: None,
            min_interval_ms,
            send_rate_ms,
        }
    }

    /// Returns the input to send for `keys` at `now_ms`, if one is due
    pub fn poll(&mut self, keys: InputKeys, now_ms: u64) -> Option<PendingInput> {
        let should_send = match self.last_send_ms {
            None => true,
            Some(last) => {
                let since = now_ms.saturating_sub(last);
                let changed = keys != self.last_keys;
                (changed || since >= self.send_rate_ms) && since >= self.min_interval_ms
            }
        };

        if !should_send {
            return None;
        }

        let input = PendingInput {
            seq: self.next_sequence,
            keys,
            timestamp: now_ms,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.last_keys = keys;
        self.last_send_ms = Some(now_ms);
        Some(input)
    }

    /// Sequence number the next sent input will carry
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Starts over for a fresh connection
    pub fn reset(&mut self) {
        self.next_sequence = 0;
        self.last_keys = InputKeys::default();
        self.last_send_ms = None;
    }
}
