//! Request handle generation.
//!
//! Handles always have the high bit set, which is what tells replies apart
//! from server callbacks. The sequence runs `0x80000000..=0xFFFFFFFE` and
//! wraps back to `0x80000000`.

use super::wire_format::HANDLE_REPLY_BIT;

/// Last handle in the sequence before wrapping.
pub const MAX_HANDLE: u32 = 0xFFFF_FFFE;

/// Monotonic handle counter owned by one dispatcher.
#[derive(Debug, Clone, Default)]
pub struct HandleGenerator {
    last: u32,
}

impl HandleGenerator {
    /// Create a generator whose first handle is `0x80000000`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator that continues after `last`.
    ///
    /// Values outside the valid range reset the sequence on the next call.
    pub fn starting_after(last: u32) -> Self {
        Self { last }
    }

    /// Last handle issued (0 before the first call).
    pub fn last(&self) -> u32 {
        self.last
    }

    /// Return the next handle.
    ///
    /// # Example
    ///
    /// ```
    /// use gbxremote_client::protocol::HandleGenerator;
    ///
    /// let mut handles = HandleGenerator::new();
    /// assert_eq!(handles.next_handle(), 0x8000_0000);
    /// assert_eq!(handles.next_handle(), 0x8000_0001);
    /// ```
    pub fn next_handle(&mut self) -> u32 {
        if self.last < HANDLE_REPLY_BIT || self.last >= MAX_HANDLE {
            self.last = HANDLE_REPLY_BIT;
            tracing::debug!("Reset handle to {:#x}", self.last);
        } else {
            self.last += 1;
        }
        self.last
    }
}
