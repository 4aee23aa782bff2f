//! Payment Provider Adapters
//!
//! Two independent external money-movement systems sit behind traits:
//! the card processor (charge refunds, connected-account transfers) and
//! the peer payout network (email-keyed payouts).
//!
//! Calls are plain network I/O with request timeouts; the caller never
//! holds a record-store lock across them. Results use the
//! success / explicit-failure / unknown trichotomy of [`RailResult`] -
//! an unknown outcome must be retried, never treated as a failure.

pub mod paypal;
pub mod stripe;

pub use paypal::PaypalPayouts;
pub use stripe::StripeProcessor;

use async_trait::async_trait;

use super::types::{PurchaseId, RailResult};

/// Card-processor operations consumed by the escrow core
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// Refund the original charge in full.
    ///
    /// `payment_reference` is the processor's charge id captured at
    /// checkout; the processor rejects a second refund of the same charge,
    /// which is what makes deadline-refund retries safe.
    async fn create_refund(&self, payment_reference: &str, reason: &str) -> RailResult;

    /// Move `amount` minor units to a connected payout account.
    /// `grouping_key` ties the transfer to the purchase on the provider side.
    async fn create_transfer(
        &self,
        amount: i64,
        destination_account: &str,
        grouping_key: PurchaseId,
        memo: &str,
    ) -> RailResult;
}

/// Peer payout network operations consumed by the payout router
#[async_trait]
pub trait PayoutNetwork: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// Send `amount` minor units to `email`, keyed by purchase for
    /// provider-side reconciliation.
    async fn send_payout(
        &self,
        email: &str,
        amount: i64,
        purchase_id: PurchaseId,
        memo: &str,
    ) -> RailResult;
}

/// Mock adapters for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock card processor with per-operation counters and failure toggles
    pub struct MockProcessor {
        refund_count: AtomicUsize,
        transfer_count: AtomicUsize,
        fail_refund: Mutex<bool>,
        fail_transfer: Mutex<bool>,
    }

    impl MockProcessor {
        pub fn new() -> Self {
            Self {
                refund_count: AtomicUsize::new(0),
                transfer_count: AtomicUsize::new(0),
                fail_refund: Mutex::new(false),
                fail_transfer: Mutex::new(false),
            }
        }

        pub fn set_fail_refund(&self, fail: bool) {
            *self.fail_refund.lock().unwrap() = fail;
        }

        pub fn set_fail_transfer(&self, fail: bool) {
            *self.fail_transfer.lock().unwrap() = fail;
        }

        pub fn refund_count(&self) -> usize {
            self.refund_count.load(Ordering::SeqCst)
        }

        pub fn transfer_count(&self) -> usize {
            self.transfer_count.load(Ordering::SeqCst)
        }
    }

    impl Default for MockProcessor {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl PaymentProcessor for MockProcessor {
        fn name(&self) -> &'static str {
            "mock-processor"
        }

        async fn create_refund(&self, payment_reference: &str, _reason: &str) -> RailResult {
            self.refund_count.fetch_add(1, Ordering::SeqCst);
            if *self.fail_refund.lock().unwrap() {
                RailResult::Failed("mock refund failure".to_string())
            } else {
                RailResult::Success(format!("re_{payment_reference}"))
            }
        }

        async fn create_transfer(
            &self,
            _amount: i64,
            _destination_account: &str,
            grouping_key: PurchaseId,
            _memo: &str,
        ) -> RailResult {
            self.transfer_count.fetch_add(1, Ordering::SeqCst);
            if *self.fail_transfer.lock().unwrap() {
                RailResult::Failed("mock transfer failure".to_string())
            } else {
                RailResult::Success(format!("tr_{grouping_key}"))
            }
        }
    }

    /// Mock payout network with a call counter and failure toggle
    pub struct MockPayoutNetwork {
        payout_count: AtomicUsize,
        fail_payout: Mutex<bool>,
    }

    impl MockPayoutNetwork {
        pub fn new() -> Self {
            Self {
                payout_count: AtomicUsize::new(0),
                fail_payout: Mutex::new(false),
            }
        }

        pub fn set_fail_payout(&self, fail: bool) {
            *self.fail_payout.lock().unwrap() = fail;
        }

        pub fn payout_count(&self) -> usize {
            self.payout_count.load(Ordering::SeqCst)
        }
    }

    impl Default for MockPayoutNetwork {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl PayoutNetwork for MockPayoutNetwork {
        fn name(&self) -> &'static str {
            "mock-payout-network"
        }

        async fn send_payout(
            &self,
            _email: &str,
            _amount: i64,
            purchase_id: PurchaseId,
            _memo: &str,
        ) -> RailResult {
            self.payout_count.fetch_add(1, Ordering::SeqCst);
            if *self.fail_payout.lock().unwrap() {
                RailResult::Failed("mock payout failure".to_string())
            } else {
                RailResult::Success(format!("batch_{purchase_id}"))
            }
        }
    }
}
