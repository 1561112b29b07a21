//! The ticket-validation state machine.
//!
//! [`TicketValidator`] owns the set of valid codes and the set of used codes.
//! It does no I/O: callers load codes into it, ask it to classify input, and
//! persist whatever it reports as used.
//!
//! # Rules
//!
//! `check_ticket` short-circuits in this order:
//!
//! 1. blank input is [`CheckOutcome::EmptyInput`]
//! 2. unknown codes are [`CheckOutcome::Invalid`]
//! 3. redeemed codes are [`CheckOutcome::AlreadyUsed`]
//! 4. anything else is redeemed and reported [`CheckOutcome::Valid`]
//!
//! Only step 4 mutates. A code is therefore never redeemed twice.

use crate::types::{CheckOutcome, TicketCode};
use std::collections::HashSet;

/// Valid and used ticket codes for one device
#[derive(Clone, Debug, Default)]
pub struct TicketValidator {
    valid: HashSet<TicketCode>,
    used: HashSet<TicketCode>,
    // Insertion order of `used`, which is also the persisted order.
    used_order: Vec<TicketCode>,
}

impl TicketValidator {
    /// Create an empty validator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with the given valid codes
    #[must_use]
    pub fn with_valid_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut validator = Self::new();
        validator.load_valid_codes(codes);
        validator
    }

    /// Classify `raw` and redeem it if it is valid and unused
    pub fn check_ticket(&mut self, raw: &str) -> CheckOutcome {
        let Some(code) = TicketCode::parse(raw) else {
            return CheckOutcome::EmptyInput;
        };

        if !self.valid.contains(&code) {
            return CheckOutcome::Invalid(code);
        }

        if self.used.contains(&code) {
            return CheckOutcome::AlreadyUsed(code);
        }

        self.mark_used(code.clone());
        CheckOutcome::Valid(code)
    }

    /// Replace the valid set
    ///
    /// Entries are trimmed and deduplicated; blank entries are skipped. The
    /// previous contents are dropped, not merged. The used set is untouched.
    pub fn load_valid_codes<I, S>(&mut self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.valid = codes
            .into_iter()
            .filter_map(|raw| TicketCode::parse(raw.as_ref()))
            .collect();
    }

    /// Merge previously persisted codes into the used set
    ///
    /// Codes are canonicalized and are not checked against the valid set.
    /// Codes redeemed before the restore keep their position.
    pub fn restore_used<I, S>(&mut self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for code in codes.into_iter().filter_map(|raw| TicketCode::parse(raw.as_ref())) {
            if !self.used.contains(&code) {
                self.mark_used(code);
            }
        }
    }

    /// Forget every redemption. Idempotent.
    pub fn reset_used(&mut self) {
        self.used.clear();
        self.used_order.clear();
    }

    /// Number of valid codes
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.valid.len()
    }

    /// Number of redeemed codes
    #[must_use]
    pub fn used_count(&self) -> usize {
        self.used_order.len()
    }

    /// Whether `raw` is on the ticket list
    #[must_use]
    pub fn is_valid(&self, raw: &str) -> bool {
        TicketCode::parse(raw).is_some_and(|code| self.valid.contains(&code))
    }

    /// Whether `raw` has been redeemed
    #[must_use]
    pub fn is_used(&self, raw: &str) -> bool {
        TicketCode::parse(raw).is_some_and(|code| self.used.contains(&code))
    }

    /// Redeemed codes in the order they were redeemed
    #[must_use]
    pub fn used_codes(&self) -> &[TicketCode] {
        &self.used_order
    }

    fn mark_used(&mut self, code: TicketCode) {
        self.used.insert(code.clone());
        self.used_order.push(code);
    }
}
