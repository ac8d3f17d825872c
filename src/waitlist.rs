//! Per-slot waiting pools.
//!
//! Tokens that could not be admitted (or were bumped by preemption) wait here
//! until a cancellation frees capacity in their slot. Membership is also
//! indexed by token id so waiting tokens can be cancelled directly.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Token, TokenStatus};

/// Identifies one slot of one doctor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SlotKey {
    pub doctor_id: String,
    pub slot_id: String,
}

impl SlotKey {
    pub fn new(doctor_id: impl Into<String>, slot_id: impl Into<String>) -> Self {
        SlotKey {
            doctor_id: doctor_id.into(),
            slot_id: slot_id.into(),
        }
    }

    pub fn of(token: &Token) -> Self {
        SlotKey::new(token.doctor_id.clone(), token.slot_id.clone())
    }
}

/// Promotion rank: higher priority first, then earlier arrival.
fn promotion_order(a: &Token, b: &Token) -> Ordering {
    b.priority()
        .cmp(&a.priority())
        .then_with(|| a.arrival().cmp(&b.arrival()))
}

#[derive(Debug, Default)]
pub struct WaitingPool {
    pools: HashMap<SlotKey, Vec<Token>>,
    members: HashMap<String, SlotKey>,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a token in its slot's pool, marking it Waiting.
    pub fn enqueue(&mut self, mut token: Token) {
        token.status = TokenStatus::Waiting;
        let key = SlotKey::of(&token);
        self.members.insert(token.id.clone(), key.clone());
        self.pools.entry(key).or_default().push(token);
    }

    /// Remove and return the best-ranked waiting token of a slot.
    pub fn take_next(&mut self, key: &SlotKey) -> Option<Token> {
        let pool = self.pools.get_mut(key)?;
        let (index, _) = pool
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| promotion_order(a, b))?;

        let token = pool.swap_remove(index);
        if pool.is_empty() {
            self.pools.remove(key);
        }
        self.members.remove(&token.id);
        Some(token)
    }

    /// Remove a specific waiting token by id.
    pub fn remove(&mut self, token_id: &str) -> Option<Token> {
        let key = self.members.remove(token_id)?;
        let pool = self.pools.get_mut(&key)?;
        let index = pool.iter().position(|t| t.id == token_id)?;
        let token = pool.swap_remove(index);
        if pool.is_empty() {
            self.pools.remove(&key);
        }
        Some(token)
    }

    pub fn contains(&self, token_id: &str) -> bool {
        self.members.contains_key(token_id)
    }

    /// Waiting tokens of a slot, best-ranked first.
    pub fn ranked(&self, key: &SlotKey) -> Vec<Token> {
        let mut tokens = self.pools.get(key).cloned().unwrap_or_default();
        tokens.sort_by(promotion_order);
        tokens
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Drop every pool belonging to a doctor, returning how many tokens went.
    pub fn drop_doctor(&mut self, doctor_id: &str) -> usize {
        let keys: Vec<SlotKey> = self
            .pools
            .keys()
            .filter(|k| k.doctor_id == doctor_id)
            .cloned()
            .collect();

        let mut dropped = 0;
        for key in keys {
            if let Some(tokens) = self.pools.remove(&key) {
                for token in &tokens {
                    self.members.remove(&token.id);
                }
                dropped += tokens.len();
            }
        }
        dropped
    }
}
