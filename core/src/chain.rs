//! # Audit Chain
//!
//! Every applied transaction appends exactly one block: a sequential,
//! hash-linked record carrying the transaction's domain events. The chain is
//! the durable audit trail the off-chain indexer replays; nothing is ever
//! rewritten or deleted, and the flat event stream is just the blocks read
//! in order.
//!
//! Hashes are SHA-256 over the canonical JSON encoding of the block's
//! content (sorted keys, hash field excluded). The genesis block carries no
//! events and links to the literal `"GENESIS"` sentinel.
//!
//! Receipts are what callers get back: the block's hash and number plus a
//! synthetic gas figure from flat metering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{GENESIS_PREVIOUS_HASH, RECEIPT_BASE_GAS, RECEIPT_EVENT_GAS};
use crate::events::DomainEvent;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Integrity failures detected when verifying the chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A block's stored hash does not match its recomputed hash.
    #[error("block {number} content does not match its hash")]
    HashMismatch {
        /// The offending block number.
        number: u64,
    },

    /// A block does not link to its predecessor's hash.
    #[error("block {number} does not link to its predecessor")]
    BrokenLink {
        /// The offending block number.
        number: u64,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What a caller gets back for an applied transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Hash of the block recording this transaction.
    pub tx_hash: String,
    /// 1-based number of that block.
    pub block_number: u64,
    /// Metered cost of the transaction.
    pub gas_used: u64,
}

/// One applied transaction in the audit trail.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// 1-based sequential block number.
    pub number: u64,
    /// When the block was appended.
    pub timestamp: DateTime<Utc>,
    /// Short label naming the operation that produced the block.
    pub label: String,
    /// The domain events the transaction emitted.
    pub events: Vec<DomainEvent>,
    /// Hash of the preceding block, or the genesis sentinel.
    pub previous_hash: String,
    /// SHA-256 over this block's canonical content.
    pub hash: String,
}

fn block_hash(
    number: u64,
    timestamp: DateTime<Utc>,
    label: &str,
    events: &[DomainEvent],
    previous_hash: &str,
) -> String {
    // serde_json maps sort keys, so this encoding is canonical.
    let content = json!({
        "number": number,
        "timestamp": timestamp,
        "label": label,
        "events": events,
        "previous_hash": previous_hash,
    });
    let mut hasher = Sha256::new();
    hasher.update(content.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// AuditChain
// ---------------------------------------------------------------------------

/// Append-only, hash-linked block log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditChain {
    blocks: Vec<Block>,
}

impl AuditChain {
    /// Creates a chain holding only the genesis block.
    pub fn new(genesis_time: DateTime<Utc>) -> Self {
        let hash = block_hash(1, genesis_time, "genesis", &[], GENESIS_PREVIOUS_HASH);
        Self {
            blocks: vec![Block {
                number: 1,
                timestamp: genesis_time,
                label: "genesis".to_string(),
                events: Vec::new(),
                previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
                hash,
            }],
        }
    }

    /// Appends a block for one applied transaction and returns its receipt.
    pub fn append(
        &mut self,
        label: &str,
        events: Vec<DomainEvent>,
        now: DateTime<Utc>,
    ) -> TxReceipt {
        let number = self.blocks.len() as u64 + 1;
        let previous_hash = self.last_hash().to_string();
        let hash = block_hash(number, now, label, &events, &previous_hash);
        let gas_used = RECEIPT_BASE_GAS + RECEIPT_EVENT_GAS * events.len() as u64;

        self.blocks.push(Block {
            number,
            timestamp: now,
            label: label.to_string(),
            events,
            previous_hash,
            hash: hash.clone(),
        });

        TxReceipt {
            tx_hash: hash,
            block_number: number,
            gas_used,
        }
    }

    /// Hash of the newest block.
    pub fn last_hash(&self) -> &str {
        // The chain always holds at least the genesis block.
        &self.blocks[self.blocks.len() - 1].hash
    }

    /// Number of blocks, genesis included.
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// All blocks in append order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The flat event stream: every event of every block, in order.
    pub fn events(&self) -> impl Iterator<Item = &DomainEvent> {
        self.blocks.iter().flat_map(|b| b.events.iter())
    }

    /// Recomputes every hash and checks every link.
    pub fn verify(&self) -> Result<(), ChainError> {
        let mut expected_previous = GENESIS_PREVIOUS_HASH.to_string();
        for block in &self.blocks {
            if block.previous_hash != expected_previous {
                return Err(ChainError::BrokenLink {
                    number: block.number,
                });
            }
            let recomputed = block_hash(
                block.number,
                block.timestamp,
                &block.label,
                &block.events,
                &block.previous_hash,
            );
            if recomputed != block.hash {
                return Err(ChainError::HashMismatch {
                    number: block.number,
                });
            }
            expected_previous = block.hash.clone();
        }
        Ok(())
    }
}

impl Default for AuditChain {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minted(amount: u64) -> DomainEvent {
        DomainEvent::Minted {
            to: "0xngo".into(),
            amount,
            project_id: 1,
            project_name: "Mangrove-1".into(),
        }
    }

    #[test]
    fn genesis_links_to_sentinel() {
        let chain = AuditChain::new(Utc::now());
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.blocks()[0].previous_hash, GENESIS_PREVIOUS_HASH);
        chain.verify().unwrap();
    }

    #[test]
    fn append_links_and_numbers_sequentially() {
        let mut chain = AuditChain::new(Utc::now());
        let first = chain.append("mint", vec![minted(500)], Utc::now());
        let second = chain.append("mint", vec![minted(200)], Utc::now());

        assert_eq!(first.block_number, 2);
        assert_eq!(second.block_number, 3);
        assert_eq!(chain.blocks()[2].previous_hash, chain.blocks()[1].hash);
        chain.verify().unwrap();
    }

    #[test]
    fn receipt_gas_meters_events() {
        let mut chain = AuditChain::new(Utc::now());
        let receipt = chain.append("mint", vec![minted(1), minted(2)], Utc::now());
        assert_eq!(receipt.gas_used, RECEIPT_BASE_GAS + 2 * RECEIPT_EVENT_GAS);
        assert_eq!(receipt.tx_hash, *chain.last_hash());
    }

    #[test]
    fn event_stream_flattens_blocks_in_order() {
        let mut chain = AuditChain::new(Utc::now());
        chain.append("mint", vec![minted(1)], Utc::now());
        chain.append("mint", vec![minted(2), minted(3)], Utc::now());

        let amounts: Vec<u64> = chain
            .events()
            .map(|e| match e {
                DomainEvent::Minted { amount, .. } => *amount,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(amounts, vec![1, 2, 3]);
    }

    #[test]
    fn tampering_breaks_verification() {
        let mut chain = AuditChain::new(Utc::now());
        chain.append("mint", vec![minted(500)], Utc::now());

        chain.blocks[1].events = vec![minted(999)];
        assert!(matches!(
            chain.verify(),
            Err(ChainError::HashMismatch { number: 2 })
        ));
    }

    #[test]
    fn relinking_breaks_verification() {
        let mut chain = AuditChain::new(Utc::now());
        chain.append("mint", vec![minted(1)], Utc::now());
        chain.append("mint", vec![minted(2)], Utc::now());

        chain.blocks[2].previous_hash = chain.blocks[0].hash.clone();
        assert!(matches!(
            chain.verify(),
            Err(ChainError::BrokenLink { number: 3 })
        ));
    }
}
