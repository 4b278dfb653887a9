//! # Listing Market
//!
//! Seller-initiated standing offers: a fixed quantity of one project's
//! credits at a fixed price per credit, fillable in parts. A listing stays
//! active until its remaining quantity reaches zero, at which point it
//! flips inactive exactly once.
//!
//! The underlying credits are not escrowed. A seller can spend them through
//! another market between listing and purchase; the engine re-checks the
//! seller's balance at settlement time and fails the purchase whole if the
//! credits are gone.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::Address;
use crate::registry::ProjectId;

/// Sequential listing identifier, starting at 1.
pub type ListingId = u64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by listing-market operations.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The referenced listing id has never been assigned.
    #[error("listing {0} not found")]
    ListingNotFound(ListingId),

    /// The listing has been exhausted.
    #[error("listing {0} is no longer active")]
    ListingNotActive(ListingId),

    /// Quantities and prices must be positive.
    #[error("{field} must be greater than zero")]
    ZeroValue {
        /// Which argument was zero.
        field: &'static str,
    },

    /// The purchase asks for more credits than the listing still holds.
    #[error("requested {requested} credits, listing has {remaining} remaining")]
    ExceedsRemaining { requested: u64, remaining: u64 },

    /// `amount * price_per_credit` does not fit in a `u64`.
    #[error("purchase cost overflows for listing {0}")]
    CostOverflow(ListingId),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A standing fixed-price offer for one project's credits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Listing {
    /// Sequential id, assigned at creation.
    pub id: ListingId,
    /// The identity offering the credits.
    pub seller: Address,
    /// The project the offered credits are attributed to.
    pub project_id: ProjectId,
    /// Credits still available for purchase.
    pub credits_remaining: u64,
    /// Fixed asking price per credit.
    pub price_per_credit: u64,
    /// False exactly when `credits_remaining` has reached zero.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A validated purchase against a listing, priced and ready to settle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingQuote {
    /// The listing's seller, who receives the proceeds.
    pub seller: Address,
    /// The project attribution of the traded credits.
    pub project_id: ProjectId,
    /// `amount * price_per_credit`.
    pub total_price: u64,
}

// ---------------------------------------------------------------------------
// ListingBook
// ---------------------------------------------------------------------------

/// Append-only listing table with a per-seller discovery index.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListingBook {
    listings: BTreeMap<ListingId, Listing>,
    by_seller: HashMap<Address, Vec<ListingId>>,
    next_id: ListingId,
}

impl ListingBook {
    /// Creates an empty book. Ids start at 1.
    pub fn new() -> Self {
        Self {
            listings: BTreeMap::new(),
            by_seller: HashMap::new(),
            next_id: 1,
        }
    }

    /// Creates a listing. The seller's credit balance is checked by the
    /// engine at creation time but not escrowed afterwards.
    pub fn create(
        &mut self,
        seller: &str,
        project_id: ProjectId,
        amount: u64,
        price_per_credit: u64,
        now: DateTime<Utc>,
    ) -> Result<ListingId, ListingError> {
        if amount == 0 {
            return Err(ListingError::ZeroValue { field: "amount" });
        }
        if price_per_credit == 0 {
            return Err(ListingError::ZeroValue {
                field: "price_per_credit",
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        self.listings.insert(
            id,
            Listing {
                id,
                seller: seller.to_string(),
                project_id,
                credits_remaining: amount,
                price_per_credit,
                active: true,
                created_at: now,
            },
        );
        self.by_seller
            .entry(seller.to_string())
            .or_default()
            .push(id);
        Ok(id)
    }

    /// Prices a purchase of `amount` credits without mutating the listing.
    ///
    /// # Errors
    ///
    /// Rejects inactive listings, zero amounts, amounts beyond the remaining
    /// quantity, and cost overflow. Payment sufficiency is the engine's
    /// check, since the fee math lives there.
    pub fn quote(&self, listing_id: ListingId, amount: u64) -> Result<ListingQuote, ListingError> {
        let listing = self
            .listings
            .get(&listing_id)
            .ok_or(ListingError::ListingNotFound(listing_id))?;
        if !listing.active {
            return Err(ListingError::ListingNotActive(listing_id));
        }
        if amount == 0 {
            return Err(ListingError::ZeroValue { field: "amount" });
        }
        if amount > listing.credits_remaining {
            return Err(ListingError::ExceedsRemaining {
                requested: amount,
                remaining: listing.credits_remaining,
            });
        }
        let total_price = amount
            .checked_mul(listing.price_per_credit)
            .ok_or(ListingError::CostOverflow(listing_id))?;

        Ok(ListingQuote {
            seller: listing.seller.clone(),
            project_id: listing.project_id,
            total_price,
        })
    }

    /// Applies a validated fill: decrements the remaining quantity and
    /// deactivates the listing when it reaches zero. Call only after
    /// [`quote`](Self::quote) for the same amount succeeded within the same
    /// transaction.
    pub fn commit_fill(&mut self, listing_id: ListingId, amount: u64) -> Result<(), ListingError> {
        let listing = self
            .listings
            .get_mut(&listing_id)
            .ok_or(ListingError::ListingNotFound(listing_id))?;
        listing.credits_remaining = listing.credits_remaining.saturating_sub(amount);
        if listing.credits_remaining == 0 {
            listing.active = false;
        }
        Ok(())
    }

    /// Looks up a listing by id.
    pub fn get(&self, id: ListingId) -> Option<&Listing> {
        self.listings.get(&id)
    }

    /// Ids of every listing created by `seller`, in creation order.
    pub fn listings_of(&self, seller: &str) -> &[ListingId] {
        self.by_seller.get(seller).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of listings ever created.
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_with_listing(amount: u64, price: u64) -> (ListingBook, ListingId) {
        let mut book = ListingBook::new();
        let id = book
            .create("0xngo", 1, amount, price, Utc::now())
            .unwrap();
        (book, id)
    }

    #[test]
    fn create_starts_active_with_full_amount() {
        let (book, id) = book_with_listing(200, 5);
        let listing = book.get(id).unwrap();
        assert!(listing.active);
        assert_eq!(listing.credits_remaining, 200);
        assert_eq!(listing.price_per_credit, 5);
    }

    #[test]
    fn zero_arguments_rejected() {
        let mut book = ListingBook::new();
        assert!(book.create("0xngo", 1, 0, 5, Utc::now()).is_err());
        assert!(book.create("0xngo", 1, 200, 0, Utc::now()).is_err());
        assert!(book.is_empty());
    }

    #[test]
    fn quote_prices_the_fill() {
        let (book, id) = book_with_listing(200, 5);
        let quote = book.quote(id, 80).unwrap();
        assert_eq!(quote.total_price, 400);
        assert_eq!(quote.seller, "0xngo");
        assert_eq!(quote.project_id, 1);
    }

    #[test]
    fn quote_beyond_remaining_rejected() {
        let (book, id) = book_with_listing(200, 5);
        let err = book.quote(id, 201).unwrap_err();
        assert!(matches!(
            err,
            ListingError::ExceedsRemaining {
                requested: 201,
                remaining: 200,
            }
        ));
    }

    #[test]
    fn partial_fills_exhaust_the_listing() {
        let (mut book, id) = book_with_listing(200, 5);

        book.quote(id, 80).unwrap();
        book.commit_fill(id, 80).unwrap();
        assert!(book.get(id).unwrap().active);
        assert_eq!(book.get(id).unwrap().credits_remaining, 120);

        book.quote(id, 120).unwrap();
        book.commit_fill(id, 120).unwrap();
        let listing = book.get(id).unwrap();
        assert!(!listing.active);
        assert_eq!(listing.credits_remaining, 0);
    }

    #[test]
    fn exhausted_listing_rejects_further_quotes() {
        let (mut book, id) = book_with_listing(100, 5);
        book.commit_fill(id, 100).unwrap();
        assert!(matches!(
            book.quote(id, 1),
            Err(ListingError::ListingNotActive(_))
        ));
    }

    #[test]
    fn unknown_listing_rejected() {
        let book = ListingBook::new();
        assert!(matches!(
            book.quote(42, 1),
            Err(ListingError::ListingNotFound(42))
        ));
    }

    #[test]
    fn cost_overflow_rejected() {
        let (book, id) = book_with_listing(u64::MAX, 2);
        assert!(matches!(
            book.quote(id, u64::MAX),
            Err(ListingError::CostOverflow(_))
        ));
    }

    #[test]
    fn seller_index_tracks_creation_order() {
        let mut book = ListingBook::new();
        let a = book.create("0xngo", 1, 10, 5, Utc::now()).unwrap();
        let b = book.create("0xngo", 2, 20, 6, Utc::now()).unwrap();
        assert_eq!(book.listings_of("0xngo"), &[a, b]);
        assert!(book.listings_of("0xother").is_empty());
    }
}
