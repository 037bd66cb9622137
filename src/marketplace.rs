// ============================================================================
// Marketplace Engine
// ============================================================================
//
// Listing flow: ACTIVE → SOLD | CANCELLED (both terminal)
//
// A sale settles the seller amount into the persona wallet first, then lands
// listing status, ownership transfer and the MARKETPLACE deposit in a single
// store commit. A failed settlement leaves the listing ACTIVE and the owner
// unchanged.
//
// The persona's wallet lock is held from the owner check to the commit so a
// pending withdrawal by the seller finishes before ownership moves.
//
// ============================================================================

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{ArenaError, ArenaResult};
use crate::ledger::Ledger;
use crate::models::{EarningType, Listing, ListingStatus, SaleBreakdown, Tier};
use crate::pricing::{round_native, FeeSchedule};
use crate::store::{EntityLocks, Repository, SaleCommit, DEFAULT_PAGE_SIZE};

/// Fee and royalty are rounded; the seller gets the exact remainder.
pub fn split_sale(price: Decimal, fees: &FeeSchedule) -> SaleBreakdown {
    let platform = round_native(price * fees.platform_fee_rate);
    let creator = round_native(price * fees.creator_royalty_rate);
    SaleBreakdown { total: price, seller: price - platform - creator, creator, platform }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingSort {
    Price,
    #[default]
    Recent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingFilter {
    pub tier: Option<Tier>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort_by: ListingSort,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceStats {
    /// Currently active listings
    pub total_listings: usize,
    pub total_sold: usize,
    pub average_price: Decimal,
    pub total_volume: Decimal,
}

pub struct MarketplaceEngine {
    repo: Arc<dyn Repository>,
    ledger: Arc<Ledger>,
    fees: FeeSchedule,
    locks: EntityLocks,
}

impl MarketplaceEngine {
    pub fn new(repo: Arc<dyn Repository>, ledger: Arc<Ledger>, fees: FeeSchedule) -> Self {
        Self { repo, ledger, fees, locks: EntityLocks::new() }
    }

    pub async fn list(&self, persona_id: &str, price: Decimal, requester_id: &str) -> ArenaResult<Listing> {
        if price <= Decimal::ZERO {
            return Err(ArenaError::invalid_input(format!("listing price must be positive, got {}", price)));
        }
        let persona = self.repo.get_persona_required(persona_id).await?;
        if persona.owner_id != requester_id {
            return Err(ArenaError::forbidden(format!("{} does not own persona {}", requester_id, persona_id)));
        }

        let now = Utc::now();
        let listing = Listing {
            id: uuid::Uuid::new_v4().to_string(),
            persona_id: persona.id,
            seller_id: requester_id.to_string(),
            price,
            status: ListingStatus::Active,
            buyer_id: None,
            settlement: None,
            created_at: now,
            updated_at: now,
            sold_at: None,
        };
        self.repo.insert_listing_exclusive(listing.clone()).await?;

        info!(listing_id = %listing.id, persona_id = %listing.persona_id, price = %price, "listing created");
        Ok(listing)
    }

    pub async fn cancel(&self, listing_id: &str, requester_id: &str) -> ArenaResult<Listing> {
        let _guard = self.locks.acquire(listing_id).await;

        let listing = self.repo.get_listing_required(listing_id).await?;
        let persona = self.repo.get_persona_required(&listing.persona_id).await?;
        if persona.owner_id != requester_id {
            return Err(ArenaError::forbidden(format!(
                "{} does not own persona {}",
                requester_id, persona.id
            )));
        }
        let cancelled = self.repo.cancel_listing_if_active(listing_id, Utc::now()).await?;

        info!(listing_id = %listing_id, persona_id = %cancelled.persona_id, "listing cancelled");
        Ok(cancelled)
    }

    pub async fn buy(&self, listing_id: &str, buyer_id: &str, buyer_wallet: &str) -> ArenaResult<Listing> {
        let _guard = self.locks.acquire(listing_id).await;

        let listing = self.repo.get_listing_required(listing_id).await?;
        if listing.status.is_terminal() {
            return Err(ArenaError::invalid_state(format!(
                "listing {} is {}, buy requires ACTIVE",
                listing_id, listing.status
            )));
        }
        let _wallet = self.ledger.lock_wallet(&listing.persona_id).await;
        let persona = self.repo.get_persona_required(&listing.persona_id).await?;
        if persona.owner_id == buyer_id {
            return Err(ArenaError::invalid_input("buyer already owns this persona"));
        }

        let breakdown = split_sale(listing.price, &self.fees);
        let deposit = self
            .ledger
            .settle_deposit(&persona, breakdown.seller, EarningType::Marketplace, None)
            .await?;
        let receipt = deposit.receipt_id.clone();

        let commit = SaleCommit {
            listing_id: listing_id.to_string(),
            buyer_id: buyer_id.to_string(),
            buyer_wallet: buyer_wallet.to_string(),
            breakdown,
            sold_at: Utc::now(),
            deposit,
        };
        let sold = match self.repo.commit_sale(commit).await {
            Ok(sold) => sold,
            Err(e) => {
                error!(
                    listing_id = %listing_id,
                    receipt = %receipt,
                    amount = %breakdown.seller,
                    error = %e,
                    "sale settled but commit failed; needs reconciliation"
                );
                return Err(e);
            }
        };

        info!(
            listing_id = %listing_id,
            persona_id = %sold.persona_id,
            seller = %listing.seller_id,
            buyer = %buyer_id,
            price = %breakdown.total,
            seller_amount = %breakdown.seller,
            "listing sold"
        );
        Ok(sold)
    }

    pub async fn get_listing(&self, listing_id: &str) -> ArenaResult<Listing> {
        self.repo.get_listing_required(listing_id).await
    }

    pub async fn active_listings(&self, filter: &ListingFilter) -> ArenaResult<Vec<Listing>> {
        let active = self.repo.list_listings(Some(ListingStatus::Active)).await?;

        let mut listings = Vec::with_capacity(active.len());
        for listing in active {
            if filter.min_price.is_some_and(|min| listing.price < min)
                || filter.max_price.is_some_and(|max| listing.price > max)
            {
                continue;
            }
            if let Some(tier) = filter.tier {
                match self.repo.get_persona(&listing.persona_id).await? {
                    Some(persona) if persona.tier == tier => {}
                    _ => continue,
                }
            }
            listings.push(listing);
        }

        match filter.sort_by {
            ListingSort::Price => listings.sort_by(|a, b| a.price.cmp(&b.price)),
            ListingSort::Recent => listings.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        listings.truncate(filter.limit.unwrap_or(DEFAULT_PAGE_SIZE));
        Ok(listings)
    }

    pub async fn stats(&self) -> ArenaResult<MarketplaceStats> {
        let listings = self.repo.list_listings(None).await?;
        let total_listings = listings.iter().filter(|l| l.status == ListingStatus::Active).count();
        let sold: Vec<&Listing> = listings.iter().filter(|l| l.status == ListingStatus::Sold).collect();

        let total_volume: Decimal = sold.iter().map(|l| l.price).sum();
        let average_price = if sold.is_empty() {
            Decimal::ZERO
        } else {
            round_native(total_volume / Decimal::from(sold.len()))
        };

        Ok(MarketplaceStats { total_listings, total_sold: sold.len(), average_price, total_volume })
    }
}
