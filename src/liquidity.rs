// 5.0 liquidity.rs: the pool every trader trades against.
// LPs deposit collateral currency and get shares. the market earmarks capital
// against open exposure with reserve/release; nothing moves until pay_out.
//
//   free = total - reserved          withdrawals only come out of free
//   share price = total / shares     1:1 while no shares exist
//
// value lives in the token ledger at `custody`. the pool keeps
// custody balance == total_liquidity on every path through here.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::custody::{CustodyError, TokenLedger};
use crate::types::{mul_div, Address, ArithmeticOverflow, Quote, Shares, AMOUNT_DECIMALS};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Zero amount")]
    ZeroAmount,

    #[error("Insufficient free liquidity: requested {requested}, free {free}")]
    InsufficientFreeLiquidity { requested: Quote, free: Quote },

    #[error("Insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: Shares, held: Shares },

    #[error("Reservation exceeds total liquidity: reserved {reserved}, total {total}")]
    ExceedsTotalLiquidity { reserved: Quote, total: Quote },

    #[error("Release of {requested} exceeds reserved {reserved}")]
    ReleaseExceedsReserved { requested: Quote, reserved: Quote },

    #[error("Pool is depleted: shares outstanding with zero liquidity")]
    DepletedPool,

    #[error("Caller {0} is not the market")]
    Unauthorized(Address),

    #[error("Caller {0} is not the pool owner")]
    NotOwner(Address),

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error(transparent)]
    Overflow(#[from] ArithmeticOverflow),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
    owner: Address,
    custody: Address,
    market: Option<Address>,
    total_liquidity: Quote,
    reserved_liquidity: Quote,
    shares: HashMap<Address, Shares>,
    total_shares: Shares,
}

impl LiquidityPool {
    pub fn new(owner: Address, custody: Address) -> Self {
        Self {
            owner,
            custody,
            market: None,
            total_liquidity: Quote::zero(),
            reserved_liquidity: Quote::zero(),
            shares: HashMap::new(),
            total_shares: Shares::zero(),
        }
    }

    // 5.1: binds the only caller allowed to reserve/release/pay_out/absorb
    pub fn set_market(&mut self, caller: Address, market: Address) -> Result<(), PoolError> {
        if caller != self.owner {
            return Err(PoolError::NotOwner(caller));
        }
        self.market = Some(market);
        Ok(())
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn custody(&self) -> Address {
        self.custody
    }

    pub fn market(&self) -> Option<Address> {
        self.market
    }

    pub fn total_liquidity(&self) -> Quote {
        self.total_liquidity
    }

    pub fn reserved_liquidity(&self) -> Quote {
        self.reserved_liquidity
    }

    pub fn free_liquidity(&self) -> Quote {
        self.total_liquidity.sub(self.reserved_liquidity)
    }

    pub fn total_shares(&self) -> Shares {
        self.total_shares
    }

    pub fn shares_of(&self, holder: Address) -> Shares {
        self.shares.get(&holder).copied().unwrap_or_else(Shares::zero)
    }

    // liquidity per share, 1 while the pool is empty. saturates on dust shares
    pub fn share_price(&self) -> Decimal {
        if self.total_shares.is_zero() {
            return Decimal::ONE;
        }
        self.total_liquidity
            .value()
            .checked_div(self.total_shares.value())
            .unwrap_or(Decimal::MAX)
    }

    pub fn utilization(&self) -> Decimal {
        self.utilization_after(Quote::zero())
    }

    /// Reserved over total if `extra` were reserved on top. An empty pool is fully
    /// utilized; a ratio too large to represent reads as `Decimal::MAX`.
    pub fn utilization_after(&self, extra: Quote) -> Decimal {
        let Some(reserved) = self.reserved_liquidity.value().checked_add(extra.value()) else {
            return Decimal::MAX;
        };
        let reserved = Quote::new(reserved);
        if !self.total_liquidity.is_positive() {
            return if reserved.is_zero() { Decimal::ZERO } else { Decimal::ONE };
        }
        reserved
            .value()
            .checked_div(self.total_liquidity.value())
            .unwrap_or(Decimal::MAX)
    }

    /// Value redeemable for `shares` at the current share price.
    pub fn preview_withdraw(&self, shares: Shares) -> Result<Quote, PoolError> {
        if self.total_shares.is_zero() {
            return Ok(Quote::zero());
        }
        // full redemption gets everything, no rounding dust left behind
        if shares == self.total_shares {
            return Ok(self.total_liquidity);
        }
        let amount = mul_div(shares.value(), self.total_liquidity.value(), self.total_shares.value())?;
        let amount = Quote::new(amount.round_dp_with_strategy(AMOUNT_DECIMALS, RoundingStrategy::ToZero));
        // the divide-first path can round up by a hair
        Ok(amount.min(self.total_liquidity))
    }

    pub fn preview_deposit(&self, amount: Quote) -> Result<Shares, PoolError> {
        if !amount.is_positive() {
            return Err(PoolError::ZeroAmount);
        }
        if self.total_shares.is_zero() {
            return Ok(Shares::new(amount.value()));
        }
        if !self.total_liquidity.is_positive() {
            return Err(PoolError::DepletedPool);
        }
        // rounds down so a deposit never dilutes existing holders
        let minted = mul_div(amount.value(), self.total_shares.value(), self.total_liquidity.value())?;
        Ok(Shares::new(minted.round_dp_with_strategy(AMOUNT_DECIMALS, RoundingStrategy::ToZero)))
    }

    // 5.2: pulls `amount` from the provider into custody, mints shares
    pub fn deposit(
        &mut self,
        token: &mut TokenLedger,
        provider: Address,
        amount: Quote,
    ) -> Result<Shares, PoolError> {
        let minted = self.preview_deposit(amount)?;
        let total_shares = checked_sum(self.total_shares.value(), minted.value())?;
        let held = checked_sum(self.shares_of(provider).value(), minted.value())?;
        token.ensure_balance(provider, amount)?;

        token.transfer(provider, self.custody, amount)?;
        self.total_liquidity = self.total_liquidity.add(amount);
        self.total_shares = Shares::new(total_shares);
        self.shares.insert(provider, Shares::new(held));

        Ok(minted)
    }

    // 5.3: burns shares, pays the provider out of free liquidity only
    pub fn withdraw(
        &mut self,
        token: &mut TokenLedger,
        provider: Address,
        shares: Shares,
    ) -> Result<Quote, PoolError> {
        if shares.value() <= Decimal::ZERO {
            return Err(PoolError::ZeroAmount);
        }
        let held = self.shares_of(provider);
        if shares > held {
            return Err(PoolError::InsufficientShares {
                requested: shares,
                held,
            });
        }

        let amount = self.preview_withdraw(shares)?;
        let free = self.free_liquidity();
        if amount > free {
            return Err(PoolError::InsufficientFreeLiquidity {
                requested: amount,
                free,
            });
        }
        token.ensure_balance(self.custody, amount)?;

        // ledger first, transfer last
        let remaining = Shares::new(held.value() - shares.value());
        if remaining.is_zero() {
            self.shares.remove(&provider);
        } else {
            self.shares.insert(provider, remaining);
        }
        self.total_shares = Shares::new(self.total_shares.value() - shares.value());
        self.total_liquidity = self.total_liquidity.sub(amount);

        token.transfer(self.custody, provider, amount)?;
        Ok(amount)
    }

    fn ensure_market(&self, caller: Address) -> Result<(), PoolError> {
        match self.market {
            Some(market) if market == caller => Ok(()),
            _ => Err(PoolError::Unauthorized(caller)),
        }
    }

    pub fn reserve(&mut self, caller: Address, amount: Quote) -> Result<(), PoolError> {
        self.ensure_market(caller)?;
        if amount.is_negative() {
            return Err(PoolError::ZeroAmount);
        }
        let reserved = self.reserved_liquidity.add(amount);
        if reserved > self.total_liquidity {
            return Err(PoolError::ExceedsTotalLiquidity {
                reserved,
                total: self.total_liquidity,
            });
        }
        self.reserved_liquidity = reserved;
        Ok(())
    }

    pub fn release(&mut self, caller: Address, amount: Quote) -> Result<(), PoolError> {
        self.ensure_market(caller)?;
        if amount.is_negative() {
            return Err(PoolError::ZeroAmount);
        }
        if amount > self.reserved_liquidity {
            return Err(PoolError::ReleaseExceedsReserved {
                requested: amount,
                reserved: self.reserved_liquidity,
            });
        }
        self.reserved_liquidity = self.reserved_liquidity.sub(amount);
        Ok(())
    }

    // 5.4: settles trader profit out of custody. can't dip into reserved
    pub fn pay_out(
        &mut self,
        caller: Address,
        token: &mut TokenLedger,
        to: Address,
        amount: Quote,
    ) -> Result<(), PoolError> {
        self.ensure_market(caller)?;
        if amount.is_negative() {
            return Err(PoolError::ZeroAmount);
        }
        let free = self.free_liquidity();
        if amount > free {
            return Err(PoolError::InsufficientFreeLiquidity {
                requested: amount,
                free,
            });
        }
        token.ensure_balance(self.custody, amount)?;

        self.total_liquidity = self.total_liquidity.sub(amount);
        token.transfer(self.custody, to, amount)?;
        Ok(())
    }

    // 5.5: trader losses and seized collateral flow back to LPs here.
    // the market moves `amount` from its own custody into the pool.
    pub fn absorb(&mut self, caller: Address, token: &mut TokenLedger, amount: Quote) -> Result<(), PoolError> {
        self.ensure_market(caller)?;
        if amount.is_negative() {
            return Err(PoolError::ZeroAmount);
        }
        token.ensure_balance(caller, amount)?;

        token.transfer(caller, self.custody, amount)?;
        self.total_liquidity = self.total_liquidity.add(amount);
        Ok(())
    }
}

fn checked_sum(a: Decimal, b: Decimal) -> Result<Decimal, ArithmeticOverflow> {
    a.checked_add(b).ok_or(ArithmeticOverflow)
}
