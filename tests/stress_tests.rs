//! Stress tests
//!
//! Many traders, volatile prices and concurrent callers. The market must stay
//! solvent and every transaction must apply whole or not at all.

use perps_relay::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

fn q(v: Decimal) -> Quote {
    Quote::new(v)
}

fn lp() -> Address {
    Address::from_low_u64(0x11)
}

fn keeper() -> Address {
    Address::from_low_u64(0x33)
}

fn trader(i: u64) -> Address {
    Address::from_low_u64(0x1000 + i)
}

fn assert_solvent(engine: &Engine) {
    assert!(engine.pool().reserved_liquidity() <= engine.pool().total_liquidity());
    assert_eq!(engine.pool().reserved_liquidity(), engine.total_open_size());
    assert_eq!(engine.market_custody_balance(), engine.total_collateral());
    assert_eq!(engine.pool_custody_balance(), engine.pool().total_liquidity());
}

fn deep_engine(traders: u64) -> Engine {
    let oracle = MockPriceFeed::new("ETH/USD", Price::new_unchecked(dec!(2000)));
    let mut engine = Engine::new(EngineConfig::default(), MarketParams::default(), oracle).unwrap();
    engine.mint(lp(), q(dec!(1_000_000))).unwrap();
    engine.deposit_liquidity(lp(), q(dec!(1_000_000))).unwrap();
    for i in 0..traders {
        engine.mint(trader(i), q(dec!(10_000))).unwrap();
    }
    engine
}

/// Price swings with a crowd of leveraged traders on both sides.
mod volatility_tests {
    use super::*;

    #[test]
    fn keepers_clear_every_underwater_position() {
        let mut engine = deep_engine(40);
        for i in 0..40u64 {
            let side = if i % 2 == 0 { Side::Long } else { Side::Short };
            let leverage = Decimal::from(1 + i % 10);
            engine
                .open_position(trader(i), q(dec!(500)), leverage, side)
                .unwrap();
        }
        assert_solvent(&engine);

        let prices = [
            dec!(2100), dec!(2250), dec!(1950), dec!(1800), dec!(1700),
            dec!(1900), dec!(2300), dec!(2500), dec!(2000), dec!(1600),
        ];
        let mut liquidated = 0;
        for price in prices {
            engine.oracle_mut().set_price(Price::new_unchecked(price));
            for who in engine.liquidatable_traders().unwrap() {
                engine.liquidate(keeper(), who).unwrap();
                liquidated += 1;
            }
            assert!(engine.liquidatable_traders().unwrap().is_empty());
            assert_solvent(&engine);
        }

        assert!(liquidated > 0);
        assert!(engine.balance_of(keeper()).is_positive());
        assert_eq!(engine.open_position_count() + liquidated, 40);
    }

    #[test]
    fn winners_always_paid_in_full() {
        let mut engine = deep_engine(20);
        for i in 0..20u64 {
            engine
                .open_position(trader(i), q(dec!(1000)), dec!(10), Side::Long)
                .unwrap();
        }

        // doubling caps every profit at size
        engine.oracle_mut().set_price(Price::new_unchecked(dec!(5000)));
        for i in 0..20u64 {
            let outcome = engine.close_position(trader(i)).unwrap();
            assert_eq!(outcome.realized_pnl, q(dec!(10_000)));
            assert_eq!(outcome.payout, q(dec!(11_000)));
        }

        assert_eq!(engine.pool().total_liquidity(), q(dec!(800_000)));
        assert_eq!(engine.pool().reserved_liquidity(), Quote::zero());
        assert_solvent(&engine);
    }

    #[test]
    fn lp_exit_blocked_while_positions_open() {
        let mut engine = deep_engine(10);
        for i in 0..10u64 {
            engine
                .open_position(trader(i), q(dec!(8000)), dec!(10), Side::Short)
                .unwrap();
        }
        // 800k reserved of 1M
        let shares = engine.pool().shares_of(lp());
        assert!(engine.withdraw_liquidity(lp(), shares).is_err());
        assert_eq!(
            engine.withdraw_liquidity(lp(), Shares::new(dec!(200_000))).unwrap(),
            q(dec!(200_000))
        );
        assert!(engine.withdraw_liquidity(lp(), Shares::new(dec!(1))).is_err());
        assert_solvent(&engine);
    }
}

/// Several threads hammering one shared market.
mod concurrency_tests {
    use super::*;

    #[test]
    fn concurrent_callers_never_interleave() {
        let shared = deep_engine(16).into_shared();

        let handles: Vec<_> = (0..16u64)
            .map(|i| {
                let engine = Arc::clone(&shared);
                thread::spawn(move || {
                    for round in 0..10 {
                        let mut engine = engine.lock().unwrap();
                        let side = if (i + round) % 2 == 0 { Side::Long } else { Side::Short };
                        engine
                            .open_position(trader(i), q(dec!(100)), dec!(5), side)
                            .unwrap();
                        engine.add_collateral(trader(i), q(dec!(10))).unwrap();
                        engine.close_position(trader(i)).unwrap();
                        assert_solvent(&engine);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let engine = shared.lock().unwrap();
        assert_eq!(engine.open_position_count(), 0);
        // price never moved, so nobody gained or lost
        for i in 0..16u64 {
            assert_eq!(engine.balance_of(trader(i)), q(dec!(10_000)));
        }
        assert_eq!(engine.pool().total_liquidity(), q(dec!(1_000_000)));
    }

    #[test]
    fn relay_delivery_alongside_direct_calls() {
        let config = VenueConfig::default();
        let shared = deep_engine(8).into_shared();
        let receiver = IntentReceiver::new(config.relay.receiver.clone(), Arc::clone(&shared));
        let mut sender = IntentSender::new(config.relay.sender.clone());
        let mut transport = InMemoryTransport::new(config.relay.receiver.router);

        for i in 0..4u64 {
            let intent = Intent::open(trader(i), q(dec!(100)), dec!(3), Side::Long);
            sender.send_intent(trader(i), &intent, &mut transport).unwrap();
        }

        let direct = {
            let engine = Arc::clone(&shared);
            thread::spawn(move || {
                for i in 4..8u64 {
                    engine
                        .lock()
                        .unwrap()
                        .open_position(trader(i), q(dec!(100)), dec!(3), Side::Short)
                        .unwrap();
                }
            })
        };
        direct.join().unwrap();

        // another thread sits on the lock; delivery waits for it instead of failing
        let (locked_tx, locked_rx) = mpsc::channel();
        let holder = {
            let engine = Arc::clone(&shared);
            thread::spawn(move || {
                let _held = engine.lock().unwrap();
                locked_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(100));
            })
        };
        locked_rx.recv().unwrap();
        let (_, result) = transport.deliver_next(&receiver).unwrap();
        assert!(matches!(result, Ok(IntentOutcome::Opened(_))));
        holder.join().unwrap();

        let results = transport.deliver_all(&receiver);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(transport.pending(), 0);
        assert_eq!(receiver.executed_count(), 4);

        let engine = shared.lock().unwrap();
        assert_eq!(engine.open_position_count(), 8);
        assert_eq!(engine.pool().reserved_liquidity(), q(dec!(2400)));
        assert_solvent(&engine);
    }
}
