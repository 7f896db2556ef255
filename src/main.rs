//! Perps relay simulation.
//!
//! Walks a single pool-backed market through its lifecycle: LP funding, direct
//! trades, intents relayed from another chain, keeper liquidation and a
//! redelivered message. The event log is dumped as JSON lines at the end.

use perps_relay::*;
use rust_decimal_macros::dec;
use std::error::Error;
use std::sync::Arc;

type SimResult<T = ()> = Result<T, Box<dyn Error>>;

fn main() -> SimResult {
    println!("Perps Relay Simulation");
    println!("Single Market, Pool Counterparty, Cross-Chain Intents\n");

    scenario_1_pool_and_direct_trade()?;
    scenario_2_relayed_open_and_close()?;
    scenario_3_rejected_intents()?;
    scenario_4_keeper_liquidation()?;
    let engine = scenario_5_redelivery()?;

    println!("Event log (JSON lines):");
    for event in engine.events() {
        println!("{}", event.to_json_line()?);
    }

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn lp() -> Address {
    Address::from_low_u64(0x11)
}

fn alice() -> Address {
    Address::from_low_u64(0x22)
}

fn keeper() -> Address {
    Address::from_low_u64(0x33)
}

// fresh market: pool holds 5000, alice holds 1000, ETH at 2000
fn seeded_engine(config: &VenueConfig) -> SimResult<Engine> {
    let mut oracle = MockPriceFeed::new("ETH/USD", Price::new_unchecked(dec!(2000)));
    let now = Timestamp::now();
    oracle.set_updated_at(now);
    let mut engine = Engine::from_config(config, oracle)?;
    engine.set_time(now);
    engine.mint(lp(), Quote::new(dec!(5000)))?;
    engine.mint(alice(), Quote::new(dec!(1000)))?;
    engine.deposit_liquidity(lp(), Quote::new(dec!(5000)))?;
    Ok(engine)
}

/// LP funds the pool, trader opens 2x long and closes into a 50% rally.
fn scenario_1_pool_and_direct_trade() -> SimResult {
    println!("Scenario 1: Pool Funding and Direct Trade\n");

    let mut engine = seeded_engine(&VenueConfig::default())?;
    println!(
        "  LP deposits 5,000 {}, holds {} shares at {} each",
        engine.token().symbol(),
        engine.pool().shares_of(lp()),
        engine.pool().share_price()
    );

    let pos = engine.open_position(alice(), Quote::new(dec!(100)), dec!(2), Side::Long)?;
    println!("  Alice opens 2x long: size ${} @ ${}", pos.size, pos.entry_price);
    println!(
        "  Pool reserved ${} of ${}\n",
        engine.pool().reserved_liquidity(),
        engine.pool().total_liquidity()
    );

    engine.oracle_mut().set_price(Price::new_unchecked(dec!(3000)));
    let outcome = engine.close_position(alice())?;
    println!("  ETH moves to $3,000, Alice closes");
    println!("  PnL ${}, paid out ${}", outcome.realized_pnl, outcome.payout);
    println!(
        "  Alice balance ${}, pool ${}, LP shares now worth {} each\n",
        engine.balance_of(alice()),
        engine.pool().total_liquidity(),
        engine.pool().share_price()
    );
    Ok(())
}

/// Same trade, but both legs arrive as intents from the source chain.
fn scenario_2_relayed_open_and_close() -> SimResult {
    println!("Scenario 2: Relayed Open and Close\n");

    let config = VenueConfig::default();
    let shared = seeded_engine(&config)?.into_shared();
    let mut sender = IntentSender::new(config.relay.sender.clone());
    let receiver = IntentReceiver::new(config.relay.receiver.clone(), shared.clone());
    let mut transport = InMemoryTransport::new(config.relay.receiver.router);

    let open = Intent::open(alice(), Quote::new(dec!(100)), dec!(2), Side::Long);
    let id = sender.send_intent(alice(), &open, &mut transport)?;
    println!("  Alice sends open intent from {}, message {:?}", config.relay.sender.source_chain, id);

    for (id, result) in transport.deliver_all(&receiver) {
        println!("  Delivered {:?} to {}: {:?}", id, config.relay.receiver.chain, result.map(|_| "ok"));
    }

    shared
        .lock()
        .map_err(|_| "engine lock poisoned")?
        .oracle_mut()
        .set_price(Price::new_unchecked(dec!(3000)));

    sender.send_intent(alice(), &Intent::close(alice()), &mut transport)?;
    if let Some((_, result)) = transport.deliver_next(&receiver) {
        if let IntentOutcome::Closed(outcome) = result? {
            println!("  Relayed close at ${}, paid out ${}", outcome.exit_price, outcome.payout);
        }
    }

    let engine = shared.lock().map_err(|_| "engine lock poisoned")?;
    println!(
        "  Alice balance ${}, intents executed: {}\n",
        engine.balance_of(alice()),
        receiver.executed_count()
    );
    Ok(())
}

/// Bad intents fail on the destination and the error comes back unchanged.
fn scenario_3_rejected_intents() -> SimResult {
    println!("Scenario 3: Rejected Intents\n");

    let config = VenueConfig::default();
    let shared = seeded_engine(&config)?.into_shared();
    let mut sender = IntentSender::new(config.relay.sender.clone());
    let receiver = IntentReceiver::new(config.relay.receiver.clone(), shared.clone());
    let mut transport = InMemoryTransport::new(config.relay.receiver.router);

    let intents = [
        Intent::open(alice(), Quote::new(dec!(100)), dec!(20), Side::Long),
        Intent::open(alice(), Quote::zero(), dec!(2), Side::Short),
        Intent::close(alice()),
    ];
    for intent in &intents {
        sender.send_intent(alice(), intent, &mut transport)?;
    }
    for (id, result) in transport.deliver_all(&receiver) {
        match result {
            Ok(_) => println!("  {:?}: executed", id),
            Err(e) => println!("  {:?}: {}", id, e),
        }
    }

    let stranger = Address::from_low_u64(0xbad);
    let forged = InboundMessage {
        message_id: MessageId(99),
        source_chain: config.relay.sender.source_chain,
        sender: config.relay.sender.address,
        receiver: config.relay.receiver.address,
        payload: Intent::close(alice()).encode()?,
    };
    if let Err(e) = receiver.receive_message(stranger, forged) {
        println!("  Direct call from {}: {}", stranger, e);
    }

    let engine = shared.lock().map_err(|_| "engine lock poisoned")?;
    println!(
        "  Open positions: {}, Alice balance ${}\n",
        engine.open_position_count(),
        engine.balance_of(alice())
    );
    Ok(())
}

/// 10x long goes under water and a keeper takes the reward.
fn scenario_4_keeper_liquidation() -> SimResult {
    println!("Scenario 4: Keeper Liquidation\n");

    let mut engine = seeded_engine(&VenueConfig::default())?;
    engine.open_position(alice(), Quote::new(dec!(100)), dec!(10), Side::Long)?;
    if let Some(price) = engine.liquidation_price(alice())? {
        println!("  Alice opens 10x long, liquidation price ${}", price);
    }

    for price in [dec!(1950), dec!(1920), dec!(1890)] {
        engine.oracle_mut().set_price(Price::new_unchecked(price));
        let health = engine.position_health(alice())?;
        println!(
            "  ETH ${}: margin ratio {:.4}, liquidatable: {}",
            price, health.margin_ratio, health.liquidatable
        );
    }

    for trader in engine.liquidatable_traders()? {
        let result = engine.liquidate(keeper(), trader)?;
        println!(
            "  Keeper liquidates {}: reward ${}, pool receives ${}",
            trader, result.reward, result.to_pool
        );
    }
    println!(
        "  Keeper balance ${}, pool ${}\n",
        engine.balance_of(keeper()),
        engine.pool().total_liquidity()
    );
    Ok(())
}

/// A flaky bridge delivers the same message twice. Dedup drops the second.
fn scenario_5_redelivery() -> SimResult<Engine> {
    println!("Scenario 5: Redelivery\n");

    let config = VenueConfig::default();
    let shared = seeded_engine(&config)?.into_shared();
    let mut sender = IntentSender::new(config.relay.sender.clone());
    let receiver = IntentReceiver::new(config.relay.receiver.clone(), shared.clone());
    let mut transport = InMemoryTransport::new(config.relay.receiver.router);

    let intent = Intent::open(alice(), Quote::new(dec!(100)), dec!(3), Side::Short);
    let id = sender.send_intent(alice(), &intent, &mut transport)?;
    transport.deliver(id, &receiver)??;
    println!("  First delivery of {:?} executed", id);

    match transport.redeliver(id, &receiver)? {
        Ok(_) => println!("  Second delivery executed"),
        Err(e) => println!("  Second delivery: {}", e),
    }

    drop(receiver);
    let engine = Arc::try_unwrap(shared)
        .map_err(|_| "engine still shared")?
        .into_inner()
        .map_err(|_| "engine lock poisoned")?;
    println!(
        "  Open positions: {}, events recorded: {}\n",
        engine.open_position_count(),
        engine.events().len()
    );
    Ok(engine)
}
