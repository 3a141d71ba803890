mod common;

use anyhow::Result;
use common::{register_user, test_service};
use tradeledger::domain::TradeKind;

#[tokio::test]
async fn test_portfolio_prices_every_position() -> Result<()> {
    let (service, quotes, _temp) = test_service().await?;
    quotes.set("AAPL", "Apple Inc", 5000);
    quotes.set("NFLX", "Netflix Inc", 20_000);

    let session = register_user(&service, "alice").await?;
    let user_id = session.user.id;
    service.buy(user_id, "AAPL", 10).await?; // $500.00
    service.buy(user_id, "NFLX", 2).await?; // $400.00

    let view = service.portfolio(user_id).await?;
    assert_eq!(view.cash_cents, 1_000_000 - 90_000);
    assert_eq!(view.positions.len(), 2);

    let aapl = view.positions.iter().find(|p| p.symbol == "AAPL").unwrap();
    assert_eq!(aapl.name.as_deref(), Some("Apple Inc"));
    assert_eq!(aapl.unit_price_cents, Some(5000));
    assert_eq!(aapl.market_value_cents, Some(50_000));

    // Grand total = cash + all position values.
    assert_eq!(view.total_cents, Some(910_000 + 50_000 + 40_000));

    Ok(())
}

#[tokio::test]
async fn test_portfolio_reprices_at_current_quotes() -> Result<()> {
    let (service, quotes, _temp) = test_service().await?;
    quotes.set("AAPL", "Apple Inc", 5000);

    let session = register_user(&service, "alice").await?;
    service.buy(session.user.id, "AAPL", 10).await?;

    quotes.set("AAPL", "Apple Inc", 7500);
    let view = service.portfolio(session.user.id).await?;
    assert_eq!(view.positions[0].market_value_cents, Some(75_000));

    Ok(())
}

#[tokio::test]
async fn test_portfolio_surfaces_unavailable_quotes() -> Result<()> {
    let (service, quotes, _temp) = test_service().await?;
    quotes.set("AAPL", "Apple Inc", 5000);
    quotes.set("NFLX", "Netflix Inc", 20_000);

    let session = register_user(&service, "alice").await?;
    let user_id = session.user.id;
    service.buy(user_id, "AAPL", 10).await?;
    service.buy(user_id, "NFLX", 2).await?;

    quotes.fail("NFLX");
    let view = service.portfolio(user_id).await?;

    // The failed row is explicitly unpriced, not silently zero, and the
    // healthy row is still priced.
    let nflx = view.positions.iter().find(|p| p.symbol == "NFLX").unwrap();
    assert_eq!(nflx.shares, 2);
    assert_eq!(nflx.unit_price_cents, None);
    assert_eq!(nflx.market_value_cents, None);

    let aapl = view.positions.iter().find(|p| p.symbol == "AAPL").unwrap();
    assert_eq!(aapl.market_value_cents, Some(50_000));

    // No grand total can be reported with a hole in it.
    assert_eq!(view.total_cents, None);

    Ok(())
}

#[tokio::test]
async fn test_history_is_oldest_first_with_resolved_names() -> Result<()> {
    let (service, quotes, _temp) = test_service().await?;
    quotes.set("AAPL", "Apple Inc", 5000);

    let session = register_user(&service, "alice").await?;
    let user_id = session.user.id;

    service.buy(user_id, "AAPL", 10).await?;
    service.deposit(user_id, "25.00").await?;
    service.sell(user_id, "AAPL", 3).await?;

    let history = service.history(user_id).await?;
    assert_eq!(history.len(), 3);

    assert_eq!(history[0].entry.kind, TradeKind::Buy);
    assert_eq!(history[0].name.as_deref(), Some("Apple Inc"));

    assert_eq!(history[1].entry.kind, TradeKind::Deposit);
    assert_eq!(history[1].entry.symbol, "");
    assert_eq!(history[1].name, None);
    assert_eq!(history[1].entry.total_cents, 2500);

    assert_eq!(history[2].entry.kind, TradeKind::Sell);
    assert_eq!(history[2].entry.share_delta, -3);

    Ok(())
}

#[tokio::test]
async fn test_history_survives_provider_outage() -> Result<()> {
    let (service, quotes, _temp) = test_service().await?;
    quotes.set("AAPL", "Apple Inc", 5000);

    let session = register_user(&service, "alice").await?;
    service.buy(session.user.id, "AAPL", 1).await?;

    // The view still renders when names cannot be resolved.
    quotes.fail("AAPL");
    let history = service.history(session.user.id).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry.symbol, "AAPL");
    assert_eq!(history[0].name, None);

    Ok(())
}

#[tokio::test]
async fn test_views_are_per_user() -> Result<()> {
    let (service, quotes, _temp) = test_service().await?;
    quotes.set("AAPL", "Apple Inc", 5000);

    let alice = register_user(&service, "alice").await?;
    let bob = register_user(&service, "bob").await?;
    service.buy(alice.user.id, "AAPL", 10).await?;

    let view = service.portfolio(bob.user.id).await?;
    assert!(view.positions.is_empty());
    assert!(service.history(bob.user.id).await?.is_empty());

    Ok(())
}
