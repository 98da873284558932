//! End-to-end cart flow through the storefront router.
//!
//! Each test gets a fresh storefront over in-memory stores and behaves like
//! one browser session: view the cart to pick up the CSRF token, mutate,
//! follow the redirect.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;

use cartflow_core::Cart;
use cartflow_integration_tests::{TOTE, TestContext, messages, quantity_in, tote};
use cartflow_storefront::services::BuystepHooks;

#[tokio::test]
async fn test_health() {
    let mut ctx = TestContext::new();
    let response = ctx.send(Method::GET, "/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"ok");

    let response = ctx.send(Method::GET, "/health/ready").await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let mut ctx = TestContext::new();
    let response = ctx.send(Method::GET, "/health").await;
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_empty_cart_view() {
    let mut ctx = TestContext::new();
    let page = ctx.view().await;

    assert_eq!(page["state"], "empty");
    assert_eq!(page["cart"]["items"].as_array().unwrap().len(), 0);
    assert_eq!(page["totals"]["quantity"], 0);
    assert!(!page["csrf_token"].as_str().unwrap().is_empty());
    assert!(ctx.store.is_empty().await);
}

#[tokio::test]
async fn test_mutation_without_csrf_token_is_forbidden() {
    let mut ctx = TestContext::new();

    let response = ctx.operate("up", "10").await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    ctx.view().await;
    ctx.set_csrf_token(Some("not-the-token"));
    let response = ctx.operate("up", "10").await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    ctx.set_csrf_token(None);
    let response = ctx.buystep().await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_csrf_token_accepted_from_query() {
    let mut ctx = TestContext::new();
    let token = ctx.view().await["csrf_token"].as_str().unwrap().to_string();
    ctx.set_csrf_token(None);

    let response = ctx
        .send(Method::PUT, &format!("/cart/up/10?_token={token}"))
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(quantity_in(&ctx.view().await, TOTE), 1);
}

#[tokio::test]
async fn test_increment_on_empty_cart() {
    let mut ctx = TestContext::new();
    ctx.view().await;

    let response = ctx.operate("up", "10").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/cart"));

    let page = ctx.view().await;
    assert_eq!(quantity_in(&page, TOTE), 1);
    assert_eq!(page["state"], "valid");
    assert!(messages(&page, "errors").is_empty());
    assert!(messages(&page, "warnings").is_empty());
}

#[tokio::test]
async fn test_decrement_to_zero_removes_line() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    ctx.operate("up", "10").await;
    ctx.operate("up", "10").await;

    ctx.operate("down", "10").await;
    assert_eq!(quantity_in(&ctx.view().await, TOTE), 1);

    ctx.operate("down", "10").await;
    let page = ctx.view().await;
    assert_eq!(quantity_in(&page, TOTE), 0);
    assert_eq!(page["state"], "empty");
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    ctx.operate("up", "10").await;

    for _ in 0..2 {
        let response = ctx.operate("remove", "10").await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
    }
    assert_eq!(quantity_in(&ctx.view().await, TOTE), 0);
}

#[tokio::test]
async fn test_discontinued_item_resets_cart() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    ctx.operate("up", "10").await;
    ctx.catalog.upsert(tote().discontinued()).await;

    let response = ctx.send(Method::GET, "/cart").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/cart"));

    let page = ctx.view().await;
    assert_eq!(page["state"], "empty");
    let errors = messages(&page, "errors");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("discontinued"));

    // Flash is shown once.
    assert!(messages(&ctx.view().await, "errors").is_empty());
}

#[tokio::test]
async fn test_low_stock_warns_and_keeps_quantity() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    for _ in 0..3 {
        ctx.operate("up", "10").await;
    }
    ctx.catalog.upsert(tote().with_stock(1)).await;

    let page = ctx.view().await;
    assert_eq!(page["state"], "valid");
    assert_eq!(quantity_in(&page, TOTE), 3);
    let warnings = messages(&page, "warnings");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("Only 1"));
}

#[tokio::test]
async fn test_unknown_product_redirects_without_change() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    ctx.operate("up", "10").await;

    let response = ctx.operate("up", "99").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/cart"));

    let page = ctx.view().await;
    assert_eq!(quantity_in(&page, TOTE), 1);
    assert_eq!(page["cart"]["items"].as_array().unwrap().len(), 1);
    assert!(messages(&page, "errors").is_empty());
}

#[tokio::test]
async fn test_invalid_route_parameters_are_not_found() {
    let mut ctx = TestContext::new();
    ctx.view().await;

    for (operation, id) in [("double", "10"), ("up", "abc"), ("up", "0"), ("up", "-1")] {
        let response = ctx.operate(operation, id).await;
        assert_eq!(
            response.status,
            StatusCode::NOT_FOUND,
            "{operation}/{id} should not match"
        );
    }
}

#[tokio::test]
async fn test_price_change_is_reported_once() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    ctx.operate("up", "10").await;
    ctx.view().await;

    let mut repriced = tote();
    repriced.price.amount = rust_decimal::Decimal::from(25);
    ctx.catalog.upsert(repriced).await;

    let warnings = messages(&ctx.view().await, "warnings");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("changed from $20.00 to $25.00"));

    assert!(messages(&ctx.view().await, "warnings").is_empty());
}

#[tokio::test]
async fn test_free_delivery_totals() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    ctx.operate("up", "10").await;

    let page = ctx.view().await;
    assert_eq!(page["totals"]["quantity"], 1);
    assert_eq!(page["totals"]["is_delivery_free"], false);

    for _ in 0..2 {
        ctx.operate("up", "10").await;
    }
    let page = ctx.view().await;
    assert_eq!(page["totals"]["quantity"], 3);
    assert_eq!(page["totals"]["is_delivery_free"], true);
}

#[tokio::test]
async fn test_buystep_locks_cart_and_redirects_to_checkout() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    ctx.operate("up", "10").await;

    let response = ctx.buystep().await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/shopping"));

    let response = ctx.operate("up", "10").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);

    let page = ctx.view().await;
    assert_eq!(page["state"], "locked");
    assert_eq!(quantity_in(&page, TOTE), 1);
    assert_eq!(messages(&page, "errors").len(), 1);
}

#[tokio::test]
async fn test_mutation_after_checkout_is_refused_with_message() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    ctx.operate("up", "10").await;
    ctx.buystep().await;

    let response = ctx.operate("up", "10").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/cart"));

    let page = ctx.view().await;
    assert_eq!(quantity_in(&page, TOTE), 1);
    assert_eq!(
        messages(&page, "errors"),
        vec!["Your cart is being checked out and can no longer be changed."]
    );
}

#[tokio::test]
async fn test_buystep_with_discontinued_item_resets_instead_of_locking() {
    let fired = Arc::new(AtomicBool::new(false));
    let (before, after) = (fired.clone(), fired.clone());
    let hooks = BuystepHooks::new()
        .on_before_lock(move |_| before.store(true, Ordering::SeqCst))
        .on_after_lock(move |_| {
            after.store(true, Ordering::SeqCst);
            None
        });
    let mut ctx = TestContext::with_hooks(hooks);
    ctx.view().await;
    ctx.operate("up", "10").await;
    ctx.catalog.upsert(tote().discontinued()).await;

    let response = ctx.buystep().await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/cart"));
    assert!(!fired.load(Ordering::SeqCst));

    let page = ctx.view().await;
    assert_eq!(page["state"], "empty");
    let errors = messages(&page, "errors");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("discontinued"));
}

#[tokio::test]
async fn test_buystep_on_empty_cart_returns_to_cart() {
    let mut ctx = TestContext::new();
    ctx.view().await;

    let response = ctx.buystep().await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/cart"));

    let page = ctx.view().await;
    assert_eq!(page["state"], "empty");
    assert_eq!(messages(&page, "errors"), vec!["Your cart is empty."]);
}

#[tokio::test]
async fn test_buystep_hook_response_is_returned_verbatim() {
    let hooks = BuystepHooks::new()
        .on_after_lock(|hook| {
            assert!(hook.cart.is_locked());
            None
        })
        .on_after_lock(|_| Some((StatusCode::ACCEPTED, "express").into_response()));
    let mut ctx = TestContext::with_hooks(hooks);
    ctx.view().await;
    ctx.operate("up", "10").await;

    let response = ctx.buystep().await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(&response.body[..], b"express");
    assert_eq!(ctx.view().await["state"], "locked");
}

#[tokio::test]
async fn test_buystep_hook_declining_falls_through_to_checkout() {
    let hooks = BuystepHooks::new().on_after_lock(|hook| {
        hook.headers
            .contains_key("x-express-checkout")
            .then(|| StatusCode::ACCEPTED.into_response())
    });
    let mut ctx = TestContext::with_hooks(hooks);
    ctx.view().await;
    ctx.operate("up", "10").await;

    let response = ctx.buystep().await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/shopping"));
}

#[tokio::test]
async fn test_catalog_outage_is_service_unavailable() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    ctx.operate("up", "10").await;
    ctx.catalog.set_unavailable(true).await;

    let response = ctx.send(Method::GET, "/cart").await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);

    ctx.catalog.set_unavailable(false).await;
    assert_eq!(quantity_in(&ctx.view().await, TOTE), 1);
}

#[tokio::test]
async fn test_concurrent_change_is_reported_not_overwritten() {
    let mut ctx = TestContext::new();
    ctx.view().await;
    ctx.operate("up", "10").await;

    ctx.interleaving
        .interleave_next_save(Cart::from_items([(TOTE, 5)]))
        .await;
    let response = ctx.operate("up", "10").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/cart"));

    let page = ctx.view().await;
    assert_eq!(quantity_in(&page, TOTE), 5);
    assert_eq!(
        messages(&page, "errors"),
        vec!["Your cart was updated in another window. Please try again."]
    );
}
