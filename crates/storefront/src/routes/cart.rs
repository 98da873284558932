//! Cart route handlers.
//!
//! The cart key lives in the session. Every handler recalculates the cart
//! before responding; mutations end in a redirect back to `/cart`, carrying
//! their messages in the session flash.

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use cartflow_core::{Cart, CartOperation, CartState, CartTotals, ProductClassId, RecalculationResult};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireCsrf, csrf_token};
use crate::models::{FlashMessages, session_keys};
use crate::services::{BuystepOutcome, CartError, Recalculated};
use crate::state::AppState;
use crate::store::CartKey;

/// Path the cart page lives at.
pub const CART_PATH: &str = "/cart";

/// JSON body of the cart page.
#[derive(Debug, Serialize)]
pub struct CartPage {
    pub cart: Cart,
    pub state: CartState,
    pub totals: CartTotals,
    pub messages: FlashMessages,
    pub csrf_token: String,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the session's cart key, creating one on first use.
async fn cart_key(session: &Session) -> Result<CartKey> {
    if let Some(key) = session.get::<CartKey>(session_keys::CART_KEY).await? {
        return Ok(key);
    }

    let key = CartKey::generate();
    session.insert(session_keys::CART_KEY, key).await?;
    Ok(key)
}

/// Take and clear the pending flash messages.
async fn take_flash(session: &Session) -> Result<FlashMessages> {
    Ok(session
        .remove::<FlashMessages>(session_keys::FLASH_MESSAGES)
        .await?
        .unwrap_or_default())
}

/// Append messages to the pending flash.
async fn push_flash(session: &Session, messages: FlashMessages) -> Result<()> {
    if messages.is_empty() {
        return Ok(());
    }

    let mut pending = session
        .get::<FlashMessages>(session_keys::FLASH_MESSAGES)
        .await?
        .unwrap_or_default();
    pending.extend(messages);
    session.insert(session_keys::FLASH_MESSAGES, pending).await?;
    Ok(())
}

fn redirect_to_cart() -> Response {
    Redirect::to(CART_PATH).into_response()
}

/// Turn a business failure into a flash and redirect; pass the rest through.
async fn recover(session: &Session, err: CartError) -> Result<Response> {
    match err {
        CartError::LookupUnavailable(e) => Err(e.into()),
        CartError::Store(e) => Err(e.into()),
        CartError::ItemNotFound(_)
        | CartError::Locked
        | CartError::Empty
        | CartError::Conflict => {
            if let Some(message) = err.user_message() {
                push_flash(
                    session,
                    FlashMessages {
                        errors: vec![message],
                        warnings: Vec::new(),
                    },
                )
                .await?;
            }
            Ok(redirect_to_cart())
        }
    }
}

fn parse_item_path(
    operation: &str,
    product_class_id: &str,
) -> Result<(CartOperation, ProductClassId)> {
    let operation = operation
        .parse::<CartOperation>()
        .map_err(|e| AppError::NotFound(e.to_string()))?;
    let product_class_id = product_class_id
        .parse::<ProductClassId>()
        .map_err(|e| AppError::NotFound(e.to_string()))?;
    Ok((operation, product_class_id))
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the recalculated cart.
///
/// Redirects back to itself after a reset so the errors show on a clean cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Response> {
    let key = cart_key(&session).await?;

    let (cart, warnings) = match state.cart().view(key).await {
        Ok(Recalculated::Kept { cart, warnings }) => (cart, warnings),
        Ok(Recalculated::Reset { errors }) => {
            push_flash(
                &session,
                FlashMessages {
                    errors,
                    warnings: Vec::new(),
                },
            )
            .await?;
            return Ok(redirect_to_cart());
        }
        Err(err) => return recover(&session, err).await,
    };

    let mut messages = take_flash(&session).await?;
    for warning in &warnings {
        if !messages.warnings.contains(warning) {
            messages.warnings.push(warning.clone());
        }
    }

    let result = RecalculationResult {
        errors: Vec::new(),
        warnings,
    };
    let config = &state.config().cart;
    let page = CartPage {
        state: CartState::evaluate(&cart, &result),
        totals: cart.totals(config.currency, config.free_delivery_threshold),
        cart,
        messages,
        csrf_token: csrf_token(&session).await?,
    };

    Ok(Json(page).into_response())
}

/// Increment, decrement or remove one cart line.
///
/// Unknown operations and malformed ids are 404s, as if the route did not
/// match.
#[instrument(skip(state, session, _csrf))]
pub async fn handle_item(
    State(state): State<AppState>,
    Path((operation, product_class_id)): Path<(String, String)>,
    _csrf: RequireCsrf,
    session: Session,
) -> Result<Response> {
    let (operation, product_class_id) = parse_item_path(&operation, &product_class_id)?;
    let key = cart_key(&session).await?;

    add_breadcrumb(
        "cart",
        "Cart item operation",
        Some(&[
            ("operation", operation.as_str()),
            ("product_class_id", &product_class_id.to_string()),
        ]),
    );

    match state
        .cart()
        .handle_item(key, product_class_id, operation)
        .await
    {
        Ok(Recalculated::Kept { warnings, .. }) => {
            push_flash(
                &session,
                FlashMessages {
                    errors: Vec::new(),
                    warnings,
                },
            )
            .await?;
            Ok(redirect_to_cart())
        }
        Ok(Recalculated::Reset { errors }) => {
            push_flash(
                &session,
                FlashMessages {
                    errors,
                    warnings: Vec::new(),
                },
            )
            .await?;
            Ok(redirect_to_cart())
        }
        Err(err) => recover(&session, err).await,
    }
}

/// Lock the cart and continue to checkout.
///
/// A cart that fails recalculation is reset instead and the user lands back
/// on `/cart` with the errors.
#[instrument(skip(state, session, headers, _csrf))]
pub async fn buystep(
    State(state): State<AppState>,
    _csrf: RequireCsrf,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    let key = cart_key(&session).await?;
    add_breadcrumb("cart", "Checkout started", None);

    match state.cart().buystep(key, &headers).await {
        Ok(BuystepOutcome::Checkout) => {
            Ok(Redirect::to(&state.config().cart.checkout_path).into_response())
        }
        Ok(BuystepOutcome::Override(response)) => Ok(response),
        Ok(BuystepOutcome::Reset { errors }) => {
            push_flash(
                &session,
                FlashMessages {
                    errors,
                    warnings: Vec::new(),
                },
            )
            .await?;
            Ok(redirect_to_cart())
        }
        Err(err) => recover(&session, err).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_path() {
        let (op, id) = parse_item_path("down", "42").unwrap();
        assert_eq!(op, CartOperation::Decrement);
        assert_eq!(id, ProductClassId::new(42));
    }

    #[test]
    fn test_parse_item_path_rejects_unknown_operation() {
        let err = parse_item_path("double", "42").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_parse_item_path_rejects_bad_ids() {
        for id in ["abc", "0", "-3", "+4"] {
            let err = parse_item_path("up", id).unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)), "id {id}");
        }
    }
}
