//! Integration test harness for Cartflow.
//!
//! Drives the real storefront router through `tower::ServiceExt::oneshot`
//! with in-memory cart, catalog and session stores, carrying the session
//! cookie and CSRF token between requests like a browser would.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartflow-integration-tests
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use cartflow_core::{Cart, CurrencyCode, Price, ProductClassId};
use cartflow_storefront::catalog::{CatalogEntry, InMemoryCatalog};
use cartflow_storefront::config::{CartConfig, StorefrontConfig};
use cartflow_storefront::middleware::CSRF_HEADER;
use cartflow_storefront::services::{BuystepHooks, CartService};
use cartflow_storefront::state::AppState;
use cartflow_storefront::store::{CartKey, CartStore, MemoryCartStore, StoreError, StoredCart};

/// Product class seeded into every test catalog.
pub const TOTE: ProductClassId = ProductClassId::new(10);

/// Free-delivery threshold used by the test configuration.
pub const FREE_DELIVERY_THRESHOLD: i64 = 50;

/// A tote bag priced at 20 USD, unlimited stock.
#[must_use]
pub fn tote() -> CatalogEntry {
    CatalogEntry::new(
        TOTE,
        "Canvas Tote",
        Price::new(Decimal::from(20), CurrencyCode::USD),
    )
}

/// Storefront configuration that never touches the environment.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        cart: CartConfig {
            free_delivery_threshold: Some(Decimal::from(FREE_DELIVERY_THRESHOLD)),
            ..CartConfig::default()
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Cart store that can slip another writer's save in ahead of the next one.
///
/// Simulates a second request from the same session that read and saved
/// the cart while the first was still recalculating.
#[derive(Debug)]
pub struct InterleavingCartStore {
    inner: Arc<MemoryCartStore>,
    pending: Mutex<Option<Cart>>,
}

impl InterleavingCartStore {
    #[must_use]
    pub fn new(inner: Arc<MemoryCartStore>) -> Self {
        Self {
            inner,
            pending: Mutex::new(None),
        }
    }

    /// Save `cart` just before the next save goes through.
    pub async fn interleave_next_save(&self, cart: Cart) {
        *self.pending.lock().await = Some(cart);
    }
}

#[async_trait]
impl CartStore for InterleavingCartStore {
    async fn get_cart(&self, key: CartKey) -> Result<StoredCart, StoreError> {
        self.inner.get_cart(key).await
    }

    async fn save(&self, key: CartKey, cart: &StoredCart) -> Result<StoredCart, StoreError> {
        let pending = self.pending.lock().await.take();
        if let Some(other) = pending {
            let current = self.inner.get_cart(key).await?;
            self.inner
                .save(key, &StoredCart::new(other, current.version))
                .await?;
        }
        self.inner.save(key, cart).await
    }

    async fn clear(&self, key: CartKey) -> Result<StoredCart, StoreError> {
        self.inner.clear(key).await
    }

    async fn lock(&self, key: CartKey) -> Result<StoredCart, StoreError> {
        self.inner.lock(key).await
    }
}

/// A response with its body already collected.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// `Location` header of a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// Body parsed as JSON, or `Value::Null` if it is not JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

/// One browser session against a fresh storefront.
pub struct TestContext {
    pub app: Router,
    pub catalog: Arc<InMemoryCatalog>,
    pub store: Arc<MemoryCartStore>,
    /// Wraps `store`; the cart service writes through it.
    pub interleaving: Arc<InterleavingCartStore>,
    cookie: Option<String>,
    csrf_token: Option<String>,
}

impl TestContext {
    /// Storefront with the tote in the catalog and no hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hooks(BuystepHooks::new())
    }

    /// Storefront with the given checkout hooks.
    #[must_use]
    pub fn with_hooks(hooks: BuystepHooks) -> Self {
        let catalog = Arc::new(InMemoryCatalog::new([tote()]));
        let store = Arc::new(MemoryCartStore::new());
        let interleaving = Arc::new(InterleavingCartStore::new(store.clone()));
        let cart = CartService::new(interleaving.clone(), catalog.clone()).with_hooks(hooks);
        let state = AppState::new(test_config(), cart);

        Self {
            app: cartflow_storefront::app(state, MemoryStore::default()),
            catalog,
            store,
            interleaving,
            cookie: None,
            csrf_token: None,
        }
    }

    /// Send a request with the session cookie and CSRF header attached.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(&mut self, method: Method, uri: &str) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(token) = &self.csrf_token {
            builder = builder.header(CSRF_HEADER, token);
        }
        let request = builder.body(Body::empty()).expect("valid request");

        let response = match self.app.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        if let Some(pair) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
        {
            self.cookie = Some(pair.to_string());
        }

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .expect("readable body");

        TestResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    /// `GET /cart`, remembering the CSRF token from the payload.
    ///
    /// # Panics
    ///
    /// Panics if the cart page is not a JSON 200.
    pub async fn view(&mut self) -> Value {
        let response = self.send(Method::GET, "/cart").await;
        assert_eq!(response.status, StatusCode::OK, "cart view failed");

        let page = response.json();
        if let Some(token) = page.get("csrf_token").and_then(Value::as_str) {
            self.csrf_token = Some(token.to_string());
        }
        page
    }

    /// `PUT /cart/{operation}/{id}`.
    pub async fn operate(&mut self, operation: &str, id: &str) -> TestResponse {
        self.send(Method::PUT, &format!("/cart/{operation}/{id}")).await
    }

    /// `POST /cart/buystep`.
    pub async fn buystep(&mut self) -> TestResponse {
        self.send(Method::POST, "/cart/buystep").await
    }

    /// Replace the CSRF token sent with subsequent requests.
    pub fn set_csrf_token(&mut self, token: Option<&str>) {
        self.csrf_token = token.map(String::from);
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Quantity of `id` in a cart page, 0 if absent.
#[must_use]
pub fn quantity_in(page: &Value, id: ProductClassId) -> u64 {
    page["cart"]["items"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|item| item["product_class_id"].as_i64() == Some(i64::from(id.as_i32())))
        .and_then(|item| item["quantity"].as_u64())
        .unwrap_or(0)
}

/// Texts of `page.messages.{kind}`.
#[must_use]
pub fn messages(page: &Value, kind: &str) -> Vec<String> {
    page["messages"][kind]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|m| m.as_str().map(String::from))
        .collect()
}
