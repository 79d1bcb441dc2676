//! Backend collaborators of the cart store.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::CartError;
use super::session::{Scope, SessionProvider};
use crate::api::{
    AddToCartRequest, AuthResponse, CartAck, CartView, CheckoutResponse, ErrorBody, LoginRequest, OrderView,
    ProductView, RegisterRequest, UpdateCartRequest, UserProfile, SESSION_HEADER,
};
use crate::config::ClientConfig;

/// Cart endpoints, scoped to whichever identity the implementation carries.
#[async_trait]
pub trait CartApi: Send + Sync {
    async fn get_cart(&self) -> Result<CartView, CartError>;
    async fn add_item(&self, request: &AddToCartRequest) -> Result<CartAck, CartError>;
    async fn update_quantity(&self, request: &UpdateCartRequest) -> Result<CartAck, CartError>;
    async fn remove_item(&self, product_id: &str) -> Result<CartAck, CartError>;
    async fn clear_cart(&self) -> Result<CartAck, CartError>;
    async fn checkout(&self) -> Result<CheckoutResponse, CartError>;
    async fn orders(&self) -> Result<Vec<OrderView>, CartError>;
}

#[async_trait]
impl<T: CartApi + ?Sized> CartApi for Arc<T> {
    async fn get_cart(&self) -> Result<CartView, CartError> { (**self).get_cart().await }
    async fn add_item(&self, request: &AddToCartRequest) -> Result<CartAck, CartError> { (**self).add_item(request).await }
    async fn update_quantity(&self, request: &UpdateCartRequest) -> Result<CartAck, CartError> {
        (**self).update_quantity(request).await
    }
    async fn remove_item(&self, product_id: &str) -> Result<CartAck, CartError> { (**self).remove_item(product_id).await }
    async fn clear_cart(&self) -> Result<CartAck, CartError> { (**self).clear_cart().await }
    async fn checkout(&self) -> Result<CheckoutResponse, CartError> { (**self).checkout().await }
    async fn orders(&self) -> Result<Vec<OrderView>, CartError> { (**self).orders().await }
}

/// HTTP client for the storefront service.
#[derive(Clone)]
pub struct StorefrontClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionProvider>,
}

impl StorefrontClient {
    pub fn new(config: &ClientConfig, session: Arc<SessionProvider>) -> Result<Self, CartError> {
        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| CartError::Validation(format!("invalid storefront url {:?}", config.base_url)))?;
        let http = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, base_url, session })
    }

    pub fn session(&self) -> &Arc<SessionProvider> { &self.session }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// A request carrying the active identity.
    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.http.request(method, self.url(segments));
        match self.session.scope() {
            Scope::Authenticated(token) => builder.bearer_auth(token),
            Scope::Anonymous(session) => builder.header(SESSION_HEADER, session.as_str()),
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, CartError> {
        let response = check(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        body: &B,
    ) -> Result<T, CartError> {
        self.send(builder.json(body)).await
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    pub async fn products(&self) -> Result<Vec<ProductView>, CartError> {
        self.send(self.http.get(self.url(&["api", "products"]))).await
    }

    pub async fn product(&self, id: &str) -> Result<ProductView, CartError> {
        self.send(self.http.get(self.url(&["api", "products", id]))).await
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    /// Registers and signs in; the anonymous cart is folded into the new account.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, CartError> {
        let builder = self.anonymous_request(&["api", "auth", "register"]);
        let auth: AuthResponse = self.send_json(builder, request).await?;
        self.session.store_login(&auth)?;
        Ok(auth)
    }

    /// Signs in; the anonymous cart is folded into the user's cart.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, CartError> {
        let request = LoginRequest { email: email.to_string(), password: password.to_string() };
        let builder = self.anonymous_request(&["api", "auth", "login"]);
        let auth: AuthResponse = self.send_json(builder, &request).await?;
        self.session.store_login(&auth)?;
        Ok(auth)
    }

    fn anonymous_request(&self, segments: &[&str]) -> RequestBuilder {
        let session = self.session.get_or_create_anonymous_id();
        self.http.post(self.url(segments)).header(SESSION_HEADER, session.as_str())
    }

    pub async fn me(&self) -> Result<UserProfile, CartError> {
        let token = self.session.auth_token().ok_or_else(|| CartError::Unauthorized("Not signed in".into()))?;
        self.send(self.http.get(self.url(&["api", "auth", "me"])).bearer_auth(token)).await
    }

    /// Revokes the token server-side and always forgets it locally.
    pub async fn logout(&self) -> Result<(), CartError> {
        let Some(token) = self.session.auth_token() else { return Ok(()) };
        let result = self.http.post(self.url(&["api", "auth", "logout"])).bearer_auth(token).send().await;
        self.session.clear_login()?;
        match result {
            Ok(response) => check(response).await.map(|_| ()).or_else(|error| match error {
                CartError::Unauthorized(_) => Ok(()),
                other => Err(other),
            }),
            Err(error) => {
                tracing::warn!(%error, "logout request failed, credentials dropped locally");
                Ok(())
            }
        }
    }

    /// Re-validates a stored token, dropping it when the server no longer accepts it.
    pub async fn restore_session(&self) -> Result<Option<UserProfile>, CartError> {
        if self.session.auth_token().is_none() {
            return Ok(None);
        }
        match self.me().await {
            Ok(user) => Ok(Some(user)),
            Err(CartError::Unauthorized(_)) => {
                tracing::info!("stored token rejected, continuing anonymously");
                self.session.clear_login()?;
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }
}

#[async_trait]
impl CartApi for StorefrontClient {
    async fn get_cart(&self) -> Result<CartView, CartError> {
        self.send(self.request(Method::GET, &["api", "cart"])).await
    }

    async fn add_item(&self, request: &AddToCartRequest) -> Result<CartAck, CartError> {
        self.send_json(self.request(Method::POST, &["api", "cart", "add"]), request).await
    }

    async fn update_quantity(&self, request: &UpdateCartRequest) -> Result<CartAck, CartError> {
        self.send_json(self.request(Method::PUT, &["api", "cart", "update"]), request).await
    }

    async fn remove_item(&self, product_id: &str) -> Result<CartAck, CartError> {
        self.send(self.request(Method::DELETE, &["api", "cart", "remove", product_id])).await
    }

    async fn clear_cart(&self) -> Result<CartAck, CartError> {
        self.send(self.request(Method::DELETE, &["api", "cart", "clear"])).await
    }

    async fn checkout(&self) -> Result<CheckoutResponse, CartError> {
        self.send(self.request(Method::POST, &["api", "cart", "checkout"])).await
    }

    async fn orders(&self) -> Result<Vec<OrderView>, CartError> {
        self.send(self.request(Method::GET, &["api", "cart", "orders"])).await
    }
}

/// Turns a non-success response into the matching error.
async fn check(response: Response) -> Result<Response, CartError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => Err(CartError::from_error_body(body)),
        Err(_) => {
            tracing::debug!(%status, body = %text, "error response without an error body");
            Err(CartError::from_status(status, text))
        }
    }
}
