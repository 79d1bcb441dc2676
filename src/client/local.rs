use async_trait::async_trait;

use super::api::CartApi;
use super::error::CartError;
use crate::api::{AddToCartRequest, CartAck, CartView, CheckoutResponse, ErrorBody, OrderView, UpdateCartRequest};
use crate::domain::value_objects::CartIdentity;
use crate::service::{ServiceError, Storefront};

/// In-process cart API bound to one identity, for embedding the service
/// without HTTP.
#[derive(Clone)]
pub struct LocalCartApi {
    storefront: Storefront,
    identity: CartIdentity,
}

impl LocalCartApi {
    pub fn new(storefront: Storefront, identity: CartIdentity) -> Self {
        Self { storefront, identity }
    }

    pub fn identity(&self) -> &CartIdentity { &self.identity }
}

impl From<ServiceError> for CartError {
    fn from(error: ServiceError) -> Self {
        if let ServiceError::Store(source) = &error {
            tracing::error!(error = %source, "storefront storage failed");
            return CartError::Server { status: 500, detail: "Internal server error".into() };
        }
        CartError::from_error_body(ErrorBody { code: error.code(), detail: error.to_string() })
    }
}

#[async_trait]
impl CartApi for LocalCartApi {
    async fn get_cart(&self) -> Result<CartView, CartError> {
        Ok(self.storefront.cart(&self.identity).await?)
    }

    async fn add_item(&self, request: &AddToCartRequest) -> Result<CartAck, CartError> {
        Ok(self.storefront.add_item(&self.identity, request.clone()).await?)
    }

    async fn update_quantity(&self, request: &UpdateCartRequest) -> Result<CartAck, CartError> {
        Ok(self.storefront.update_quantity(&self.identity, request.clone()).await?)
    }

    async fn remove_item(&self, product_id: &str) -> Result<CartAck, CartError> {
        Ok(self.storefront.remove_item(&self.identity, product_id).await?)
    }

    async fn clear_cart(&self) -> Result<CartAck, CartError> {
        Ok(self.storefront.clear_cart(&self.identity).await?)
    }

    async fn checkout(&self) -> Result<CheckoutResponse, CartError> {
        Ok(self.storefront.checkout(&self.identity).await?)
    }

    async fn orders(&self) -> Result<Vec<OrderView>, CartError> {
        Ok(self.storefront.orders(&self.identity).await?)
    }
}
