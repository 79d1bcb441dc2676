//! Postgres store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgConnection, Row};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::{withdraw_stock, CartFingerprint, CartMutation, StoreError, StorefrontStore};
use crate::domain::aggregates::{Cart, CartLine, Order, OrderItem, OrderStatus, Product, ProductStatus, User};
use crate::domain::value_objects::{CartIdentity, Money, ProductId, UserId};

const PRODUCT_COLUMNS: &str = "id, name, subtitle, price, status, image, description, category, in_stock, featured, stock_quantity, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and applies pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

fn corrupt(field: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{field}: {err}"))
}

fn to_u32(field: &str, value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|e| corrupt(field, e))
}

fn to_i32(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|e| corrupt("quantity", e))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id = ProductId::new(row.try_get::<String, _>("id")?).map_err(|e| corrupt("products.id", e))?;
    let status: ProductStatus = row.try_get::<String, _>("status")?.parse().map_err(|e| corrupt("products.status", e))?;
    let product = Product::create(id, row.try_get::<String, _>("name")?, Money::new(row.try_get::<Decimal, _>("price")?))
        .with_subtitle(row.try_get::<String, _>("subtitle")?)
        .with_image(row.try_get::<String, _>("image")?)
        .with_description(row.try_get::<String, _>("description")?)
        .with_category(row.try_get::<String, _>("category")?)
        .featured(row.try_get("featured")?)
        .with_stock_quantity(to_u32("products.stock_quantity", row.try_get("stock_quantity")?)?)
        .with_availability(status, row.try_get("in_stock")?)
        .with_timestamps(row.try_get("created_at")?, row.try_get("updated_at")?);
    Ok(product)
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Serializes all writers of one cart for the rest of the transaction.
async fn lock_owner(conn: &mut PgConnection, owner: &CartIdentity) -> Result<(), StoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(owner.storage_key())
        .execute(conn)
        .await?;
    Ok(())
}

async fn read_cart(conn: &mut PgConnection, owner: &CartIdentity) -> Result<Cart, StoreError> {
    let rows = sqlx::query("SELECT product_id, quantity, added_at, updated_at FROM cart_items WHERE owner = $1")
        .bind(owner.storage_key())
        .fetch_all(conn)
        .await?;
    let mut lines = BTreeMap::new();
    let mut updated_at: Option<DateTime<Utc>> = None;
    for row in &rows {
        let product_id = ProductId::new(row.try_get::<String, _>("product_id")?).map_err(|e| corrupt("cart_items.product_id", e))?;
        let line_updated: DateTime<Utc> = row.try_get("updated_at")?;
        updated_at = Some(updated_at.map_or(line_updated, |u| u.max(line_updated)));
        lines.insert(product_id, CartLine {
            quantity: to_u32("cart_items.quantity", row.try_get("quantity")?)?,
            added_at: row.try_get("added_at")?,
        });
    }
    Ok(Cart::restore(owner.clone(), lines, updated_at.unwrap_or_else(Utc::now)))
}

async fn write_cart(conn: &mut PgConnection, cart: &Cart) -> Result<(), StoreError> {
    let owner = cart.owner().storage_key();
    sqlx::query("DELETE FROM cart_items WHERE owner = $1").bind(&owner).execute(&mut *conn).await?;
    for (product_id, line) in cart.lines() {
        sqlx::query("INSERT INTO cart_items (owner, product_id, quantity, added_at, updated_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(&owner)
            .bind(product_id.as_str())
            .bind(to_i32(line.quantity)?)
            .bind(line.added_at)
            .bind(cart.updated_at())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl StorefrontStore for PgStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn upsert_product(&self, p: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO products (id, name, subtitle, price, status, image, description, category, in_stock, featured, stock_quantity, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (id) DO UPDATE SET name = $2, subtitle = $3, price = $4, status = $5, image = $6, description = $7, \
             category = $8, in_stock = $9, featured = $10, stock_quantity = $11, updated_at = $13",
        )
        .bind(p.id().as_str()).bind(p.name()).bind(p.subtitle()).bind(p.price().amount()).bind(p.status().as_str())
        .bind(p.image()).bind(p.description()).bind(p.category()).bind(p.is_available()).bind(p.is_featured())
        .bind(to_i32(p.stock_quantity())?).bind(p.created_at()).bind(p.updated_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_cart(&self, owner: &CartIdentity) -> Result<Cart, StoreError> {
        let mut conn = self.pool.acquire().await?;
        read_cart(&mut conn, owner).await
    }

    async fn update_cart(&self, owner: &CartIdentity, mutation: CartMutation) -> Result<Cart, StoreError> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, owner).await?;
        let mut cart = read_cart(&mut tx, owner).await?;
        mutation(&mut cart)?;
        write_cart(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn merge_carts(&self, from: &CartIdentity, into: &CartIdentity) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut owners = [from, into];
        owners.sort_by_key(|o| o.storage_key());
        for owner in owners { lock_owner(&mut tx, owner).await?; }

        let mut source = read_cart(&mut tx, from).await?;
        if source.is_empty() { return Ok(0); }
        let mut target = read_cart(&mut tx, into).await?;
        target.absorb(&source);
        let moved = source.line_count();
        source.clear();
        write_cart(&mut tx, &target).await?;
        write_cart(&mut tx, &source).await?;
        tx.commit().await?;
        Ok(moved)
    }

    async fn commit_order(&self, order: &Order, expected: &CartFingerprint) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, order.owner()).await?;
        let mut cart = read_cart(&mut tx, order.owner()).await?;
        if &cart.fingerprint() != expected {
            return Err(StoreError::Conflict("cart changed during checkout".into()));
        }

        // Items follow cart line order, so concurrent checkouts lock products in the same order.
        for item in order.items() {
            let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"))
                .bind(item.product_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
            let mut product = row
                .as_ref()
                .map(product_from_row)
                .transpose()?
                .ok_or_else(|| StoreError::Stock(format!("Product {} is no longer available", item.product_id)))?;
            withdraw_stock(&mut product, item.quantity)?;
            sqlx::query("UPDATE products SET stock_quantity = $2, in_stock = $3, updated_at = $4 WHERE id = $1")
                .bind(product.id().as_str())
                .bind(to_i32(product.stock_quantity())?)
                .bind(product.is_available())
                .bind(product.updated_at())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("INSERT INTO orders (id, owner, total, status, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(order.id())
            .bind(order.owner().storage_key())
            .bind(order.total().amount())
            .bind(order.status().as_str())
            .bind(order.created_at())
            .execute(&mut *tx)
            .await?;
        for (position, item) in order.items().iter().enumerate() {
            let position = i32::try_from(position).map_err(|e| corrupt("order_items.position", e))?;
            sqlx::query("INSERT INTO order_items (order_id, position, product_id, name, image, unit_price, quantity) VALUES ($1, $2, $3, $4, $5, $6, $7)")
                .bind(order.id())
                .bind(position)
                .bind(item.product_id.as_str())
                .bind(&item.name)
                .bind(&item.image)
                .bind(item.unit_price.amount())
                .bind(to_i32(item.quantity)?)
                .execute(&mut *tx)
                .await?;
        }

        cart.clear();
        write_cart(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_orders(&self, owner: &CartIdentity, limit: usize) -> Result<Vec<Order>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query("SELECT id, total, status, created_at FROM orders WHERE owner = $1 ORDER BY created_at DESC, id DESC LIMIT $2")
            .bind(owner.storage_key())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.try_get("id")).collect::<Result<_, _>>()?;

        let item_rows = sqlx::query("SELECT order_id, product_id, name, image, unit_price, quantity FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            items.entry(row.try_get("order_id")?).or_default().push(OrderItem {
                product_id: ProductId::new(row.try_get::<String, _>("product_id")?).map_err(|e| corrupt("order_items.product_id", e))?,
                name: row.try_get("name")?,
                image: row.try_get("image")?,
                unit_price: Money::new(row.try_get("unit_price")?),
                quantity: to_u32("order_items.quantity", row.try_get("quantity")?)?,
            });
        }

        rows.iter()
            .map(|row| -> Result<Order, StoreError> {
                let id: Uuid = row.try_get("id")?;
                let status: OrderStatus = row.try_get::<String, _>("status")?.parse().map_err(|e| corrupt("orders.status", e))?;
                Ok(Order::restore(
                    id,
                    owner.clone(),
                    items.remove(&id).unwrap_or_default(),
                    Money::new(row.try_get("total")?),
                    status,
                    row.try_get("created_at")?,
                ))
            })
            .collect()
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO users (id, username, email, password_hash, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(user.id.as_uuid())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = $1").bind(username).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1").bind(id.as_uuid()).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_token(&self, token_hash: &str, user: UserId) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO auth_tokens (token_hash, user_id, created_at) VALUES ($1, $2, NOW())")
            .bind(token_hash)
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn resolve_token(&self, token_hash: &str) -> Result<Option<UserId>, StoreError> {
        let row = sqlx::query("SELECT user_id FROM auth_tokens WHERE token_hash = $1 AND revoked_at IS NULL")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get::<Uuid, _>("user_id")).transpose()?.map(UserId::from_uuid))
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE auth_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
