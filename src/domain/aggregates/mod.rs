//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod user;

pub use product::{Product, ProductError, ProductStatus};
pub use order::{Order, OrderError, OrderItem, OrderStatus};
pub use cart::{Cart, CartError, CartLine};
pub use user::User;
