//! Aggregates module
pub mod category;
pub mod order;
pub mod product;
pub mod user;
pub mod wishlist;

pub use category::{Category, CategorySummary};
pub use order::{NewOrder, NewOrderItem, Order, OrderError, OrderItem, OrderStatus, OrderTotals, PaymentStatus, ShippingAddress};
pub use product::{ContentBlock, Product, ProductDraft, ProductError};
pub use user::{Role, User, UserError};
pub use wishlist::{WishlistEntry, WishlistItem};
