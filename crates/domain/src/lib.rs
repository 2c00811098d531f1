//! Domain layer for the order-processing core.
//!
//! This crate provides:
//! - Product, Order and Warranty entities
//! - the Cart → Completed order state machine and [`CartService`]
//! - the [`InventoryLedger`] with per-product atomic reserve/release
//! - warranty validation and [`WarrantyService`]
//! - the discount lookup port consumed at checkout
//! - repository ports and an in-memory implementation

pub mod discount;
pub mod error;
pub mod inventory;
pub mod locks;
pub mod memory;
pub mod order;
pub mod product;
pub mod repository;
pub mod warranty;

pub use discount::{Discount, DiscountError, DiscountLookup, ParseDiscountsError, StaticDiscounts};
pub use error::DomainError;
pub use inventory::{InventoryError, InventoryLedger};
pub use locks::KeyedLocks;
pub use memory::InMemoryRepository;
pub use order::{CartService, Order, OrderError, OrderLine, OrderStatus, UnknownOrderStatus};
pub use product::Product;
pub use repository::{
    OrderRepository, ProductRepository, Repository, RepositoryError, RepositoryResult,
    StockChange, WarrantyRepository,
};
pub use warranty::{Warranty, WarrantyError, WarrantyService, validate as validate_warranty};
