use std::collections::HashMap;

use async_trait::async_trait;
use common::{CustomerId, Money, OrderId, ProductId, WarrantyId};
use domain::{
    Order, OrderLine, OrderRepository, OrderStatus, Product, ProductRepository, RepositoryError,
    RepositoryResult, StockChange, Warranty, WarrantyRepository,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{Result, StoreError};

/// Name of the partial unique index allowing one cart per customer.
const ONE_CART_CONSTRAINT: &str = "one_cart_per_customer";

const ORDER_COLUMNS: &str = "id, customer_id, status, created_at, ordered_at";

/// PostgreSQL-backed implementation of the repository ports.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database with a small pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        let product = Product::new(
            ProductId::from_uuid(row.try_get("id")?),
            row.try_get::<String, _>("name")?,
            Money::new(row.try_get("unit_price")?),
            to_u32(row.try_get("stock")?, "stock")?,
            row.try_get::<String, _>("category")?,
            row.try_get::<String, _>("brand")?,
        );
        Ok(match row.try_get::<Option<String>, _>("description")? {
            Some(description) => product.with_description(description),
            None => product,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            order_id: OrderId::from_uuid(row.try_get("order_id")?),
            product_id: ProductId::from_uuid(row.try_get("product_id")?),
            quantity: to_u32(row.try_get("quantity")?, "quantity")?,
            unit_price: Money::new(row.try_get("unit_price")?),
            discount_percent: row.try_get("discount_percent")?,
        })
    }

    fn row_to_warranty(row: &PgRow) -> Result<Warranty> {
        let duration_months = row
            .try_get::<Option<i64>, _>("duration_months")?
            .map(|months| to_u32(months, "duration_months"))
            .transpose()?;

        Ok(Warranty {
            id: WarrantyId::from_uuid(row.try_get("id")?),
            order_id: row.try_get::<Option<Uuid>, _>("order_id")?.map(OrderId::from_uuid),
            product_id: row
                .try_get::<Option<Uuid>, _>("product_id")?
                .map(ProductId::from_uuid),
            duration_months,
            warranty_type: row.try_get("warranty_type")?,
            terms: row.try_get("terms")?,
            details: row.try_get("details")?,
        })
    }

    /// Builds orders from `orders` rows, fetching all their lines in one query.
    ///
    /// Preserves the order of `rows`.
    async fn assemble_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let line_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price, discount_percent
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in &line_rows {
            let line = Self::row_to_line(row)?;
            lines.entry(line.order_id.as_uuid()).or_default().push(line);
        }

        rows.iter()
            .map(|row| -> Result<Order> {
                let id: Uuid = row.try_get("id")?;
                let status: String = row.try_get("status")?;
                let status = status
                    .parse::<OrderStatus>()
                    .map_err(|e| StoreError::InvalidData(e.to_string()))?;

                Order::restore(
                    OrderId::from_uuid(id),
                    CustomerId::from_uuid(row.try_get("customer_id")?),
                    status,
                    lines.remove(&id).unwrap_or_default(),
                    row.try_get("created_at")?,
                    row.try_get("ordered_at")?,
                )
                .map_err(|e| StoreError::InvalidData(e.to_string()))
            })
            .collect()
    }

    async fn select_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, unit_price, stock, category, brand, description
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, unit_price, stock, category, brand, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                unit_price = EXCLUDED.unit_price,
                stock = EXCLUDED.stock,
                category = EXCLUDED.category,
                brand = EXCLUDED.brand,
                description = EXCLUDED.description
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(product.name())
        .bind(product.unit_price().amount())
        .bind(i64::from(product.stock()))
        .bind(product.category())
        .bind(product.brand())
        .bind(product.description())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Decrements stock only when enough remains, in a single statement.
    #[tracing::instrument(skip(self))]
    async fn decrement_stock(&self, product_id: ProductId, quantity: u32) -> Result<StockChange> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(StockChange::Taken {
                remaining: to_u32(remaining, "stock")?,
            });
        }

        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(match available {
            Some(available) => StockChange::Insufficient {
                available: to_u32(available, "stock")?,
            },
            None => StockChange::NotFound,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn increment_stock(&self, product_id: ProductId, quantity: u32) -> Result<Option<u32>> {
        let stock: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET stock = stock + $2 WHERE id = $1 RETURNING stock",
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        stock.map(|stock| to_u32(stock, "stock")).transpose()
    }

    async fn select_orders(&self, filter: &str, id: Uuid) -> Result<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {filter} ORDER BY created_at DESC");
        let rows = sqlx::query(&sql).bind(id).fetch_all(&self.pool).await?;
        self.assemble_orders(rows).await
    }

    /// Writes the order row and replaces its lines in one transaction.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn write_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, status, total, created_at, ordered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                total = EXCLUDED.total,
                ordered_at = EXCLUDED.ordered_at
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.total().amount())
        .bind(order.created_at())
        .bind(order.ordered_at())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(order.id().as_uuid())
            .execute(&mut *tx)
            .await?;

        for (position, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, product_id, position, quantity, unit_price, discount_percent)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(position as i32)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.amount())
            .bind(line.discount_percent)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn select_warranty(&self, warranty_id: WarrantyId) -> Result<Option<Warranty>> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, product_id, duration_months, warranty_type, terms, details
            FROM warranties
            WHERE id = $1
            "#,
        )
        .bind(warranty_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_warranty).transpose()
    }

    async fn upsert_warranty(&self, warranty: &Warranty) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO warranties (id, order_id, product_id, duration_months, warranty_type, terms, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                order_id = EXCLUDED.order_id,
                product_id = EXCLUDED.product_id,
                duration_months = EXCLUDED.duration_months,
                warranty_type = EXCLUDED.warranty_type,
                terms = EXCLUDED.terms,
                details = EXCLUDED.details
            "#,
        )
        .bind(warranty.id.as_uuid())
        .bind(warranty.order_id.map(|id| id.as_uuid()))
        .bind(warranty.product_id.map(|id| id.as_uuid()))
        .bind(warranty.duration_months.map(i64::from))
        .bind(warranty.warranty_type.as_deref())
        .bind(warranty.terms.as_deref())
        .bind(warranty.details.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("{column} out of range: {value}")))
}

#[async_trait]
impl ProductRepository for PostgresRepository {
    async fn load_product(&self, product_id: ProductId) -> RepositoryResult<Option<Product>> {
        Ok(self.select_product(product_id).await?)
    }

    async fn save_product(&self, product: &Product) -> RepositoryResult<()> {
        Ok(self.upsert_product(product).await?)
    }

    async fn take_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> RepositoryResult<StockChange> {
        Ok(self.decrement_stock(product_id, quantity).await?)
    }

    async fn put_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> RepositoryResult<Option<u32>> {
        Ok(self.increment_stock(product_id, quantity).await?)
    }
}

#[async_trait]
impl OrderRepository for PostgresRepository {
    async fn load_order(&self, order_id: OrderId) -> RepositoryResult<Option<Order>> {
        Ok(self.select_orders("id = $1", order_id.as_uuid()).await?.pop())
    }

    async fn find_cart(&self, customer_id: CustomerId) -> RepositoryResult<Option<Order>> {
        Ok(self
            .select_orders("customer_id = $1 AND status = 'CART'", customer_id.as_uuid())
            .await?
            .pop())
    }

    async fn orders_for_customer(&self, customer_id: CustomerId) -> RepositoryResult<Vec<Order>> {
        Ok(self
            .select_orders("customer_id = $1", customer_id.as_uuid())
            .await?)
    }

    async fn save_order(&self, order: &Order) -> RepositoryResult<()> {
        match self.write_order(order).await {
            Ok(()) => Ok(()),
            Err(StoreError::Database(sqlx::Error::Database(db_err)))
                if db_err.constraint() == Some(ONE_CART_CONSTRAINT) =>
            {
                let customer_id = order.customer_id();
                match self.find_cart(customer_id).await? {
                    Some(existing) => Err(RepositoryError::CartConflict {
                        customer_id,
                        existing: existing.id(),
                    }),
                    None => Err(RepositoryError::Unavailable(format!(
                        "conflicting cart for customer {customer_id} changed concurrently"
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_order(&self, order_id: OrderId) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl WarrantyRepository for PostgresRepository {
    async fn load_warranty(&self, warranty_id: WarrantyId) -> RepositoryResult<Option<Warranty>> {
        Ok(self.select_warranty(warranty_id).await?)
    }

    async fn save_warranty(&self, warranty: &Warranty) -> RepositoryResult<()> {
        Ok(self.upsert_warranty(warranty).await?)
    }
}
