use uuid::Uuid;

use crate::domain::order::OrderError;
use crate::models::Product;
use crate::store::{StockWrite, StoreError, StoreTx};

// ============================================================================
// Stock Ledger
// ============================================================================
//
// The only code path that changes `products.stock`. Each movement is a
// conditional write inside the caller's transaction: if a concurrent
// reservation got there first, the write is refused and the caller's whole
// unit of work is abandoned with `InsufficientStock`.
//
// ============================================================================

#[derive(Debug, Default)]
pub struct StockLedger {
    touched: Vec<Product>,
    reserved_units: i64,
    released_units: i64,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `quantity` units out of stock. Returns the new stock.
    pub async fn reserve(
        &mut self,
        tx: &mut dyn StoreTx,
        product_id: Uuid,
        quantity: i64,
    ) -> Result<i64, OrderError> {
        let product = tx
            .product(product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(product_id))?;

        if product.stock < quantity {
            return Err(insufficient(&product, product.stock, quantity));
        }

        match tx.adjust_stock(product_id, -quantity).await? {
            StockWrite::Applied(updated) => {
                tracing::debug!(
                    product_id = %product_id,
                    quantity,
                    stock = updated.stock,
                    "Stock reserved"
                );
                self.reserved_units += quantity;
                Ok(self.record(updated))
            }
            // Lost a race between the read and the write
            StockWrite::WouldGoNegative { available } => {
                Err(insufficient(&product, available, quantity))
            }
            StockWrite::UnknownProduct => Err(OrderError::ProductNotFound(product_id)),
        }
    }

    /// Return `quantity` units to stock. A product that no longer exists in
    /// the catalog is skipped with a warning.
    pub async fn release(
        &mut self,
        tx: &mut dyn StoreTx,
        product_id: Uuid,
        quantity: i64,
    ) -> Result<Option<i64>, OrderError> {
        match tx.adjust_stock(product_id, quantity).await? {
            StockWrite::Applied(updated) => {
                tracing::debug!(
                    product_id = %product_id,
                    quantity,
                    stock = updated.stock,
                    "Stock released"
                );
                self.released_units += quantity;
                Ok(Some(self.record(updated)))
            }
            StockWrite::UnknownProduct => {
                tracing::warn!(
                    product_id = %product_id,
                    quantity,
                    "Cannot release stock for unknown product"
                );
                Ok(None)
            }
            StockWrite::WouldGoNegative { available } => Err(OrderError::Transaction(StoreError::Corrupt(format!(
                "release of {} units refused for product {} with stock {}",
                quantity, product_id, available
            )))),
        }
    }

    /// `delta > 0` releases, `delta < 0` reserves
    pub async fn net_adjust(
        &mut self,
        tx: &mut dyn StoreTx,
        product_id: Uuid,
        delta: i64,
    ) -> Result<Option<i64>, OrderError> {
        match delta {
            0 => Ok(None),
            d if d > 0 => self.release(tx, product_id, d).await,
            d => self.reserve(tx, product_id, -d).await.map(Some),
        }
    }

    pub async fn reserve_all(
        &mut self,
        tx: &mut dyn StoreTx,
        quantities: &[(Uuid, i64)],
    ) -> Result<(), OrderError> {
        for &(product_id, quantity) in quantities {
            self.reserve(tx, product_id, quantity).await?;
        }
        Ok(())
    }

    pub async fn release_all(
        &mut self,
        tx: &mut dyn StoreTx,
        quantities: &[(Uuid, i64)],
    ) -> Result<(), OrderError> {
        for &(product_id, quantity) in quantities {
            self.release(tx, product_id, quantity).await?;
        }
        Ok(())
    }

    /// Products moved by this ledger with their latest stock, in first-touch order
    pub fn touched(&self) -> &[Product] {
        &self.touched
    }

    pub fn reserved_units(&self) -> i64 {
        self.reserved_units
    }

    pub fn released_units(&self) -> i64 {
        self.released_units
    }

    fn record(&mut self, product: Product) -> i64 {
        let stock = product.stock;
        match self.touched.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => self.touched.push(product),
        }
        stock
    }
}

fn insufficient(product: &Product, available: i64, requested: i64) -> OrderError {
    OrderError::InsufficientStock {
        product_id: product.id,
        product_name: product.name.clone(),
        available,
        requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store};
    use rust_decimal::Decimal;

    fn product(name: &str, stock: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price: Decimal::new(100, 0),
            gst_rate: Decimal::new(18, 0),
            stock,
        }
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let p = product("Widget", 5);
        let store = MemoryStore::with_products([p.clone()]);
        let mut tx = store.begin().await.unwrap();
        let mut ledger = StockLedger::new();

        assert_eq!(ledger.reserve(tx.as_mut(), p.id, 5).await.unwrap(), 0);
        assert_eq!(ledger.release(tx.as_mut(), p.id, 2).await.unwrap(), Some(2));
        tx.commit().await.unwrap();

        assert_eq!(store.get_product(p.id).await.unwrap().stock, 2);
        assert_eq!(ledger.reserved_units(), 5);
        assert_eq!(ledger.released_units(), 2);
        assert_eq!(ledger.touched().len(), 1);
        assert_eq!(ledger.touched()[0].stock, 2);
    }

    #[tokio::test]
    async fn test_reserve_insufficient_names_product() {
        let p = product("Widget", 2);
        let store = MemoryStore::with_products([p.clone()]);
        let mut tx = store.begin().await.unwrap();
        let mut ledger = StockLedger::new();

        let err = ledger.reserve(tx.as_mut(), p.id, 3).await.unwrap_err();

        match err {
            OrderError::InsufficientStock {
                product_name,
                available,
                requested,
                ..
            } => {
                assert_eq!(product_name, "Widget");
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ledger.touched().is_empty());
    }

    #[tokio::test]
    async fn test_reserve_unknown_product() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut ledger = StockLedger::new();

        let err = ledger.reserve(tx.as_mut(), Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound(_)));

        // Releasing to a product that vanished is not an error
        assert_eq!(ledger.release(tx.as_mut(), Uuid::new_v4(), 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_net_adjust_directions() {
        let p = product("Widget", 2);
        let store = MemoryStore::with_products([p.clone()]);
        let mut tx = store.begin().await.unwrap();
        let mut ledger = StockLedger::new();

        // quantity 3 -> 2 releases one unit
        assert_eq!(ledger.net_adjust(tx.as_mut(), p.id, 1).await.unwrap(), Some(3));
        // quantity 2 -> 5 reserves three
        assert_eq!(ledger.net_adjust(tx.as_mut(), p.id, -3).await.unwrap(), Some(0));
        assert_eq!(ledger.net_adjust(tx.as_mut(), p.id, 0).await.unwrap(), None);

        let err = ledger.net_adjust(tx.as_mut(), p.id, -1).await.unwrap_err();
        assert!(matches!(err, OrderError::InsufficientStock { .. }));
    }

    #[tokio::test]
    async fn test_reserve_all_is_atomic_with_transaction() {
        let a = product("A", 5);
        let b = product("B", 1);
        let store = MemoryStore::with_products([a.clone(), b.clone()]);

        {
            let mut tx = store.begin().await.unwrap();
            let mut ledger = StockLedger::new();
            let result = ledger
                .reserve_all(tx.as_mut(), &[(a.id, 2), (b.id, 2)])
                .await;
            assert!(result.is_err());
            // tx dropped here, nothing committed
        }

        assert_eq!(store.get_product(a.id).await.unwrap().stock, 5);
        assert_eq!(store.get_product(b.id).await.unwrap().stock, 1);
    }
}
