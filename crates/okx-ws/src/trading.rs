//! Order operations over the stream
//!
//! Thin wrappers that build the `{"id", "op", "args"}` frames for
//! order placement and cancellation and await the correlated response
//! through [`ConnectionManager::submit_op`]. Requires an authenticated
//! private connection.

use okx_types::{CancelArgs, OkxError, OkxResult, OpResponse, OrderArgs};

use crate::connection::ConnectionManager;
use crate::transport::Transport;

impl<T: Transport + 'static> ConnectionManager<T> {
    /// Place a single order
    pub async fn place_order(&self, order: OrderArgs) -> OkxResult<OpResponse> {
        let args = serde_json::to_value(vec![order]).map_err(|e| OkxError::InvalidJson {
            message: e.to_string(),
            raw: None,
        })?;
        self.submit_op("order", args).await
    }

    /// Place up to 20 orders in one frame
    pub async fn batch_orders(&self, orders: Vec<OrderArgs>) -> OkxResult<OpResponse> {
        let args = serde_json::to_value(orders).map_err(|e| OkxError::InvalidJson {
            message: e.to_string(),
            raw: None,
        })?;
        self.submit_op("batch-orders", args).await
    }

    /// Cancel an order by exchange or client order id
    pub async fn cancel_order(&self, cancel: CancelArgs) -> OkxResult<OpResponse> {
        let args = serde_json::to_value(vec![cancel]).map_err(|e| OkxError::InvalidJson {
            message: e.to_string(),
            raw: None,
        })?;
        self.submit_op("cancel-order", args).await
    }
}
