use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{
    CreateOrder, DeleteAllOrders, Order, OrderError, OrderPatch, OrderService, OrderStatus,
    PaymentStatus,
};
use crate::store::OrderFilter;
use super::response::{ApiResponse, Pagination};

const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Order Handlers
// ============================================================================

pub async fn create_order(
    service: web::Data<OrderService>,
    body: web::Json<CreateOrder>,
) -> Result<HttpResponse, OrderError> {
    let order = service.create_order(body.into_inner()).await?;
    Ok(ApiResponse::ok(order).respond(StatusCode::CREATED))
}

pub async fn update_order(
    service: web::Data<OrderService>,
    id: web::Path<Uuid>,
    body: web::Json<OrderPatch>,
) -> Result<HttpResponse, OrderError> {
    let order = service.update_order(id.into_inner(), body.into_inner()).await?;
    Ok(ApiResponse::ok(order).respond(StatusCode::OK))
}

pub async fn delete_order(
    service: web::Data<OrderService>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, OrderError> {
    service.delete_order(id.into_inner()).await?;
    Ok(ApiResponse::done().respond(StatusCode::OK))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedCount {
    deleted_count: u64,
}

/// A missing body is treated as an unconfirmed request
pub async fn delete_all_orders(
    service: web::Data<OrderService>,
    body: Option<web::Json<DeleteAllOrders>>,
) -> Result<HttpResponse, OrderError> {
    let confirm = body.is_some_and(|b| b.confirm_delete_all);
    let deleted_count = service.delete_all_orders(confirm).await?;
    Ok(ApiResponse::ok(DeletedCount { deleted_count }).respond(StatusCode::OK))
}

pub async fn get_order(
    service: web::Data<OrderService>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, OrderError> {
    let order = service.get_order(id.into_inner()).await?;
    Ok(ApiResponse::ok(order).respond(StatusCode::OK))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    status: Option<String>,
    payment_status: Option<String>,
    search: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

impl ListQuery {
    fn into_filter(self) -> Result<OrderFilter, OrderError> {
        let mut problems = Vec::new();
        let defaults = OrderFilter::default();

        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => {
                let parsed = OrderStatus::parse(raw);
                if parsed.is_none() {
                    problems.push(format!("invalid status: {}", raw));
                }
                parsed
            }
            None => None,
        };
        let payment_status = match self.payment_status.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => {
                let parsed = PaymentStatus::parse(raw);
                if parsed.is_none() {
                    problems.push(format!("invalid payment status: {}", raw));
                }
                parsed
            }
            None => None,
        };

        let page = self.page.unwrap_or(defaults.page);
        if page < 1 {
            problems.push("page must be at least 1".to_string());
        }
        let limit = self.limit.unwrap_or(defaults.limit);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            problems.push(format!("limit must be between 1 and {}", MAX_PAGE_SIZE));
        }

        if let Some(err) = OrderError::from_problems(problems) {
            return Err(err);
        }

        Ok(OrderFilter {
            status,
            payment_status,
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            page,
            limit,
        })
    }
}

#[derive(Debug, Serialize)]
struct OrderList {
    orders: Vec<Order>,
    pagination: Pagination,
}

pub async fn list_orders(
    service: web::Data<OrderService>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, OrderError> {
    let filter = query.into_inner().into_filter()?;
    let page = service.list_orders(&filter).await?;

    let body = OrderList {
        orders: page.orders,
        pagination: Pagination::new(filter.page, filter.limit, page.total),
    };
    Ok(ApiResponse::ok(body).respond(StatusCode::OK))
}

pub async fn order_stats(service: web::Data<OrderService>) -> Result<HttpResponse, OrderError> {
    let stats = service.stats().await?;
    Ok(ApiResponse::ok(stats).respond(StatusCode::OK))
}

pub async fn delivery_stats(service: web::Data<OrderService>) -> Result<HttpResponse, OrderError> {
    let stats = service.delivery_stats().await?;
    Ok(ApiResponse::ok(stats).respond(StatusCode::OK))
}
