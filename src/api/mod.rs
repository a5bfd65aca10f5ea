mod alerts;
mod error;
mod orders;
mod response;

use std::sync::Arc;

use actix::Addr;
use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpRequest, HttpServer};

use crate::actors::NotificationHub;
use crate::domain::order::OrderService;

pub use response::{ApiResponse, Pagination};

// ============================================================================
// REST API
// ============================================================================
//
//   POST   /orders                  create
//   GET    /orders                  list (filters + pagination)
//   DELETE /orders                  delete all, needs confirmDeleteAll
//   GET    /orders/stats            order statistics
//   GET    /orders/delivery-stats   delivery statistics
//   GET    /orders/{id}             fetch one
//   PUT    /orders/{id}             update
//   DELETE /orders/{id}             delete a pending order
//   GET    /alerts                  stock alerts
//   GET    /notifications           recent notifications
//   GET    /health
//
// ============================================================================

/// Register routes, extractor error handlers and shared state
pub fn configure(
    service: web::Data<OrderService>,
    hub: web::Data<Addr<NotificationHub>>,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(service)
            .app_data(hub)
            .app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(|err, req| {
                bad_request("Invalid query string", err.to_string(), req)
            }))
            .app_data(web::PathConfig::default().error_handler(|err, req| {
                bad_request("Invalid id", err.to_string(), req)
            }))
            .service(
                web::scope("/orders")
                    .route("", web::post().to(orders::create_order))
                    .route("", web::get().to(orders::list_orders))
                    .route("", web::delete().to(orders::delete_all_orders))
                    // Fixed paths before the {id} matcher
                    .route("/stats", web::get().to(orders::order_stats))
                    .route("/delivery-stats", web::get().to(orders::delivery_stats))
                    .route("/{id}", web::get().to(orders::get_order))
                    .route("/{id}", web::put().to(orders::update_order))
                    .route("/{id}", web::delete().to(orders::delete_order)),
            )
            .route("/alerts", web::get().to(alerts::list_alerts))
            .route("/notifications", web::get().to(alerts::recent_notifications))
            .route("/health", web::get().to(crate::metrics::health_handler));
    }
}

fn bad_request(message: &str, detail: String, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(detail = %detail, "Rejected request");
    let response = ApiResponse::error(message, vec![detail.clone()]).respond(StatusCode::BAD_REQUEST);
    actix_web::error::InternalError::from_response(detail, response).into()
}

/// Start the REST API server
pub async fn start_api_server(
    service: Arc<OrderService>,
    hub: Addr<NotificationHub>,
    port: u16,
) -> std::io::Result<()> {
    tracing::info!("🌐 Starting API server on http://0.0.0.0:{}", port);

    let service = web::Data::from(service);
    let hub = web::Data::new(hub);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .configure(configure(service.clone(), hub.clone()))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

// ============================================================================
// Handler Tests
// ============================================================================
