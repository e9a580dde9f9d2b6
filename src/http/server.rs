//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router with the cart API routes
//! - Wire up middleware (CORS, request ID, timeout, instrumentation, panics)
//! - Bind to a listener and serve until shutdown is signalled
//!
//! # Design Decisions
//! - Layers are added innermost first; the last `.layer` call is outermost
//! - Panics become handler-chain errors so they reach the error reporter

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use crate::cart::CartService;
use crate::config::ServerConfig;
use crate::http::error::ApiError;
use crate::http::handlers::{add_to_cart, get_error, get_health};
use crate::http::middleware::{instrument_request, RequestInstrumentation};
use crate::telemetry::Telemetry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub telemetry: Arc<Telemetry>,
    pub cart_service: Arc<CartService>,
}

/// HTTP server for the cart API.
pub struct HttpServer {
    router: Router,
    instrumentation: Arc<RequestInstrumentation>,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, telemetry: Arc<Telemetry>) -> Self {
        let instrumentation = Arc::new(RequestInstrumentation::new(telemetry.clone()));
        let state = AppState {
            cart_service: Arc::new(CartService::new(telemetry.clone())),
            telemetry,
        };
        let router = Self::build_router(config, state, instrumentation.clone());
        Self {
            router,
            instrumentation,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ServerConfig,
        state: AppState,
        instrumentation: Arc<RequestInstrumentation>,
    ) -> Router {
        let api = Router::new()
            .route("/health", get(get_health))
            .route("/error", get(get_error))
            .route("/cart", post(add_to_cart));

        let cors = CorsLayer::new()
            .allow_origin(AnyOrigin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::ORIGIN,
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::AUTHORIZATION,
            ]);

        Router::new()
            .nest("/api/v1", api)
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(from_fn_with_state(instrumentation, instrument_request))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(cors)
    }

    /// The fully layered router, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn instrumentation(&self) -> &Arc<RequestInstrumentation> {
        &self.instrumentation
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::new("Internal Server Error").into_response()
}
