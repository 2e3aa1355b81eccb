//! A basic http server using Axum.
//!
//! Serves the GraphQL endpoint, the GraphiQL landing page and the health
//! check, with CORS and request tracing layers from the configuration.

use std::pin::Pin;
use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::GraphQLRequest;
use async_graphql_axum::GraphQLResponse;
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use futures::channel::oneshot;
use futures::prelude::*;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::configuration::Configuration;
use crate::configuration::ConfigurationError;
use crate::error::GatewayError;
use crate::graphql::GatewaySchema;
use crate::http_server_factory::HttpServerFactory;
use crate::http_server_factory::HttpServerHandle;
use crate::store::DocumentStore;

#[derive(Debug)]
pub(crate) struct AxumHttpServerFactory;

impl AxumHttpServerFactory {
    pub(crate) fn new() -> Self {
        Self
    }
}

impl HttpServerFactory for AxumHttpServerFactory {
    type Future = Pin<Box<dyn Future<Output = Result<HttpServerHandle, GatewayError>> + Send>>;

    fn create(
        &self,
        schema: GatewaySchema,
        store: Arc<dyn DocumentStore>,
        configuration: Arc<Configuration>,
    ) -> Self::Future {
        Box::pin(async move {
            let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
            let listen_address = configuration.server.listen;

            let cors = configuration.cors.clone().into_layer().map_err(|e| {
                GatewayError::ConfigError(ConfigurationError::LayerConfiguration {
                    layer: "Cors",
                    error: e,
                })
            })?;

            let router = Router::new()
                .route(
                    &configuration.server.endpoint,
                    get({
                        let display_landing_page = configuration.server.landing_page;
                        let endpoint = configuration.server.endpoint.clone();
                        move || handle_get(display_landing_page, endpoint)
                    })
                    .post(handle_post),
                )
                .route(&configuration.server.health_check_path, get(health_check))
                .layer(TraceLayer::new_for_http())
                .layer(Extension(schema))
                .layer(Extension(store))
                .layer(cors);

            let listener = TcpListener::bind(listen_address)
                .await
                .map_err(GatewayError::ServerCreationError)?;
            let actual_listen_address = listener
                .local_addr()
                .map_err(GatewayError::ServerCreationError)?;

            tracing::info!(
                "GraphQL endpoint exposed at http://{}{} 🚀",
                actual_listen_address,
                configuration.server.endpoint
            );

            let server = async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown_receiver.await;
                    })
                    .await
                    .map_err(GatewayError::ServerCreationError)
            };

            // Spawn the server into a runtime
            let server_future = tokio::task::spawn(server)
                .map(|res| match res {
                    Ok(res) => res,
                    Err(_) => Err(GatewayError::HttpServerLifecycleError),
                })
                .boxed();

            Ok(HttpServerHandle::new(
                shutdown_sender,
                server_future,
                actual_listen_address,
            ))
        })
    }
}

async fn handle_get(display_landing_page: bool, endpoint: String) -> impl IntoResponse {
    if display_landing_page {
        Html(GraphiQLSource::build().endpoint(&endpoint).finish()).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn handle_post(
    Extension(schema): Extension<GatewaySchema>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(request.into_inner()).await.into()
}

async fn health_check(
    Extension(store): Extension<Arc<dyn DocumentStore>>,
) -> impl IntoResponse {
    match store.ready().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "UP" }))),
        Err(err) => {
            tracing::error!("health check failed: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "DOWN" })),
            )
        }
    }
}
