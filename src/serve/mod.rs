//! HTTP inference endpoint
//!
//! - `POST /analyze` with `{"code": "<python source>"}` returns one
//!   `{"name", "risk_prediction"}` object per top-level function, in
//!   declaration order.
//! - `GET /health` reports the model's feature columns.
//!
//! The predictor is loaded before the router is built and shared read-only
//! through [`ServingContext`].

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::inference::RiskPredictor;
use crate::models::RiskLabel;

/// Shared application state
#[derive(Clone)]
pub struct ServingContext {
    predictor: Arc<RiskPredictor>,
}

impl ServingContext {
    pub fn new(predictor: RiskPredictor) -> Self {
        Self {
            predictor: Arc::new(predictor),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub code: Option<String>,
}

/// One entry of the `/analyze` response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FunctionRisk {
    pub name: String,
    pub risk_prediction: RiskLabel,
}

/// Request-level failure, rendered as `{"error": ...}`
#[derive(Debug)]
pub enum ServeError {
    MissingCode,
    Parse(String),
    Schema(String),
    Internal(String),
}

impl From<Error> for ServeError {
    fn from(err: Error) -> Self {
        match err {
            Error::Parse { .. } => ServeError::Parse(err.to_string()),
            Error::Schema(_) => ServeError::Schema(err.to_string()),
            other => ServeError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServeError::MissingCode => (StatusCode::BAD_REQUEST, "Missing code".to_string()),
            ServeError::Parse(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ServeError::Schema(msg) => {
                tracing::error!("Model schema mismatch: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            ServeError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Build the router with all routes
pub fn router(ctx: ServingContext) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn analyze(
    State(ctx): State<ServingContext>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<Vec<FunctionRisk>>, ServeError> {
    let code = match payload {
        Ok(Json(AnalyzeRequest { code: Some(code) })) if !code.is_empty() => code,
        Ok(_) => return Err(ServeError::MissingCode),
        Err(rejection) => {
            tracing::debug!("rejected /analyze body: {}", rejection);
            return Err(ServeError::MissingCode);
        }
    };

    // Parsing and voting are CPU-bound
    let predictor = Arc::clone(&ctx.predictor);
    let predictions = tokio::task::spawn_blocking(move || predictor.predict_source(&code))
        .await
        .map_err(|e| ServeError::Internal(e.to_string()))??;

    Ok(Json(
        predictions
            .into_iter()
            .map(|p| FunctionRisk {
                name: p.name,
                risk_prediction: p.risk_prediction,
            })
            .collect(),
    ))
}

async fn health(State(ctx): State<ServingContext>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "features": ctx.predictor.schema().columns(),
    }))
}

/// Serve until Ctrl-C
pub async fn serve(listener: tokio::net::TcpListener, ctx: ServingContext) -> std::io::Result<()> {
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{FeatureMatrix, FeatureSchema, ForestConfig, ModelArtifact, RandomForest};
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn context(schema: FeatureSchema) -> ServingContext {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..8 {
            let j = (i % 2) as f32;
            rows.push(vec![1.0 + j, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
            labels.push(RiskLabel::Ok);
            rows.push(vec![20.0 + j, 4.0, 5.0, 6.0, 2.0, 1.0, 4.0]);
            labels.push(RiskLabel::Risky);
        }
        let matrix = FeatureMatrix::with_schema(FeatureSchema::current(), rows).unwrap();
        let config = ForestConfig {
            n_trees: 5,
            max_depth: 3,
            ..Default::default()
        };
        let forest = RandomForest::fit(&matrix, &labels, &config).unwrap();
        ServingContext::new(RiskPredictor::from_artifact(ModelArtifact::new(
            schema,
            forest,
            matrix.n_rows(),
        )))
    }

    fn post_analyze(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(ctx: ServingContext, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router(ctx).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_analyze_returns_functions_in_order() {
        let body = json!({ "code": "def first():\n    return 1\n\ndef second(a):\n    return a\n" });
        let (status, value) = send(
            context(FeatureSchema::current()),
            post_analyze(&body.to_string()),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let items: Vec<FunctionRisk> = serde_json::from_value(value).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "first");
        assert_eq!(items[1].name, "second");
    }

    #[tokio::test]
    async fn test_missing_code_is_bad_request() {
        for body in ["{}", r#"{"code": ""}"#, "not json at all"] {
            let (status, value) = send(context(FeatureSchema::current()), post_analyze(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
            assert_eq!(value["error"], "Missing code");
        }
    }

    #[tokio::test]
    async fn test_invalid_code_is_unprocessable() {
        let body = json!({ "code": "def f(:\n    pass\n" });
        let (status, value) = send(
            context(FeatureSchema::current()),
            post_analyze(&body.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(value["error"].as_str().unwrap().contains("line"));
    }

    #[tokio::test]
    async fn test_python2_and_misindented_code_is_unprocessable() {
        for code in [
            "def f():\n    print 'hi'\n",
            "def f(a, b):\n    return a <> b\n",
            "def f():\n        x = 1\n    y = 2\n    return y\n",
        ] {
            let body = json!({ "code": code });
            let (status, value) = send(
                context(FeatureSchema::current()),
                post_analyze(&body.to_string()),
            )
            .await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "code {code:?}");
            assert!(value["error"].as_str().unwrap().contains("line"));
        }
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_server_error() {
        let schema = FeatureSchema::new(vec!["length".into(); 7]);
        let body = json!({ "code": "def f():\n    pass\n" });
        let (status, value) = send(context(schema), post_analyze(&body.to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(value["error"].as_str().unwrap().contains("schema"));
    }

    #[tokio::test]
    async fn test_health_lists_features() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, value) = send(context(FeatureSchema::current()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["status"], "ok");
        assert_eq!(value["features"].as_array().unwrap().len(), 7);
        assert_eq!(value["features"][6], "max_depth");
    }
}
