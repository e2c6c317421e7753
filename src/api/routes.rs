use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::{attribute_handlers, handlers};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // API Documentation
        .route("/docs/openapi.json", get(handlers::get_openapi_spec))
        // Node hierarchy
        .route("/nodes", post(handlers::create_node::<S>))
        .route("/nodes/roots", get(handlers::list_roots::<S>))
        .route(
            "/nodes/:id",
            get(handlers::get_node::<S>)
                .put(handlers::update_node::<S>)
                .delete(handlers::delete_node::<S>),
        )
        .route("/nodes/:id/children", get(handlers::list_children::<S>))
        .route("/nodes/:id/ancestors", get(handlers::list_ancestors::<S>))
        .route(
            "/nodes/:id/descendants",
            get(handlers::list_descendants::<S>),
        )
        // Attributes as seen from a node
        .route(
            "/nodes/:id/attributes",
            get(attribute_handlers::list_own_attributes::<S>)
                .post(attribute_handlers::create_attribute::<S>),
        )
        .route(
            "/nodes/:id/inherited-attributes",
            get(attribute_handlers::list_inherited_attributes::<S>),
        )
        .route(
            "/nodes/:id/attributes/:attribute_id",
            put(attribute_handlers::record_value::<S>),
        )
        .route(
            "/nodes/:id/attributes/:attribute_id/history",
            get(attribute_handlers::value_history::<S>),
        )
        // Definition maintenance
        .route(
            "/attributes/:attribute_id",
            patch(attribute_handlers::update_attribute::<S>)
                .delete(attribute_handlers::delete_attribute::<S>),
        )
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        create_router::<MemoryStore>().with_state(Arc::new(MemoryStore::new()))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_node(app: &Router, name: &str, parent_id: Option<&str>) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/nodes",
            Some(json!({ "name": name, "parentId": parent_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_inheritance_over_http() {
        let app = app();
        let line = create_node(&app, "Line", None).await;
        let station = create_node(&app, "Station1", Some(&line)).await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/nodes/{}/attributes", line),
            Some(json!({ "name": "Voltage", "format_data": "^[0-9]+$", "value": "220" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["initial_value"]["version"], 1);

        let (status, body) = send(&app, Method::GET, &format!("/nodes/{}", station), None).await;
        assert_eq!(status, StatusCode::OK);
        let attributes = body["attributes"].as_array().unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0]["definition"]["name"], "Voltage");
        assert_eq!(attributes[0]["value"], "220");
        assert_eq!(attributes[0]["is_inherited"], true);
        assert_eq!(attributes[0]["source_node_id"], line.as_str());

        let (_, inherited) = send(
            &app,
            Method::GET,
            &format!("/nodes/{}/inherited-attributes", station),
            None,
        )
        .await;
        assert_eq!(inherited["total"], 1);

        let (_, own) = send(&app, Method::GET, &format!("/nodes/{}/attributes", station), None).await;
        assert_eq!(own["total"], 0);

        // plain redeclaration collides, an explicit override does not
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/nodes/{}/attributes", station),
            Some(json!({ "name": "Voltage", "value": "110" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "duplicate_name");

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/nodes/{}/attributes", station),
            Some(json!({ "name": "Voltage", "value": "110", "overrides": true })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = send(&app, Method::GET, &format!("/nodes/{}", station), None).await;
        assert_eq!(body["attributes"][0]["value"], "110");
        assert_eq!(body["attributes"][0]["is_inherited"], false);
        assert_eq!(body["attributes"][0]["source_node_id"], station.as_str());
    }

    #[tokio::test]
    async fn test_record_value_and_history() {
        let app = app();
        let line = create_node(&app, "Line", None).await;
        let (_, def) = send(
            &app,
            Method::POST,
            &format!("/nodes/{}/attributes", line),
            Some(json!({ "name": "Voltage", "format_data": "^[0-9]+$" })),
        )
        .await;
        let attribute_id = def["id"].as_str().unwrap().to_string();
        let value_uri = format!("/nodes/{}/attributes/{}", line, attribute_id);

        let (status, body) = send(&app, Method::PUT, &value_uri, Some(json!({ "value": "high" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "validation_failed");

        for value in ["220", "230"] {
            let (status, _) = send(&app, Method::PUT, &value_uri, Some(json!({ "value": value }))).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, history) = send(&app, Method::GET, &format!("{}/history", value_uri), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["total"], 2);
        assert_eq!(history["items"][0]["value"], "230");
        assert_eq!(history["items"][1]["value"], "220");
    }

    #[tokio::test]
    async fn test_roots_children_and_move() {
        let app = app();
        let line = create_node(&app, "Line", None).await;
        let station = create_node(&app, "Station1", Some(&line)).await;

        let (_, roots) = send(&app, Method::GET, "/nodes/roots", None).await;
        assert_eq!(roots["total"], 1);
        assert_eq!(roots["items"][0]["name"], "Line");
        assert_eq!(roots["items"][0]["has_children"], true);

        let (_, children) = send(&app, Method::GET, &format!("/nodes/{}/children", line), None).await;
        assert_eq!(children["items"][0]["id"], station.as_str());
        assert_eq!(children["items"][0]["has_children"], false);

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/nodes/{}", line),
            Some(json!({ "parent_id": station })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "circular_reference");

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/nodes/{}", station),
            Some(json!({ "name": "Station 1", "parent_id": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Station 1");
        assert_eq!(body["parent_id"], Value::Null);

        let (_, roots) = send(&app, Method::GET, "/nodes/roots", None).await;
        assert_eq!(roots["total"], 2);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let app = app();
        let line = create_node(&app, "Line", None).await;
        let station = create_node(&app, "Station1", Some(&line)).await;

        let (status, body) = send(&app, Method::DELETE, &format!("/nodes/{}", line), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "has_children");

        let (status, _) = send(&app, Method::DELETE, &format!("/nodes/{}", station), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, Method::GET, &format!("/nodes/{}", station), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_definition_patch_and_delete() {
        let app = app();
        let line = create_node(&app, "Line", None).await;
        let (_, def) = send(
            &app,
            Method::POST,
            &format!("/nodes/{}/attributes", line),
            Some(json!({ "name": "Voltage", "value": "220" })),
        )
        .await;
        let attribute_id = def["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/attributes/{}", attribute_id),
            Some(json!({ "description": "Supply voltage", "format_data": "^[0-9]+$" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description"], "Supply voltage");
        assert_eq!(body["validation_pattern"], "^[0-9]+$");

        let (status, _) = send(&app, Method::DELETE, &format!("/attributes/{}", attribute_id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, own) = send(&app, Method::GET, &format!("/nodes/{}/attributes", line), None).await;
        assert_eq!(own["total"], 0);
    }

    #[tokio::test]
    async fn test_missing_node_is_not_found() {
        let (status, body) = send(&app(), Method::GET, "/nodes/ghost/children", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }
}
