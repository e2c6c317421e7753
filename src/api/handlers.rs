use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use log::{debug, error};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AssetError;
use crate::logic::{Hierarchy, Resolver};
use crate::model::{Id, NewNode, Node, NodeUpdate, ResolvedAttribute};
use crate::store::traits::Store;

pub type AppState<S> = Arc<S>;
pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(message: &str, code: &str) -> Self {
        Self {
            error: message.to_string(),
            code: code.to_string(),
        }
    }
}

fn status_for(err: &AssetError) -> StatusCode {
    match err {
        AssetError::NotFound { .. } => StatusCode::NOT_FOUND,
        AssetError::DuplicateName { .. } | AssetError::HasChildren(_) => StatusCode::CONFLICT,
        AssetError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssetError::CircularReference { .. } => StatusCode::BAD_REQUEST,
        AssetError::Integrity(_) | AssetError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a domain error onto the HTTP response the API returns for it
pub fn api_error(err: AssetError) -> ApiError {
    let status = status_for(&err);
    if err.is_internal() {
        error!("Request failed with {}: {:#}", status, err);
    } else {
        debug!("Request rejected with {}: {}", status, err);
    }
    (status, Json(ErrorResponse::new(&err.to_string(), err.code())))
}

/// A node as listed under its parent or among the roots
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    #[serde(flatten)]
    pub node: Node,
    pub has_children: bool,
    pub attributes: Vec<ResolvedAttribute>,
}

/// A single node with its direct children and full attribute view
#[derive(Debug, Clone, Serialize)]
pub struct NodeDetail {
    #[serde(flatten)]
    pub node: Node,
    pub children: Vec<Node>,
    pub attributes: Vec<ResolvedAttribute>,
}

async fn summarize<S: Store>(store: &S, node: Node) -> Result<NodeSummary, AssetError> {
    let has_children = store.has_children(&node.id).await?;
    let attributes = Resolver::resolve(store, &node.id).await?;
    Ok(NodeSummary {
        node,
        has_children,
        attributes,
    })
}

async fn summarize_all<S: Store>(
    store: &S,
    nodes: Vec<Node>,
) -> Result<Vec<NodeSummary>, AssetError> {
    let mut summaries = Vec::with_capacity(nodes.len());
    for node in nodes {
        summaries.push(summarize(store, node).await?);
    }
    Ok(summaries)
}

async fn detail<S: Store>(store: &S, node: Node) -> Result<NodeDetail, AssetError> {
    let children = store.list_children(&node.id).await?;
    let attributes = Resolver::resolve(store, &node.id).await?;
    Ok(NodeDetail {
        node,
        children,
        attributes,
    })
}

/// GET /nodes/roots
pub async fn list_roots<S: Store>(
    State(store): State<AppState<S>>,
) -> ApiResult<Json<ListResponse<NodeSummary>>> {
    let roots = Hierarchy::get_roots(&*store).await.map_err(api_error)?;
    let summaries = summarize_all(&*store, roots).await.map_err(api_error)?;
    Ok(Json(summaries.into()))
}

/// POST /nodes
pub async fn create_node<S: Store>(
    State(store): State<AppState<S>>,
    RequestJson(req): RequestJson<NewNode>,
) -> ApiResult<(StatusCode, Json<Node>)> {
    let node = Hierarchy::create_node(&*store, req)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(node)))
}

/// GET /nodes/{id}
pub async fn get_node<S: Store>(
    Path(id): Path<Id>,
    State(store): State<AppState<S>>,
) -> ApiResult<Json<NodeDetail>> {
    let node = Hierarchy::get_node(&*store, &id).await.map_err(api_error)?;
    let detail = detail(&*store, node).await.map_err(api_error)?;
    Ok(Json(detail))
}

/// PUT /nodes/{id}
/// Rename, move and record values for the node's own attributes in one write
pub async fn update_node<S: Store>(
    Path(id): Path<Id>,
    State(store): State<AppState<S>>,
    RequestJson(req): RequestJson<NodeUpdate>,
) -> ApiResult<Json<NodeDetail>> {
    let (node, _) = Hierarchy::update_node(&*store, &id, req)
        .await
        .map_err(api_error)?;
    let detail = detail(&*store, node).await.map_err(api_error)?;
    Ok(Json(detail))
}

/// DELETE /nodes/{id}
pub async fn delete_node<S: Store>(
    Path(id): Path<Id>,
    State(store): State<AppState<S>>,
) -> ApiResult<StatusCode> {
    Hierarchy::delete_node(&*store, &id)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /nodes/{id}/children
pub async fn list_children<S: Store>(
    Path(id): Path<Id>,
    State(store): State<AppState<S>>,
) -> ApiResult<Json<ListResponse<NodeSummary>>> {
    let children = Hierarchy::get_children(&*store, &id)
        .await
        .map_err(api_error)?;
    let summaries = summarize_all(&*store, children)
        .await
        .map_err(api_error)?;
    Ok(Json(summaries.into()))
}

/// GET /nodes/{id}/ancestors
pub async fn list_ancestors<S: Store>(
    Path(id): Path<Id>,
    State(store): State<AppState<S>>,
) -> ApiResult<Json<ListResponse<Node>>> {
    let chain = Hierarchy::get_ancestor_chain(&*store, &id)
        .await
        .map_err(api_error)?;
    Ok(Json(chain.into()))
}

/// GET /nodes/{id}/descendants
pub async fn list_descendants<S: Store>(
    Path(id): Path<Id>,
    State(store): State<AppState<S>>,
) -> ApiResult<Json<ListResponse<Node>>> {
    let descendants = Hierarchy::get_descendants(&*store, &id)
        .await
        .map_err(api_error)?;
    Ok(Json(descendants.into()))
}

pub async fn get_openapi_spec() -> Json<serde_json::Value> {
    let node_id = serde_json::json!({
        "name": "id", "in": "path", "required": true, "schema": { "type": "string" }
    });
    let attribute_id = serde_json::json!({
        "name": "attribute_id", "in": "path", "required": true, "schema": { "type": "string" }
    });

    let spec = serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Asset Hierarchy API",
            "version": "0.1.0",
            "description": "Hierarchical assets with inherited, overridable attributes and versioned values."
        },
        "servers": [{ "url": "/", "description": "Current server" }],
        "tags": [
            { "name": "Nodes", "description": "Asset hierarchy management" },
            { "name": "Attributes", "description": "Attribute definitions, inheritance and values" }
        ],
        "paths": {
            "/health": { "get": { "summary": "Health check", "responses": { "200": { "description": "Service is up" } } } },
            "/nodes": {
                "post": {
                    "tags": ["Nodes"], "summary": "Create a node",
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "$ref": "#/components/schemas/NewNode" } } } },
                    "responses": { "201": { "description": "Created node" }, "404": { "description": "Parent not found" }, "422": { "description": "Empty name" } }
                }
            },
            "/nodes/roots": {
                "get": { "tags": ["Nodes"], "summary": "List root nodes with resolved attributes", "responses": { "200": { "description": "Root nodes" } } }
            },
            "/nodes/{id}": {
                "get": { "tags": ["Nodes"], "summary": "Node with children and resolved attributes", "parameters": [node_id.clone()], "responses": { "200": { "description": "Node detail" }, "404": { "description": "Not found" } } },
                "put": {
                    "tags": ["Nodes"], "summary": "Rename, move and record values", "parameters": [node_id.clone()],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "$ref": "#/components/schemas/NodeUpdate" } } } },
                    "responses": { "200": { "description": "Updated node" }, "400": { "description": "Move would create a cycle" }, "422": { "description": "Value rejected" } }
                },
                "delete": { "tags": ["Nodes"], "summary": "Delete a leaf node", "parameters": [node_id.clone()], "responses": { "204": { "description": "Deleted" }, "409": { "description": "Node has children" } } }
            },
            "/nodes/{id}/children": {
                "get": { "tags": ["Nodes"], "summary": "Direct children with resolved attributes", "parameters": [node_id.clone()], "responses": { "200": { "description": "Children" } } }
            },
            "/nodes/{id}/ancestors": {
                "get": { "tags": ["Nodes"], "summary": "Ancestor chain, root first, including the node", "parameters": [node_id.clone()], "responses": { "200": { "description": "Chain" } } }
            },
            "/nodes/{id}/descendants": {
                "get": { "tags": ["Nodes"], "summary": "All descendants, breadth first", "parameters": [node_id.clone()], "responses": { "200": { "description": "Descendants" } } }
            },
            "/nodes/{id}/attributes": {
                "get": { "tags": ["Attributes"], "summary": "Own attributes", "parameters": [node_id.clone()], "responses": { "200": { "description": "Own attributes" } } },
                "post": {
                    "tags": ["Attributes"], "summary": "Declare an attribute, optionally overriding an inherited one", "parameters": [node_id.clone()],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "$ref": "#/components/schemas/NewAttribute" } } } },
                    "responses": { "201": { "description": "Created definition" }, "409": { "description": "Name already visible" }, "422": { "description": "Initial value rejected" } }
                }
            },
            "/nodes/{id}/inherited-attributes": {
                "get": { "tags": ["Attributes"], "summary": "Attributes inherited from ancestors", "parameters": [node_id.clone()], "responses": { "200": { "description": "Inherited attributes" } } }
            },
            "/nodes/{id}/attributes/{attribute_id}": {
                "put": {
                    "tags": ["Attributes"], "summary": "Record a new value version", "parameters": [node_id.clone(), attribute_id.clone()],
                    "requestBody": { "required": true, "content": { "application/json": { "schema": { "type": "object", "required": ["value"], "properties": { "value": { "type": "string" } } } } } },
                    "responses": { "200": { "description": "Recorded value" }, "422": { "description": "Value rejected" } }
                }
            },
            "/nodes/{id}/attributes/{attribute_id}/history": {
                "get": { "tags": ["Attributes"], "summary": "Value versions, newest first", "parameters": [node_id, attribute_id.clone()], "responses": { "200": { "description": "History" } } }
            },
            "/attributes/{attribute_id}": {
                "patch": { "tags": ["Attributes"], "summary": "Update a definition", "parameters": [attribute_id.clone()], "responses": { "200": { "description": "Updated definition" } } },
                "delete": { "tags": ["Attributes"], "summary": "Delete a definition and its values", "parameters": [attribute_id], "responses": { "204": { "description": "Deleted" } } }
            }
        },
        "components": {
            "schemas": {
                "NewNode": {
                    "type": "object", "required": ["name"],
                    "properties": { "name": { "type": "string" }, "parent_id": { "type": "string", "nullable": true } }
                },
                "NodeUpdate": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "parent_id": { "type": "string", "nullable": true, "description": "null makes the node a root; omit to keep the parent" },
                        "attributes": { "type": "array", "items": { "type": "object", "properties": { "attribute_id": { "type": "string" }, "value": { "type": "string" } } } }
                    }
                },
                "NewAttribute": {
                    "type": "object", "required": ["name"],
                    "properties": {
                        "name": { "type": "string" },
                        "description": { "type": "string" },
                        "format_data": { "type": "string", "description": "Regular expression values must match" },
                        "is_reference": { "type": "boolean" },
                        "overrides": { "type": "boolean", "description": "Shadow an inherited attribute of the same name" },
                        "value": { "type": "string" }
                    }
                }
            }
        }
    });

    Json(spec)
}
