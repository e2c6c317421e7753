use crate::api::handlers::{api_error, ApiResult, AppState, ListResponse};
use crate::logic::{Attributes, Resolver};
use crate::model::{
    AttributeDefinition, AttributeDefinitionUpdate, AttributeValue, Id, NewAttributeDefinition,
    ResolvedAttribute,
};
use crate::store::traits::Store;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RecordValueRequest {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct DefinitionResponse {
    #[serde(flatten)]
    pub definition: AttributeDefinition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<AttributeValue>,
}

/// GET /nodes/{id}/attributes
pub async fn list_own_attributes<S: Store>(
    Path(node_id): Path<Id>,
    State(store): State<AppState<S>>,
) -> ApiResult<Json<ListResponse<ResolvedAttribute>>> {
    let own = Resolver::resolve_own(&*store, &node_id)
        .await
        .map_err(api_error)?;
    Ok(Json(own.into()))
}

/// GET /nodes/{id}/inherited-attributes
pub async fn list_inherited_attributes<S: Store>(
    Path(node_id): Path<Id>,
    State(store): State<AppState<S>>,
) -> ApiResult<Json<ListResponse<ResolvedAttribute>>> {
    let inherited = Resolver::resolve_inherited(&*store, &node_id)
        .await
        .map_err(api_error)?;
    Ok(Json(inherited.into()))
}

/// POST /nodes/{id}/attributes
pub async fn create_attribute<S: Store>(
    Path(node_id): Path<Id>,
    State(store): State<AppState<S>>,
    RequestJson(req): RequestJson<NewAttributeDefinition>,
) -> ApiResult<(StatusCode, Json<DefinitionResponse>)> {
    let (definition, initial_value) = Attributes::define_attribute(&*store, &node_id, req)
        .await
        .map_err(api_error)?;
    Ok((
        StatusCode::CREATED,
        Json(DefinitionResponse {
            definition,
            initial_value,
        }),
    ))
}

/// PUT /nodes/{id}/attributes/{attribute_id}
/// Appends a new version; earlier versions stay in the history
pub async fn record_value<S: Store>(
    Path((node_id, attribute_id)): Path<(Id, Id)>,
    State(store): State<AppState<S>>,
    RequestJson(req): RequestJson<RecordValueRequest>,
) -> ApiResult<Json<AttributeValue>> {
    let value = Attributes::record_value(&*store, &node_id, &attribute_id, req.value)
        .await
        .map_err(api_error)?;
    Ok(Json(value))
}

/// GET /nodes/{id}/attributes/{attribute_id}/history
pub async fn value_history<S: Store>(
    Path((node_id, attribute_id)): Path<(Id, Id)>,
    State(store): State<AppState<S>>,
) -> ApiResult<Json<ListResponse<AttributeValue>>> {
    let history = Attributes::history(&*store, &node_id, &attribute_id)
        .await
        .map_err(api_error)?;
    Ok(Json(history.into()))
}

/// PATCH /attributes/{attribute_id}
pub async fn update_attribute<S: Store>(
    Path(attribute_id): Path<Id>,
    State(store): State<AppState<S>>,
    RequestJson(req): RequestJson<AttributeDefinitionUpdate>,
) -> ApiResult<Json<AttributeDefinition>> {
    let definition = Attributes::update_definition(&*store, &attribute_id, req)
        .await
        .map_err(api_error)?;
    Ok(Json(definition))
}

/// DELETE /attributes/{attribute_id}
pub async fn delete_attribute<S: Store>(
    Path(attribute_id): Path<Id>,
    State(store): State<AppState<S>>,
) -> ApiResult<StatusCode> {
    Attributes::delete_definition(&*store, &attribute_id)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
