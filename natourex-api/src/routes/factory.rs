/// Generic CRUD handlers
///
/// Every handler is generic over [`Entity`], so a resource router only picks
/// its entity type:
///
/// ```text
/// GET    /          get_all::<E>     200 { results, data: { data: [..] } }
/// POST   /          create_one::<E>  201 { data: { data } }
/// GET    /:id       get_one::<E>     200 { data: { data } }
/// PATCH  /:id       update_one::<E>  200 { data: { data } }
/// DELETE /:id       delete_one::<E>  204
/// ```
///
/// Listings accept the filter/sort/fields/page/limit query syntax of
/// [`ListQuery`]. Resources needing a fixed filter (nested routes) or
/// populated relations call [`list_entities`] and [`fetch_one`] directly.

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    Json,
};
use natourex_shared::{
    query::{Filter, ListQuery},
    repository::Entity,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{Data, Envelope};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{query_pairs, ApiPath, ValidJson},
};

/// Listing response
pub type Listing = Json<Envelope<Data<Vec<Value>>>>;

/// Single record response
pub type Single<E> = Json<Envelope<Data<E>>>;

fn projected<T: Serialize>(query: &ListQuery, item: &T) -> ApiResult<Value> {
    serde_json::to_value(item)
        .map(|value| query.project(value))
        .map_err(|e| ApiError::InternalError(format!("Serialization failed: {}", e)))
}

/// Runs a listing with an optional extra filter
pub async fn list_entities<E: Entity>(
    state: &AppState,
    pairs: &[(String, String)],
    filter: Option<Filter>,
) -> ApiResult<Listing> {
    let mut query = ListQuery::parse(pairs, E::FIELDS, E::DEFAULT_SORT)?;
    if let Some(filter) = filter {
        query = query.with_filter(filter);
    }

    let items = E::repository(&state.repos).find(&query).await?;
    let data = items
        .iter()
        .map(|item| projected(&query, item))
        .collect::<ApiResult<Vec<_>>>()?;

    tracing::debug!(entity = E::NAME, results = data.len(), page = query.page, "Listed records");

    let results = data.len();
    Ok(Json(Envelope::success(Data { data }).with_results(results)))
}

/// Loads one record, populating the named relations
pub async fn fetch_one<E: Entity>(state: &AppState, id: Uuid, populate: &[&str]) -> ApiResult<E> {
    E::repository(&state.repos)
        .find_by_id(id, populate)
        .await?
        .ok_or_else(|| ApiError::no_record(E::NAME))
}

pub async fn get_all<E: Entity>(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Listing> {
    let pairs = query_pairs(raw.as_deref())?;
    list_entities::<E>(&state, &pairs, None).await
}

pub async fn get_one<E: Entity>(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Single<E>> {
    let data = fetch_one::<E>(&state, id, &[]).await?;
    Ok(Json(Envelope::success(Data { data })))
}

pub async fn create_one<E: Entity>(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<E::Create>,
) -> ApiResult<(StatusCode, Single<E>)> {
    let data = E::repository(&state.repos).create(input).await?;

    tracing::info!(entity = E::NAME, id = %data.id(), "Created record");

    Ok((StatusCode::CREATED, Json(Envelope::success(Data { data }))))
}

pub async fn update_one<E: Entity>(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(input): ValidJson<E::Update>,
) -> ApiResult<Single<E>> {
    let data = E::repository(&state.repos)
        .update(id, input)
        .await?
        .ok_or_else(|| ApiError::no_record(E::NAME))?;

    tracing::info!(entity = E::NAME, %id, "Updated record");

    Ok(Json(Envelope::success(Data { data })))
}

pub async fn delete_one<E: Entity>(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    if !E::repository(&state.repos).delete(id).await? {
        return Err(ApiError::no_record(E::NAME));
    }

    tracing::info!(entity = E::NAME, %id, "Deleted record");

    Ok(StatusCode::NO_CONTENT)
}
