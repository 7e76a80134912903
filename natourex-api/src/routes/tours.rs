/// Tour routes
///
/// # Endpoints
///
/// ```text
/// GET    /api/v2/tours/top-5-cheap                                      public
/// GET    /api/v2/tours/tour-stats                                       public
/// GET    /api/v2/tours/monthly-plan/:year                               admin, lead-guide, guide
/// GET    /api/v2/tours/tours-within/:distance/center/:latlng/unit/:unit public
/// GET    /api/v2/tours/distances/:latlng/unit/:unit                     public
/// GET    /api/v2/tours                                                  public
/// POST   /api/v2/tours                                                  admin, lead-guide
/// GET    /api/v2/tours/:id                                              public
/// PATCH  /api/v2/tours/:id                                              admin, lead-guide
/// DELETE /api/v2/tours/:id                                              admin, lead-guide
/// PATCH  /api/v2/tours/:id/images                                       admin, lead-guide
/// GET    /api/v2/tours/:id/reviews                                      logged in
/// POST   /api/v2/tours/:id/reviews                                      user
/// ```

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, RawQuery, State},
    routing::{get, patch, post},
    Json, Router,
};
use natourex_shared::{
    analytics::{DifficultyStats, MonthlyPlan, TourDistance},
    geo::{DistanceUnit, GeoPoint},
    models::{Role, Tour, UpdateTour},
    query::AliasQuery,
    repository::POPULATE_REVIEWS,
};
use serde::Serialize;
use uuid::Uuid;

use super::{
    factory::{self, fetch_one, list_entities, Listing, Single},
    reviews, Data, Envelope,
};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{query_pairs, ApiPath},
    images::{save_tour_images, TourUploads, TOUR_IMAGE_DIR, UPLOAD_BODY_LIMIT},
    middleware::auth::protected,
};

/// Roles allowed to create, change and delete tours
pub const TOUR_WRITERS: &[Role] = &[Role::Admin, Role::LeadGuide];

/// Roles allowed to see the monthly plan
pub const TOUR_PLANNERS: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];

/// Five best rated tours, cheapest first on equal rating
pub const TOP_TOURS: AliasQuery = AliasQuery {
    limit: 5,
    sort: "-ratingsAverage,price",
    fields: "name,price,ratingsAverage,summary,difficulty",
};

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub stats: Vec<DifficultyStats>,
}

#[derive(Debug, Serialize)]
pub struct PlanData {
    pub plan: Vec<MonthlyPlan>,
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/top-5-cheap", get(top_tours))
        .route("/tour-stats", get(tour_stats))
        .route(
            "/monthly-plan/:year",
            protected(get(monthly_plan), state, TOUR_PLANNERS),
        )
        .route(
            "/tours-within/:distance/center/:latlng/unit/:unit",
            get(tours_within),
        )
        .route("/distances/:latlng/unit/:unit", get(distances))
        .route(
            "/",
            get(factory::get_all::<Tour>).merge(protected(
                post(factory::create_one::<Tour>),
                state,
                TOUR_WRITERS,
            )),
        )
        .route(
            "/:id",
            get(get_tour).merge(protected(
                patch(factory::update_one::<Tour>).delete(factory::delete_one::<Tour>),
                state,
                TOUR_WRITERS,
            )),
        )
        .route(
            "/:id/images",
            protected(patch(upload_tour_images), state, TOUR_WRITERS)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/:id/reviews",
            protected(get(reviews::get_tour_reviews), state, &[]).merge(protected(
                post(reviews::create_tour_review),
                state,
                reviews::REVIEW_AUTHORS,
            )),
        )
}

/// `GET /top-5-cheap`: the listing with [`TOP_TOURS`] applied over any filters
pub async fn top_tours(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Listing> {
    let mut pairs = query_pairs(raw.as_deref())?;
    TOP_TOURS.apply(&mut pairs);
    list_entities::<Tour>(&state, &pairs, None).await
}

/// `GET /:id` with reviews populated
pub async fn get_tour(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Single<Tour>> {
    let data = fetch_one::<Tour>(&state, id, &[POPULATE_REVIEWS]).await?;
    Ok(Json(Envelope::success(Data { data })))
}

pub async fn tour_stats(State(state): State<AppState>) -> ApiResult<Json<Envelope<StatsData>>> {
    let stats = state.repos.analytics.tour_stats().await?;
    Ok(Json(Envelope::success(StatsData { stats })))
}

pub async fn monthly_plan(
    State(state): State<AppState>,
    ApiPath(year): ApiPath<i32>,
) -> ApiResult<Json<Envelope<PlanData>>> {
    let plan = state.repos.analytics.monthly_plan(year).await?;
    let results = plan.len();
    Ok(Json(Envelope::success(PlanData { plan }).with_results(results)))
}

/// Tours starting within `distance` of `latlng`
pub async fn tours_within(
    State(state): State<AppState>,
    ApiPath((distance, latlng, unit)): ApiPath<(f64, String, String)>,
) -> ApiResult<Json<Envelope<Data<Vec<Tour>>>>> {
    let center = GeoPoint::parse_lat_lng(&latlng)?;
    let unit: DistanceUnit = unit.parse()?;
    if !distance.is_finite() || distance < 0.0 {
        return Err(ApiError::BadRequest(
            "Distance must be a non-negative number".to_string(),
        ));
    }

    let tours = state
        .repos
        .analytics
        .tours_within(center, unit.to_radians(distance))
        .await?;

    tracing::debug!(lat = center.lat, lng = center.lng, distance, results = tours.len(), "Radius query");

    let results = tours.len();
    Ok(Json(Envelope::success(Data { data: tours }).with_results(results)))
}

/// Distance from `latlng` to every tour, in `unit`
pub async fn distances(
    State(state): State<AppState>,
    ApiPath((latlng, unit)): ApiPath<(String, String)>,
) -> ApiResult<Json<Envelope<Data<Vec<TourDistance>>>>> {
    let center = GeoPoint::parse_lat_lng(&latlng)?;
    let unit: DistanceUnit = unit.parse()?;

    let distances = state
        .repos
        .analytics
        .distances(center, unit.meters_multiplier())
        .await?;

    Ok(Json(Envelope::success(Data { data: distances })))
}

/// `PATCH /:id/images`: multipart `imageCover` (one) and `images` (up to
/// three), each resized to 2000x1333 JPEG and stored under the public
/// directory before the tour is updated
pub async fn upload_tour_images(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Single<Tour>> {
    let uploads = TourUploads::from_multipart(multipart?).await?;
    if uploads.is_empty() {
        return Err(ApiError::BadRequest(
            "Please upload a cover image or gallery images".to_string(),
        ));
    }

    fetch_one::<Tour>(&state, id, &[]).await?;

    let dir = state.config.api.public_dir.join(TOUR_IMAGE_DIR);
    let saved = save_tour_images(&dir, id, uploads).await?;

    tracing::info!(tour_id = %id, cover = ?saved.cover, images = ?saved.images, "Stored tour images");

    let update = UpdateTour {
        image_cover: saved.cover,
        images: saved.images,
        ..Default::default()
    };

    let data = state
        .repos
        .tours
        .update(id, update)
        .await?
        .ok_or_else(|| ApiError::no_record("tour"))?;

    Ok(Json(Envelope::success(Data { data })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_tours_alias_overrides_paging() {
        let mut pairs = vec![
            ("limit".to_string(), "50".to_string()),
            ("difficulty".to_string(), "easy".to_string()),
        ];
        TOP_TOURS.apply(&mut pairs);

        assert!(pairs.contains(&("limit".to_string(), "5".to_string())));
        assert!(pairs.contains(&("difficulty".to_string(), "easy".to_string())));
        assert!(!pairs.contains(&("limit".to_string(), "50".to_string())));
    }

    #[test]
    fn test_role_sets() {
        assert!(TOUR_WRITERS.contains(&Role::LeadGuide));
        assert!(!TOUR_WRITERS.contains(&Role::Guide));
        assert!(TOUR_PLANNERS.contains(&Role::Guide));
    }
}
