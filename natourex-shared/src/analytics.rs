/// Tour reporting: difficulty statistics, monthly plan and distances
///
/// The PostgreSQL store computes these reports in SQL; the functions here
/// compute the same reports over stored records for the in-memory store.
///
/// # Reports
///
/// - [`tour_stats`]: tours rated 4.5 or above grouped by upper-cased
///   difficulty, ascending by average price
/// - [`monthly_plan`]: start dates of one calendar year grouped by month,
///   ascending, at most 12 rows
/// - [`tours_within`]: tours whose start location lies within an angular radius
/// - [`distances`]: every located tour with its distance from a center

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::tour::TourRecord;

/// Minimum average rating included in the difficulty statistics
pub const STATS_MIN_RATING: f64 = 4.5;

/// Per-difficulty statistics
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    /// Upper-cased difficulty, e.g. `EASY`
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Tour starts within one month
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    /// 1 (January) to 12 (December)
    pub month: i32,
    #[serde(rename = "numToursStarts")]
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

/// Distance of a tour's start from a center point, in the requested unit
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TourDistance {
    pub id: Uuid,
    pub name: String,
    pub distance: f64,
}

/// Half-open UTC range `[Jan 1 year, Jan 1 year+1)`
///
/// Returns `None` for years chrono cannot represent.
pub fn year_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
    let end = Utc.with_ymd_and_hms(year.checked_add(1)?, 1, 1, 0, 0, 0).single()?;
    Some((start, end))
}

#[derive(Default)]
struct StatsAccumulator {
    num_tours: i64,
    num_ratings: i64,
    rating_sum: f64,
    price_sum: f64,
    min_price: f64,
    max_price: f64,
}

/// Groups highly rated tours by difficulty
pub fn tour_stats(tours: &[TourRecord]) -> Vec<DifficultyStats> {
    let mut groups: BTreeMap<String, StatsAccumulator> = BTreeMap::new();

    for tour in tours.iter().filter(|t| t.ratings_average >= STATS_MIN_RATING) {
        let acc = groups.entry(tour.difficulty.to_uppercase()).or_insert_with(|| StatsAccumulator {
            min_price: f64::INFINITY,
            max_price: f64::NEG_INFINITY,
            ..Default::default()
        });
        acc.num_tours += 1;
        acc.num_ratings += i64::from(tour.ratings_quantity);
        acc.rating_sum += tour.ratings_average;
        acc.price_sum += tour.price;
        acc.min_price = acc.min_price.min(tour.price);
        acc.max_price = acc.max_price.max(tour.price);
    }

    let mut stats: Vec<DifficultyStats> = groups
        .into_iter()
        .map(|(difficulty, acc)| {
            let count = acc.num_tours as f64;
            DifficultyStats {
                difficulty,
                num_tours: acc.num_tours,
                num_ratings: acc.num_ratings,
                avg_rating: acc.rating_sum / count,
                avg_price: acc.price_sum / count,
                min_price: acc.min_price,
                max_price: acc.max_price,
            }
        })
        .collect();

    stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
    stats
}

/// Counts tour starts per month of `year`
///
/// Tour names within a month are ordered by start date, then name. A tour
/// starting twice in one month appears twice.
pub fn monthly_plan(tours: &[TourRecord], year: i32) -> Vec<MonthlyPlan> {
    let Some((start, end)) = year_bounds(year) else {
        return Vec::new();
    };

    let mut starts: Vec<(u32, DateTime<Utc>, &str)> = tours
        .iter()
        .flat_map(|tour| {
            tour.start_dates
                .iter()
                .filter(|d| **d >= start && **d < end)
                .map(move |d| (d.month(), *d, tour.name.as_str()))
        })
        .collect();
    starts.sort();

    let mut plan: Vec<MonthlyPlan> = Vec::new();
    for (month, _, name) in starts {
        let month = month as i32;
        match plan.last_mut() {
            Some(row) if row.month == month => {
                row.num_tour_starts += 1;
                row.tours.push(name.to_string());
            }
            _ => plan.push(MonthlyPlan {
                month,
                num_tour_starts: 1,
                tours: vec![name.to_string()],
            }),
        }
    }

    plan
}

/// Tours whose start lies within `radians` of `center`
pub fn tours_within<'a>(
    tours: &'a [TourRecord],
    center: &GeoPoint,
    radians: f64,
) -> Vec<&'a TourRecord> {
    tours
        .iter()
        .filter(|tour| {
            tour.start_point()
                .map(|p| center.angular_distance(&p) <= radians)
                .unwrap_or(false)
        })
        .collect()
}

/// Distance of every located tour from `center`, nearest first
///
/// `multiplier` converts meters into the requested unit.
pub fn distances(tours: &[TourRecord], center: &GeoPoint, multiplier: f64) -> Vec<TourDistance> {
    let mut result: Vec<TourDistance> = tours
        .iter()
        .filter_map(|tour| {
            tour.start_point().map(|p| TourDistance {
                id: tour.id,
                name: tour.name.clone(),
                distance: center.distance_meters(&p) * multiplier,
            })
        })
        .collect();

    result.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    result
}
