//! # Tour Aggregations
//!
//! Fixed reporting pipelines over the tours collection.

use serde_json::json;

use crate::store::{Accumulator, Document, Group, GroupKey, Pipeline, Stage};

/// Minimum rating a tour needs to be counted in the stats
pub const STATS_MIN_RATING: f64 = 4.5;

/// Earliest and latest year accepted by the monthly plan
pub const PLAN_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

fn condition(field: &str, value: serde_json::Value) -> Document {
    let mut doc = Document::new();
    doc.insert(field.to_string(), value);
    doc
}

/// Per-difficulty statistics for well rated tours, cheapest bucket first
pub fn tour_stats() -> Pipeline {
    Pipeline::new()
        .then(Stage::Match(condition(
            "ratingsAverage",
            json!({ "$gte": STATS_MIN_RATING }),
        )))
        .then(Stage::Group(
            Group::by(GroupKey::Upper("difficulty".to_string()))
                .with("numTours", Accumulator::Count)
                .with("numRatings", Accumulator::Sum("ratingsQuantity".to_string()))
                .with("avgRating", Accumulator::Avg("ratingsAverage".to_string()))
                .with("avgPrice", Accumulator::Avg("price".to_string()))
                .with("minPrice", Accumulator::Min("price".to_string()))
                .with("maxPrice", Accumulator::Max("price".to_string())),
        ))
        .then(Stage::Sort("avgPrice".to_string()))
}

/// Tour starts per month of `year`, busiest month first
pub fn monthly_plan(year: i32) -> Pipeline {
    let from = format!("{year:04}-01-01T00:00:00.000Z");
    let to = format!("{year:04}-12-31T00:00:00.000Z");

    Pipeline::new()
        .then(Stage::Unwind("startDates".to_string()))
        .then(Stage::Match(condition(
            "startDates",
            json!({ "$gte": from, "$lte": to }),
        )))
        .then(Stage::Group(
            Group::by(GroupKey::Month("startDates".to_string()))
                .with("numTourStarts", Accumulator::Count)
                .with("tours", Accumulator::Push("name".to_string())),
        ))
        .then(Stage::AddField {
            name: "month".to_string(),
            source: "_id".to_string(),
        })
        .then(Stage::Unset(vec!["_id".to_string()]))
        .then(Stage::Sort("-numTourStarts".to_string()))
        .then(Stage::Limit(12))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TourModel;
    use crate::store::Database;
    use serde_json::Value;

    fn tour(name: &str, difficulty: &str, price: u32, rating: f64, dates: &[&str]) -> Value {
        json!({
            "name": name,
            "duration": 5,
            "maxGroupSize": 10,
            "difficulty": difficulty,
            "price": price,
            "ratingsAverage": rating,
            "ratingsQuantity": 10,
            "summary": "A tour",
            "imageCover": "cover.jpg",
            "startDates": dates
        })
    }

    async fn seeded() -> TourModel {
        let db = Database::in_memory().await.unwrap();
        let model = TourModel::init(&db).await.unwrap();
        let tours = vec![
            tour("The Forest Hiker", "easy", 397, 4.7, &["2021-04-25", "2021-07-20"]),
            tour("The Sea Explorer", "medium", 497, 4.8, &["2021-06-19", "2021-07-20"]),
            tour("The Snow Adventurer", "difficult", 997, 4.5, &["2022-01-05"]),
            tour("The City Wanderer", "easy", 1197, 4.6, &["2021-03-11"]),
            tour("The Park Camper", "medium", 1497, 4.2, &["2021-07-01"]),
        ];
        model.create_many(&tours).await.unwrap();
        model
    }

    #[tokio::test]
    async fn test_tour_stats() {
        let model = seeded().await;
        let stats = model.aggregate(tour_stats()).await.unwrap();

        let keys: Vec<&Value> = stats.iter().map(|s| &s["_id"]).collect();
        assert_eq!(keys, vec![&json!("MEDIUM"), &json!("EASY"), &json!("DIFFICULT")]);

        let easy = &stats[1];
        assert_eq!(easy["numTours"], json!(2));
        assert_eq!(easy["numRatings"], json!(20));
        assert_eq!(easy["avgPrice"], json!(797));
        assert_eq!(easy["minPrice"], json!(397));
        assert_eq!(easy["maxPrice"], json!(1197));

        // The park camper is rated below the threshold
        assert_eq!(stats[0]["numTours"], json!(1));
    }

    #[tokio::test]
    async fn test_monthly_plan() {
        let model = seeded().await;
        let plan = model.aggregate(monthly_plan(2021)).await.unwrap();

        assert_eq!(plan[0]["month"], json!(7));
        assert_eq!(plan[0]["numTourStarts"], json!(3));
        assert!(plan.iter().all(|m| m.get("_id").is_none()));

        let months: usize = plan.iter().map(|m| m["numTourStarts"].as_u64().unwrap() as usize).sum();
        assert_eq!(months, 6);
    }

    #[tokio::test]
    async fn test_secret_tours_excluded_from_aggregates() {
        let model = seeded().await;
        let mut secret = tour("The Hidden Retreat", "easy", 100, 5.0, &["2021-07-02"]);
        secret["secretTour"] = json!(true);
        model.create(&secret).await.unwrap();

        let plan = model.aggregate(monthly_plan(2021)).await.unwrap();
        assert_eq!(plan[0]["numTourStarts"], json!(3));
    }
}
