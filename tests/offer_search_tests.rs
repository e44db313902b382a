//! Offer search integration tests
//!
//! City matching across every stored city format, eligibility filters,
//! keyword/category filters and the result cap.

use std::collections::BTreeSet;
use std::sync::{Arc, Once};

use chrono::{Duration, Utc};
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait};
use tempfile::TempDir;

use etuhinta::config::{DatabaseConfig, init_config};
use etuhinta::services::offer_search::SEARCH_LIMIT;
use etuhinta::services::{OfferSearch, OfferSearcher, SearchParams};
use etuhinta::storage::SeaOrmStorage;
use migration::entities::{business, offer};

// =============================================================================
// Test Setup
// =============================================================================

static INIT: Once = Once::new();

fn init_static_config() {
    INIT.call_once(|| {
        init_config();
    });
}

async fn create_temp_storage(name: &str) -> (Arc<SeaOrmStorage>, TempDir) {
    init_static_config();
    let td = TempDir::new().unwrap();
    let p = td.path().join(format!("{}.db", name));
    let u = format!("sqlite://{}?mode=rwc", p.display());
    let s = SeaOrmStorage::new(&u, "sqlite", &DatabaseConfig::default())
        .await
        .unwrap();
    (Arc::new(s), td)
}

struct OfferSeed<'a> {
    title: &'a str,
    city: Option<&'a str>,
    status: &'a str,
    keywords: Option<&'a str>,
    category: Option<&'a str>,
    is_premium: bool,
    expires_in_days: Option<i64>,
    business_id: Option<i64>,
}

impl<'a> OfferSeed<'a> {
    fn new(title: &'a str, city: Option<&'a str>) -> Self {
        Self {
            title,
            city,
            status: offer::STATUS_APPROVED,
            keywords: None,
            category: None,
            is_premium: false,
            expires_in_days: None,
            business_id: None,
        }
    }
}

async fn seed_offer(db: &DatabaseConnection, seed: OfferSeed<'_>) -> i64 {
    let model = offer::ActiveModel {
        business_id: Set(seed.business_id),
        title: Set(seed.title.to_string()),
        description: Set(Some(format!("{} description", seed.title))),
        keywords: Set(seed.keywords.map(str::to_string)),
        category: Set(seed.category.map(str::to_string)),
        city: Set(seed.city.map(str::to_string)),
        address: Set(None),
        status: Set(seed.status.to_string()),
        is_premium: Set(seed.is_premium),
        is_nationwide: Set(seed.city == Some("koko maa")),
        offer_type: Set(Some("discount".to_string())),
        cost: Set(None),
        image_url: Set(None),
        offer_url: Set(Some("https://example.fi/tarjous".to_string())),
        starts_at: Set(None),
        expires_at: Set(seed.expires_in_days.map(|d| Utc::now() + Duration::days(d))),
        created_at: Set(Utc::now()),
        approved_at: Set(None),
        ..Default::default()
    };
    offer::Entity::insert(model)
        .exec(db)
        .await
        .unwrap()
        .last_insert_id
}

fn city(name: &str) -> SearchParams {
    SearchParams {
        city: Some(name.to_string()),
        ..Default::default()
    }
}

async fn ids_for(search: &OfferSearch, params: SearchParams) -> BTreeSet<i64> {
    search
        .search(&params)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect()
}

// =============================================================================
// City Matching Tests
// =============================================================================

#[tokio::test]
async fn test_city_matches_every_stored_format() {
    let (storage, _td) = create_temp_storage("city_formats").await;
    let db = storage.get_db();

    let plain = seed_offer(db, OfferSeed::new("Plain", Some("Helsinki"))).await;
    let nationwide = seed_offer(db, OfferSeed::new("Nationwide", Some("koko maa"))).await;
    let json_list = seed_offer(
        db,
        OfferSeed::new("JSON list", Some(r#"["Espoo","Aura","Helsinki"]"#)),
    )
    .await;
    let comma_list = seed_offer(db, OfferSeed::new("Comma list", Some("Espoo,Aura,Helsinki"))).await;
    let spaced_list =
        seed_offer(db, OfferSeed::new("Spaced list", Some("Helsinki, Vantaa"))).await;
    let json_nationwide = seed_offer(
        db,
        OfferSeed::new("JSON nationwide", Some(r#"["koko maa"]"#)),
    )
    .await;
    let tampere = seed_offer(db, OfferSeed::new("Tampere only", Some("Tampere"))).await;
    seed_offer(db, OfferSeed::new("No city", None)).await;

    let search = OfferSearch::new(db.clone());

    let expected: BTreeSet<i64> = [
        plain,
        nationwide,
        json_list,
        comma_list,
        spaced_list,
        json_nationwide,
    ]
    .into_iter()
    .collect();
    assert_eq!(ids_for(&search, city("Helsinki")).await, expected);

    // 大小写与空白不影响
    assert_eq!(ids_for(&search, city("  hELSINKI ")).await, expected);

    let expected: BTreeSet<i64> = [nationwide, json_nationwide, tampere].into_iter().collect();
    assert_eq!(ids_for(&search, city("Tampere")).await, expected);

    let expected: BTreeSet<i64> = [nationwide, json_nationwide].into_iter().collect();
    assert_eq!(ids_for(&search, city("Oulu")).await, expected);
}

#[tokio::test]
async fn test_city_list_requires_whole_entry() {
    let (storage, _td) = create_temp_storage("city_whole_entry").await;
    let db = storage.get_db();
    seed_offer(db, OfferSeed::new("Espoo area", Some("Espoonlahti,Kauniainen"))).await;

    let search = OfferSearch::new(db.clone());
    assert!(ids_for(&search, city("Espoo")).await.is_empty());
}

#[tokio::test]
async fn test_no_city_filter_returns_all_eligible() {
    let (storage, _td) = create_temp_storage("no_city").await;
    let db = storage.get_db();
    seed_offer(db, OfferSeed::new("A", Some("Helsinki"))).await;
    seed_offer(db, OfferSeed::new("B", Some("Tampere"))).await;
    seed_offer(db, OfferSeed::new("C", None)).await;

    let search = OfferSearch::new(db.clone());
    assert_eq!(ids_for(&search, SearchParams::default()).await.len(), 3);
}

// =============================================================================
// Eligibility Tests
// =============================================================================

#[tokio::test]
async fn test_excludes_unapproved_and_expired() {
    let (storage, _td) = create_temp_storage("eligibility").await;
    let db = storage.get_db();

    let active = seed_offer(db, OfferSeed::new("Active", Some("Helsinki"))).await;
    let future = seed_offer(
        db,
        OfferSeed {
            expires_in_days: Some(3),
            ..OfferSeed::new("Expires soon", Some("Helsinki"))
        },
    )
    .await;
    seed_offer(
        db,
        OfferSeed {
            status: "pending",
            ..OfferSeed::new("Pending", Some("Helsinki"))
        },
    )
    .await;
    seed_offer(
        db,
        OfferSeed {
            expires_in_days: Some(-1),
            ..OfferSeed::new("Expired", Some("Helsinki"))
        },
    )
    .await;

    let search = OfferSearch::new(db.clone());
    let expected: BTreeSet<i64> = [active, future].into_iter().collect();
    assert_eq!(ids_for(&search, city("Helsinki")).await, expected);

    // active_only=false 不会放开资格条件
    let params = SearchParams {
        active_only: false,
        ..city("Helsinki")
    };
    assert_eq!(ids_for(&search, params).await, expected);
}

#[tokio::test]
async fn test_results_capped_and_premium_first() {
    let (storage, _td) = create_temp_storage("cap").await;
    let db = storage.get_db();

    for i in 0..12 {
        let title = format!("Offer {}", i);
        seed_offer(db, OfferSeed::new(&title, Some("Helsinki"))).await;
    }
    let premium = seed_offer(
        db,
        OfferSeed {
            is_premium: true,
            ..OfferSeed::new("Premium", Some("Helsinki"))
        },
    )
    .await;

    let search = OfferSearch::new(db.clone());
    let results = search.search(&city("Helsinki")).await.unwrap();
    assert_eq!(results.len() as u64, SEARCH_LIMIT);
    assert_eq!(results[0].id, premium);
}

// =============================================================================
// Keyword / Category Tests
// =============================================================================

#[tokio::test]
async fn test_keyword_and_category_filters() {
    let (storage, _td) = create_temp_storage("keywords").await;
    let db = storage.get_db();

    let pizza = seed_offer(
        db,
        OfferSeed {
            keywords: Some("pizza, italialainen"),
            category: Some("Ruoka ja juoma"),
            ..OfferSeed::new("Lounas", Some("Helsinki"))
        },
    )
    .await;
    let shoes = seed_offer(
        db,
        OfferSeed {
            category: Some("Muoti"),
            ..OfferSeed::new("Kengät -30%", Some("Helsinki"))
        },
    )
    .await;

    let search = OfferSearch::new(db.clone());

    let params = SearchParams {
        keywords: Some("PIZZA".into()),
        ..Default::default()
    };
    assert_eq!(ids_for(&search, params).await, BTreeSet::from([pizza]));

    // 标题与描述同样参与匹配
    let params = SearchParams {
        keywords: Some("kengät".into()),
        ..Default::default()
    };
    assert_eq!(ids_for(&search, params).await, BTreeSet::from([shoes]));

    let params = SearchParams {
        category: Some("muoti".into()),
        ..Default::default()
    };
    assert_eq!(ids_for(&search, params).await, BTreeSet::from([shoes]));

    // 通配符按字面匹配
    let params = SearchParams {
        keywords: Some("_".into()),
        ..Default::default()
    };
    assert!(ids_for(&search, params).await.is_empty());
}

#[tokio::test]
async fn test_summary_carries_business_contact() {
    let (storage, _td) = create_temp_storage("summary").await;
    let db = storage.get_db();

    let business_id = business::Entity::insert(business::ActiveModel {
        business_name: Set("Pizzeria Napoli".to_string()),
        phone: Set(Some("+358401234567".to_string())),
        email: Set(Some("info@napoli.fi".to_string())),
        created_at: Set(Utc::now()),
        ..Default::default()
    })
    .exec(db)
    .await
    .unwrap()
    .last_insert_id;

    seed_offer(
        db,
        OfferSeed {
            business_id: Some(business_id),
            ..OfferSeed::new("Pizza 2 for 1", Some("Helsinki"))
        },
    )
    .await;

    let search: Arc<dyn OfferSearcher> = Arc::new(OfferSearch::new(db.clone()));
    let results = search.search_offers(&city("Helsinki")).await.unwrap();
    assert_eq!(results.len(), 1);

    let summary = &results[0];
    assert_eq!(summary.business_name.as_deref(), Some("Pizzeria Napoli"));
    assert_eq!(summary.merchant_name, summary.business_name);
    assert_eq!(summary.phone.as_deref(), Some("+358401234567"));
    assert_eq!(summary.website, summary.offer_url);

    let json = serde_json::to_value(summary).unwrap();
    assert_eq!(json["businessName"], "Pizzeria Napoli");
    assert_eq!(json["isPremium"], false);
}
