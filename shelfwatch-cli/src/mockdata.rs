//! Mock artifact generation for development and testing.

use chrono::{Duration, NaiveDate, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::models::{Contract, Planogram, StoreImage};

const SECTIONS: &[&str] = &[
    "beverage_aisle",
    "checkout",
    "end_cap",
    "cooler",
    "promotional_display",
    "entrance",
];

const PRODUCTS: &[&str] = &[
    "Classic Cola",
    "Diet Cola",
    "Zero Cola",
    "Lemon-Lime Soda",
    "Orange Soda",
    "Still Water",
    "Sports Drink",
    "Juice Blend",
];

/// Generates plausible contracts, planograms and store images.
pub struct MockDataGenerator {
    store_ids: Vec<String>,
}

impl MockDataGenerator {
    pub fn new() -> Self {
        Self {
            store_ids: (1..=20).map(|n| format!("STORE_{n:04}")).collect(),
        }
    }

    fn random_store(&self) -> String {
        let mut rng = rand::rng();
        self.store_ids
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| "STORE_0001".to_string())
    }

    fn days_ago(days: i64) -> NaiveDate {
        (Utc::now() - Duration::days(days)).date_naive()
    }

    /// Generate `count` mock contracts.
    pub fn generate_contracts(&self, count: usize) -> Vec<Contract> {
        let mut rng = rand::rng();
        (0..count)
            .map(|n| {
                let effective = Self::days_ago(rng.random_range(30..365));
                Contract {
                    contract_id: Uuid::new_v4().to_string(),
                    name: format!("Retail Agreement {} - 2026", n + 1),
                    store_id: self.random_store(),
                    effective_date: effective,
                    expiry_date: Some(effective + Duration::days(365)),
                    content: Self::contract_content(&mut rng),
                    compliance_rules: Self::compliance_rules(&mut rng),
                    created_at: Utc::now() - Duration::days(rng.random_range(30..365)),
                    updated_at: Utc::now() - Duration::days(rng.random_range(0..30)),
                }
            })
            .collect()
    }

    /// Generate `count` mock planograms.
    pub fn generate_planograms(&self, count: usize) -> Vec<Planogram> {
        let mut rng = rand::rng();
        (0..count)
            .map(|n| Planogram {
                planogram_id: Uuid::new_v4().to_string(),
                name: format!("Planogram Layout {}", n + 1),
                store_id: self.random_store(),
                section: SECTIONS
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or("beverage_aisle")
                    .to_string(),
                layout_data: Self::layout_data(&mut rng),
                effective_date: Self::days_ago(rng.random_range(0..180)),
                version: format!("{}.{}", rng.random_range(1..=5), rng.random_range(0..=9)),
                created_at: Utc::now() - Duration::days(rng.random_range(0..180)),
                updated_at: Utc::now() - Duration::days(rng.random_range(0..30)),
            })
            .collect()
    }

    /// Generate `count` mock store images.
    pub fn generate_store_images(&self, count: usize) -> Vec<StoreImage> {
        let mut rng = rand::rng();
        (0..count)
            .map(|n| {
                let processed = rng.random_bool(0.7);
                StoreImage {
                    image_id: Uuid::new_v4().to_string(),
                    store_id: self.random_store(),
                    image_url: format!(
                        "https://mock-storage.example.com/images/store_image_{n:04}.jpg"
                    ),
                    captured_at: Utc::now() - Duration::hours(rng.random_range(0..24 * 7)),
                    section: SECTIONS
                        .choose(&mut rng)
                        .copied()
                        .unwrap_or("checkout")
                        .to_string(),
                    processed,
                    analysis_result: processed.then(|| Self::analysis_result(&mut rng)),
                }
            })
            .collect()
    }

    fn contract_content(rng: &mut impl Rng) -> String {
        format!(
            "RETAIL PRODUCT PLACEMENT AGREEMENT\n\n\
             SECTION 1: PRODUCT PLACEMENT\n\
             - Products must occupy minimum 60% of beverage shelf space\n\
             - Products must be placed at eye level (shelves 2-4)\n\
             - Promotional displays must be maintained for minimum 30 days\n\n\
             SECTION 2: STOCKING REQUIREMENTS\n\
             - Minimum stock levels: {} units per product\n\
             - Restocking frequency: {} times per week\n\
             - Out-of-stock tolerance: maximum {} hours\n",
            rng.random_range(50..=200),
            rng.random_range(2..=7),
            rng.random_range(2..=8),
        )
    }

    fn compliance_rules(rng: &mut impl Rng) -> Vec<Value> {
        vec![
            json!({
                "rule_id": Uuid::new_v4().to_string(),
                "type": "shelf_space",
                "requirement": "minimum_60_percent",
                "threshold": 60.0,
                "penalty": "tier_1",
            }),
            json!({
                "rule_id": Uuid::new_v4().to_string(),
                "type": "stock_level",
                "requirement": "minimum_units",
                "threshold": rng.random_range(50..=200),
                "penalty": "tier_2",
            }),
            json!({
                "rule_id": Uuid::new_v4().to_string(),
                "type": "placement",
                "requirement": "eye_level_placement",
                "shelves": [2, 3, 4],
                "penalty": "tier_1",
            }),
        ]
    }

    fn layout_data(rng: &mut impl Rng) -> Value {
        let shelves: Vec<Value> = (1..=4)
            .map(|shelf_id| {
                let products: Vec<Value> = PRODUCTS
                    .choose_multiple(rng, 3)
                    .map(|product| {
                        json!({
                            "name": product,
                            "facings": rng.random_range(2..=8),
                        })
                    })
                    .collect();
                json!({
                    "shelf_id": shelf_id,
                    "height": rng.random_range(100..=200),
                    "products": products,
                })
            })
            .collect();
        json!({ "shelves": shelves })
    }

    fn analysis_result(rng: &mut impl Rng) -> Value {
        json!({
            "shelf_share": rng.random_range(40..=80),
            "eye_level_compliant": rng.random_bool(0.8),
            "detected_products": rng.random_range(3..=8),
        })
    }
}

impl Default for MockDataGenerator {
    fn default() -> Self {
        Self::new()
    }
}
