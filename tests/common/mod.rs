// Shared fakes for the integration tests
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use mealscan::database::{DatabaseError, HistoryStore};
use mealscan::food::analysis::NutritionData;
use mealscan::food::api::{LookupStatus, NutritionSource};
use mealscan::food::ScanRecord;
use mealscan::providers::{LabelModel, LabelScore, ModelInput};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct FakeModel {
    name: &'static str,
    answer: Option<Vec<LabelScore>>,
    calls: AtomicUsize,
}

impl FakeModel {
    pub fn answering(name: &'static str, label: &str, score: f32) -> Arc<Self> {
        Arc::new(Self {
            name,
            answer: Some(vec![LabelScore::new(label, score)]),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            answer: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LabelModel for FakeModel {
    async fn classify(&self, _input: &ModelInput) -> Result<Vec<LabelScore>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().ok_or_else(|| anyhow!("{} unavailable", self.name))
    }

    fn model_name(&self) -> &str {
        self.name
    }
}

pub struct FakeNutrition {
    status: LookupStatus,
    pub queries: Mutex<Vec<String>>,
}

impl FakeNutrition {
    pub fn returning(status: LookupStatus) -> Arc<Self> {
        Arc::new(Self {
            status,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn found(calories: f64, proteins: f64, fats: f64, carbs: f64) -> Arc<Self> {
        Self::returning(LookupStatus::Found(NutritionData::new(calories, proteins, fats, carbs)))
    }
}

#[async_trait]
impl NutritionSource for FakeNutrition {
    async fn find(&self, food_item: &str) -> LookupStatus {
        self.queries.lock().unwrap().push(food_item.to_string());
        self.status.clone()
    }
}

#[derive(Default)]
pub struct MemoryHistory {
    pub records: Mutex<Vec<ScanRecord>>,
    fail_append: bool,
    fail_list: bool,
}

impl MemoryHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn broken_append() -> Arc<Self> {
        Arc::new(Self {
            fail_append: true,
            ..Self::default()
        })
    }

    pub fn broken_list() -> Arc<Self> {
        Arc::new(Self {
            fail_list: true,
            ..Self::default()
        })
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, record: &ScanRecord) -> Result<(), DatabaseError> {
        if self.fail_append {
            return Err(DatabaseError::Connection("store offline".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ScanRecord>, DatabaseError> {
        if self.fail_list {
            return Err(DatabaseError::Connection("store offline".to_string()));
        }
        let mut records = self.records.lock().unwrap().clone();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([190, 120, 60])));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageOutputFormat::Png).unwrap();
    buffer.into_inner()
}
