use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::{error, info, warn};
use mealscan::api::{self, ApiLimits};
use mealscan::config::{AppConfig, ModelConfig};
use mealscan::database::{Database, HistoryStore};
use mealscan::food::analysis::{FoodClassifier, FoodFilter};
use mealscan::food::api::{NutritionSource, OpenFoodFactsClient};
use mealscan::food::ScanPipeline;
use mealscan::providers::{DemoLabelModel, HuggingFaceModel, LabelModel};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "MealScan food recognition API", long_about = None)]
struct Args {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Use the built-in demo classifier instead of hosted models
    #[arg(long)]
    demo: bool,

    /// Overrides MEALSCAN_DB_PATH
    #[arg(long)]
    db_path: Option<String>,

    /// Do not persist scan history
    #[arg(long)]
    no_history: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = AppConfig::from_env().context("Invalid configuration")?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Failed to parse address {}:{}", args.host, args.port))?;

    let classifier = build_classifier(&config.models, args.demo)?;
    let gate = build_gate(&config.models)?;
    let nutrition: Arc<dyn NutritionSource> = Arc::new(OpenFoodFactsClient::new(
        &config.nutrition_api_url,
        config.nutrition_timeout,
    )?);
    let history = if args.no_history {
        info!("Scan history disabled");
        None
    } else {
        open_history(args.db_path.as_deref().unwrap_or(&config.db_path)).await
    };

    let pipeline = ScanPipeline::new(FoodFilter::new(gate), classifier, Some(nutrition), history);
    let app = api::create_api(
        pipeline,
        ApiLimits {
            max_upload_bytes: config.max_upload_bytes,
            max_concurrent_scans: config.max_concurrent_scans,
        },
    );

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("MealScan API listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn build_classifier(models: &ModelConfig, demo: bool) -> Result<Option<FoodClassifier>> {
    if demo {
        info!("Using the demo classifier");
        let primary: Arc<dyn LabelModel> = Arc::new(DemoLabelModel::new());
        return Ok(Some(FoodClassifier::new(primary, None)));
    }

    let api_key = match &models.api_key {
        Some(key) => key.clone(),
        None => {
            warn!("HUGGINGFACE_API_KEY is not set; scans will answer 503 (use --demo to run without it)");
            return Ok(None);
        }
    };

    let primary: Arc<dyn LabelModel> = Arc::new(HuggingFaceModel::new(
        api_key.clone(),
        &models.api_url,
        &models.food_model,
        models.timeout,
    )?);

    let category = match &models.category_model {
        Some(model) => {
            let model: Arc<dyn LabelModel> =
                Arc::new(HuggingFaceModel::new(api_key, &models.api_url, model, models.timeout)?);
            Some(model)
        }
        None => None,
    };

    info!(
        "Loaded classification models: {} (category: {})",
        models.food_model,
        models.category_model.as_deref().unwrap_or("none")
    );
    Ok(Some(FoodClassifier::new(primary, category)))
}

fn build_gate(models: &ModelConfig) -> Result<Option<Arc<dyn LabelModel>>> {
    match (&models.api_key, &models.gate_model) {
        (Some(api_key), Some(gate_model)) => {
            info!("Using {} as the food gate model", gate_model);
            let gate: Arc<dyn LabelModel> = Arc::new(HuggingFaceModel::new(
                api_key.clone(),
                &models.api_url,
                gate_model,
                models.timeout,
            )?);
            Ok(Some(gate))
        }
        (None, Some(gate_model)) => {
            warn!("FOOD_GATE_MODEL {} ignored without HUGGINGFACE_API_KEY", gate_model);
            Ok(None)
        }
        _ => Ok(None),
    }
}

async fn open_history(path: &str) -> Option<Arc<dyn HistoryStore>> {
    match Database::new(path).await {
        Ok(db) => {
            info!("Scan history stored in {}", path);
            Some(Arc::new(db))
        }
        Err(e) => {
            error!("Failed to open scan history at {}, continuing without it: {}", path, e);
            None
        }
    }
}
