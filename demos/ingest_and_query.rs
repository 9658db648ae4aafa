use std::sync::Arc;

use cardinality_analytics::{AnalyticsConfig, AnalyticsService, DayBucket, MemoryStore};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store = Arc::new(MemoryStore::new());
    let service = AnalyticsService::new(store.clone(), AnalyticsConfig::default())?;

    for i in 0..10_000 {
        let country = if i % 3 == 0 { "US" } else { "DE" };
        service.ingest("page_view", Some(country), &format!("user_{}", i % 4_000))?;
        service.ingest("page_view", None, &format!("user_{}", i % 4_000))?;
    }

    if let Some(report) = service.flush().await {
        println!("flush report = {:?}", report);
    }
    println!("stored records = {}", store.len());

    let today = DayBucket::containing(Utc::now());
    for dimension in [None, Some("US"), Some("DE")] {
        let estimate = service
            .query("page_view", dimension, today.start(), today.end())
            .await?;
        println!(
            "page_view[{}] distinct users today = {}",
            dimension.unwrap_or("global"),
            estimate
        );
    }

    Ok(())
}
