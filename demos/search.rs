//! Demo: discover a schema, parse a query string from argv, print count and
//! page. Run with `cargo run --example search -- posts "status=active&page=1"`.

use dynquery::{EngineOptions, QueryEngine, RawParams};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dynquery=debug".parse()?))
        .init();

    let mut args = std::env::args().skip(1);
    let table = args.next().unwrap_or_else(|| "posts".into());
    let query_string = args.next().unwrap_or_default();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/dynquery".into());
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let engine = QueryEngine::discover(&pool, "public", EngineOptions::default()).await?;
    tracing::info!(tables = engine.registry().len(), "registry ready");

    let raw = RawParams::from_pairs(query_string.split('&').filter_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        Some((k.to_string(), v.to_string()))
    }));

    let result = engine.search(&pool, &table, &raw).await?;
    println!("count: {}", result.count);
    for row in &result.rows {
        println!("{}", row);
    }
    Ok(())
}
