use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mockinterview_api::{
    config::{Config, StorageBackend},
    create_router,
    services::{
        clock::SystemClock,
        llm::OpenAiGenerator,
        question_seed::{ensure_seeded, sample_questions},
        store::{MemoryStore, MongoStore, Stores},
        AppState,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let tracer = init_telemetry();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mockinterview_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    tracing::info!("Starting mock interview API");

    let config = Config::load()?;
    tracing::info!(
        "Configuration loaded for environment: {:?}",
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
    );

    let zone = config.calendar_zone();
    let stores = match config.storage_backend {
        StorageBackend::Mongo => {
            let client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
            tracing::info!("MongoDB connected");
            let store = Arc::new(MongoStore::new(client.database(&config.mongo_database), zone));
            let seeded = ensure_seeded(&store).await?;
            if seeded > 0 {
                tracing::info!(seeded, "Seeded sample questions");
            }
            Stores::mongo(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, nothing will survive a restart");
            Stores::memory(Arc::new(MemoryStore::with_questions(sample_questions())))
        }
    };

    let generator = Arc::new(OpenAiGenerator::new(config.llm.clone())?);
    let clock = Arc::new(SystemClock::new(zone));
    let bind_addr = config.bind_addr.clone();
    let retention = config.interview.retention();

    let app_state = Arc::new(AppState::new(config, stores, generator, clock));

    // Finished interviews are dropped from the registry after the retention window.
    let pruning_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(retention.max(Duration::from_secs(30)));
        loop {
            interval.tick().await;
            pruning_state.registry.prune().await;
        }
    });

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    shutdown_telemetry();
    Ok(())
}

fn init_telemetry() -> opentelemetry_sdk::trace::Tracer {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;

    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4318".to_string());

    let resource = Resource::builder_empty()
        .with_service_name("mockinterview-api")
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let mut builder = SdkTracerProvider::builder().with_resource(resource);
    match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp_endpoint)
        .build()
    {
        Ok(exporter) => builder = builder.with_batch_exporter(exporter),
        Err(e) => eprintln!("WARNING: OTLP exporter disabled: {}", e),
    }
    let provider = builder.build();

    let tracer = provider.tracer("mockinterview-api");
    opentelemetry::global::set_tracer_provider(provider);

    tracer
}

fn shutdown_telemetry() {
    tracing::info!("Shutting down OpenTelemetry");
    // Dropping the global provider flushes the batch exporter.
}
