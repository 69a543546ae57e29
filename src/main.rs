use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::CronStream;
use apalis_sql::{postgres::PostgresStorage, Config as ApalisSqlConfig};
use clap::Parser;
use plover::{
    application::{
        error::AppError,
        jobs::{
            process_fanout_batch_job, process_fanout_job, process_purge_cache_job,
            purge_cache_schedule, FanoutBatchJobPayload, FanoutJobPayload, JobWorkerContext,
            PurgeCacheContext,
        },
        pagination::FeedPager,
        repos::{FriendshipsRepo, JobsRepo, NewsFeedsRepo, TweetsRepo},
    },
    cache::{BoundedListCache, ListCacheClient, MemoryCacheClient},
    config,
    domain::types::JobType,
    infra::{db::PostgresRepositories, error::InfraError, rows::RowRepositories, telemetry},
    rowstore::MemoryStore,
};
use tracing::{dispatcher, error, info, Dispatch, Level};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli_args = config::CliArgs::parse();
    let settings = config::load(&cli_args)
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    match cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::default()))
    {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let (repositories, _) = init_repositories(&settings).await?;
    repositories
        .health_check()
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    info!(target = "plover::migrate", "migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (repositories, job_repositories) = init_repositories(&settings).await?;

    let cache_client: Arc<dyn ListCacheClient> = Arc::new(MemoryCacheClient::new());
    let feed_cache = BoundedListCache::new(Arc::clone(&cache_client), &settings.cache);
    let pager = FeedPager::new(settings.pagination.page_size);

    let tweets: Arc<dyn TweetsRepo> = repositories.clone();
    let jobs: Arc<dyn JobsRepo> = repositories.clone();
    let (friendships, newsfeeds): (Arc<dyn FriendshipsRepo>, Arc<dyn NewsFeedsRepo>) =
        match settings.storage.backend {
            config::StorageBackend::Postgres => (repositories.clone(), repositories.clone()),
            config::StorageBackend::Rows => {
                let rows = Arc::new(RowRepositories::with_pager(
                    Arc::new(MemoryStore::new()),
                    pager,
                ));
                (rows.clone(), rows)
            }
        };

    let context = JobWorkerContext {
        tweets,
        friendships,
        newsfeeds,
        jobs,
        feed_cache,
        fanout_batch_size: settings.fanout.batch_size,
    };

    info!(
        target = "plover::serve",
        backend = ?settings.storage.backend,
        batch_size = settings.fanout.batch_size,
        "starting fanout workers"
    );
    run_job_monitor(job_repositories, context, cache_client, &settings.fanout).await
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresStorage::setup(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    let jobs_pool = PostgresRepositories::connect(
        database_url,
        settings.database.jobs_max_connections.get(),
    )
    .await
    .map_err(|err| InfraError::database(err.to_string()))?;

    Ok((
        Arc::new(PostgresRepositories::new(pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

async fn run_job_monitor(
    repositories: Arc<PostgresRepositories>,
    context: JobWorkerContext,
    cache_client: Arc<dyn ListCacheClient>,
    fanout: &config::FanoutSettings,
) -> Result<(), AppError> {
    let fanout_storage: PostgresStorage<FanoutJobPayload> = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::FanoutNewsfeeds.as_str()),
    );
    let batch_storage: PostgresStorage<FanoutBatchJobPayload> = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::FanoutBatch.as_str()),
    );

    let fanout_worker = WorkerBuilder::new("fanout-worker")
        .concurrency(fanout.main_concurrency.get() as usize)
        .data(context.clone())
        .backend(fanout_storage)
        .build_fn(process_fanout_job);
    let batch_worker = WorkerBuilder::new("fanout-batch-worker")
        .concurrency(fanout.batch_concurrency.get() as usize)
        .data(context)
        .backend(batch_storage)
        .build_fn(process_fanout_batch_job);

    // Hourly sweep of expired cache entries.
    let purge_ctx = PurgeCacheContext {
        client: cache_client,
    };
    let purge_worker = WorkerBuilder::new("purge-cache-worker")
        .data(purge_ctx)
        .backend(CronStream::new(purge_cache_schedule()))
        .build_fn(process_purge_cache_job);

    Monitor::new()
        .register(fanout_worker)
        .register(batch_worker)
        .register(purge_worker)
        .run_with_signal(tokio::signal::ctrl_c())
        .await
        .map_err(|err| AppError::unexpected(format!("job monitor stopped: {err}")))
}
