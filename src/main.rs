use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dns_forwarder::cache::Cache;
use dns_forwarder::config::Config;
use dns_forwarder::forwarder::Forwarder;
use dns_forwarder::graceful_shutdown::GracefulShutdown;
use dns_forwarder::metrics::Metrics;
use dns_forwarder::pipeline::Pipeline;
use dns_forwarder::querylog::QueryLogRing;
use dns_forwarder::rules::{build_rule_set, Classifier, RuleSnapshot, RuleStore};
use dns_forwarder::server::{run_tcp, run_udp};
use dns_forwarder::subscriptions::{Fetcher, StaticRules, SubscriptionSource};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "fatal configuration error");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            error!(error = %err, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: Config) -> ExitCode {
    let cache = Arc::new(Cache::new(config.cache_max_entries, config.cache_min_ttl, config.cache_max_ttl));
    let metrics = Arc::new(match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialize metrics registry");
            return ExitCode::FAILURE;
        }
    });
    let querylog = Arc::new(QueryLogRing::new(config.query_log_capacity));

    let rules = Arc::new(RuleStore::new(RuleSnapshot {
        domestic: build_rule_set(config.rules_domestic.clone()),
        international: build_rule_set(config.rules_intl.clone()),
        ads: build_rule_set(config.rules_ads.clone()),
        version: 0,
    }));

    let classifier = Arc::new(Classifier::new(
        config.upstream_domestic.clone(),
        config.upstream_intl.clone(),
        config.upstream_ads_sink,
    ));

    let forwarder = Arc::new(Forwarder::new(config.upstream_timeout));

    let pipeline = Arc::new(Pipeline {
        cache: Arc::clone(&cache),
        cache_enabled: config.cache_enabled,
        rules: Arc::clone(&rules),
        classifier,
        forwarder,
        metrics: Arc::clone(&metrics),
        querylog,
        handler_timeout: config.handler_timeout,
    });

    let shutdown = Arc::new(GracefulShutdown::new());

    let mut tasks = Vec::new();

    let udp_pipeline = Arc::clone(&pipeline);
    let udp_bind = config.bind_udp;
    let udp_shutdown = shutdown.subscribe();
    tasks.push(tokio::spawn(async move {
        if let Err(err) = run_udp(udp_bind, udp_pipeline, udp_shutdown).await {
            error!(error = %err, "UDP listener exited with error");
        }
    }));

    let tcp_pipeline = Arc::clone(&pipeline);
    let tcp_bind = config.bind_tcp;
    let tcp_shutdown = shutdown.subscribe();
    tasks.push(tokio::spawn(async move {
        if let Err(err) = run_tcp(tcp_bind, tcp_pipeline, tcp_shutdown).await {
            error!(error = %err, "TCP listener exited with error");
        }
    }));

    if config.subscriptions_enabled {
        let sources: Vec<SubscriptionSource> = Vec::new();
        let static_rules = StaticRules {
            domestic: config.rules_domestic.clone(),
            international: config.rules_intl.clone(),
            ads: config.rules_ads.clone(),
        };
        let fetcher = Arc::new(Fetcher::new(
            Arc::clone(&rules),
            Arc::clone(&metrics),
            sources,
            static_rules,
            config.subscriptions_max_concurrent,
            config.subscriptions_max_errors,
            config.subscriptions_refresh_interval,
        ));
        let fetcher_shutdown = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            fetcher.run_scheduler(fetcher_shutdown).await;
        }));
    }

    info!(bind_udp = %config.bind_udp, bind_tcp = %config.bind_tcp, "dns-forwarder started");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
    }

    if let Err(err) = shutdown.shutdown().await {
        error!(error = %err, "error during graceful shutdown");
    }

    for task in tasks {
        task.abort();
    }

    ExitCode::SUCCESS
}
