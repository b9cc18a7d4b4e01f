//! ES Query CLI
//!
//! Runs one query against an Elasticsearch resource and prints the port and value.

use clap::Parser;
use es_query::{
    ElasticCredentials, ElasticQueryAction, NamedEntity, QueryConfig, StaticCredentials, DEFAULT_QUERY,
};
use es_storage_core::config::LoggingConfig;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const RESOURCE_ID: &str = "cli";

#[derive(Parser, Debug)]
#[command(name = "es-query")]
#[command(about = "Query an Elasticsearch index once")]
#[command(version)]
struct Args {
    /// Elasticsearch url
    #[arg(long, env = "ES_URL", default_value = "localhost")]
    url: String,

    /// Port applied when the url has none
    #[arg(long, env = "ES_PORT")]
    port: Option<u16>,

    /// Scheme for urls without one (http or https)
    #[arg(long, env = "ES_SCHEME")]
    scheme: Option<String>,

    #[arg(long, env = "ES_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "ES_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Index to search
    #[arg(long, env = "ES_INDEX")]
    index: String,

    /// Query DSL as JSON
    #[arg(long, default_value = DEFAULT_QUERY)]
    query: String,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format: json or pretty
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    log_format: String,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "pretty" {
        registry.with(fmt::layer().pretty().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(&LoggingConfig {
        level: args.log_level.clone(),
        format: args.log_format.clone(),
    });

    info!(version = env!("CARGO_PKG_VERSION"), index = %args.index, "Starting es-query");

    let loader = StaticCredentials::new().with(
        RESOURCE_ID,
        ElasticCredentials {
            url: args.url,
            port: args.port,
            scheme: args.scheme,
            username: args.username,
            password: args.password,
        },
    );

    let config = QueryConfig {
        source: NamedEntity {
            id: RESOURCE_ID.to_string(),
            name: "command line".to_string(),
        },
        index: args.index,
        query: args.query,
    };

    let action = ElasticQueryAction::build(config, &loader).await?;
    let result = action.run(&serde_json::Value::Null).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
