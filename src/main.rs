use anyhow::Context;
use operator::{
    api,
    cli::{output::Output, Cli, Commands},
    types::DataExtractionRequest,
    AppState, Dispatcher, ExtractionPipeline, OperatorConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(e) = run(cli, &output).await {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = OperatorConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command {
        None => {
            init_tracing(&config, cli.verbose);
            output.banner();
            serve(config, output).await
        }
        Some(Commands::Extract {
            urls,
            data_points,
            preserve_html,
        }) => {
            init_tracing(&config, cli.verbose);
            extract(config, urls, data_points, preserve_html).await
        }
        Some(Commands::Config { full, validate }) => show_config(&config, full, validate, output),
    }
}

fn init_tracing(config: &OperatorConfig, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "operator={0},operator_server={0},tower_http={0}",
            default_level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.server.log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(config: OperatorConfig, output: &Output) -> anyhow::Result<()> {
    let address = config.bind_address();
    let state = AppState::from_config(config)
        .await
        .context("Failed to initialize application state")?;

    let app = api::build_app(state);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!("Server listening on http://{}", address);
    output.info(&format!("Listening on http://{}", address));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn extract(
    config: OperatorConfig,
    urls: Vec<String>,
    data_points: Vec<String>,
    preserve_html: bool,
) -> anyhow::Result<()> {
    let dispatcher = Arc::new(Dispatcher::new(&config.provider_settings())?);
    let pipeline = ExtractionPipeline::new(dispatcher, config.dispatch.extraction_concurrency);

    let request = DataExtractionRequest {
        urls,
        data_points: (!data_points.is_empty()).then_some(data_points),
        output_format: "json".to_string(),
        preserve_html,
    };

    let envelope = pipeline.run(&request).await?;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn show_config(
    config: &OperatorConfig,
    full: bool,
    validate: bool,
    output: &Output,
) -> anyhow::Result<()> {
    if validate {
        config.validate()?;
        output.success("Configuration is valid");
    }

    if full {
        println!("{}", toml::to_string_pretty(config)?);
        return Ok(());
    }

    let settings = config.provider_settings();
    output.header("Server");
    output.kv("address", &config.bind_address());
    output.kv("log", &format!("{} ({})", config.server.log_level, config.server.log_format));
    output.kv("cors origins", &config.server.cors_origins.join(", "));

    output.header("Database");
    output.kv("url", &config.database.url);

    output.header("Provider");
    output.kv("api base", &settings.api_base);
    output.kv("chat model", &settings.chat_model);
    output.kv("extraction model", &settings.extraction_model);
    match settings.api_key {
        Some(_) => output.kv("api key", &format!("set ({})", settings.api_key_env)),
        None => output.warning(&format!("{} is not set", settings.api_key_env)),
    }

    output.header("Dispatch");
    output.kv("timeout", &format!("{}s", config.dispatch.timeout_secs));
    output.kv("fetch timeout", &format!("{}s", config.dispatch.fetch_timeout_secs));
    output.kv(
        "extraction concurrency",
        &config.dispatch.extraction_concurrency.to_string(),
    );
    output.kv(
        "record conversations",
        &config.dispatch.record_conversations.to_string(),
    );

    Ok(())
}
