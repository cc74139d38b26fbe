use anyhow::{Context, Result};
use clap::Parser;
use entanglement_core::Settings;
use entanglement_exporter::{
    run_cycle, run_scrape_loop, AppState, CycleOptions, EntanglementMetrics, PostgresSource,
    RelationSource, Server,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "secgroup-entanglement-exporter")]
#[command(about = "Exports entanglement scores of Neutron security groups to Prometheus", long_about = None)]
#[command(version)]
struct Cli {
    /// Optional configuration file; environment variables take precedence
    #[arg(short, long, env = "ENTANGLEMENT_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single collection cycle, print the metrics and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(path) = &cli.config {
        info!(config = %path.display(), "loaded configuration file");
    }

    let schema = settings.schema();
    let options = CycleOptions {
        interval: settings.scrape_interval(),
        timeout: settings.cycle_timeout(),
        score_log_limit: settings.score_log_limit,
    };
    info!(
        neutron_release = %settings.neutron_release,
        project_id_column = schema.project_id_column,
        score_log_limit = options.score_log_limit,
        "starting security group entanglement exporter"
    );

    let listen_address = settings.listen_address;
    let source: Arc<dyn RelationSource> =
        Arc::new(PostgresSource::new(settings.postgres_uri, schema));
    let metrics = Arc::new(EntanglementMetrics::new()?);

    if cli.once {
        run_cycle(source.as_ref(), options.score_log_limit, &metrics)
            .await
            .context("collecting entanglement data")?;
        print!("{}", metrics.render()?);
        return Ok(());
    }

    let server = Server::new(listen_address, AppState::new(metrics.clone()));
    tokio::select! {
        res = run_scrape_loop(source, options, metrics) => {
            res.context("collecting entanglement data")?;
        }
        res = server.run() => {
            res.context("serving metrics")?;
        }
    }
    Ok(())
}
