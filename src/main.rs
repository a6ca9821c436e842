//! pgxport - run one SQL query against PostgreSQL and save the rows as an
//! Excel workbook.

mod cli;

use cli::Cli;
use pgxport::config::Config;
use pgxport::db::PostgresConnector;
use pgxport::logging;
use pgxport::pipeline::{self, Pipeline};
use pgxport::status::Console;
use tracing::{debug, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    Cli::parse_args();
    logging::init_stderr_logging();

    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => debug!("Ignoring .env: {e}"),
    }

    let config_path = Config::default_path();
    info!("Loading config from: {}", config_path.display());

    let connector = PostgresConnector::new();
    let mut console = Console::stdio();
    let outcome = Pipeline::new(&connector)
        .run(&config_path, &mut console)
        .await;

    std::process::exit(pipeline::exit_code(&outcome));
}
