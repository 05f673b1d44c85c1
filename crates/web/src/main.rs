use std::{env, sync::Arc};

use database::{DatabaseConnectionInfo, PgDatabase};
use incidents::{client::Client, moderation::ModerationConfig};
use log::{error, info, warn};
use navigation::{
    config::NavigationConfig,
    itinerary::Navigator,
    window::{HttpIncidentWindow, IncidentWindow, LocalIncidentWindow},
};
use tokio_util::sync::CancellationToken;
use web::{start_web_server, WebState, DEFAULT_BIND_ADDRESS};

#[tokio::main]
async fn main() {
    env_logger::init();

    // database
    let database_connection_info = DatabaseConnectionInfo::from_env()
        .expect("expected database connection info in env.");
    let database = PgDatabase::connect(database_connection_info)
        .await
        .expect("could not connect to database.");

    // incidents
    let mut incident_client = Client::new(database, ModerationConfig::from_env());
    if let Ok(margin) = env::var("INCIDENT_NEARBY_MARGIN") {
        match margin.parse() {
            Ok(margin) => incident_client = incident_client.with_nearby_margin(margin),
            Err(why) => warn!("ignoring INCIDENT_NEARBY_MARGIN='{}': {}", margin, why),
        }
    }
    let incident_client = Arc::new(incident_client);

    // navigation
    let navigation_config =
        NavigationConfig::from_env().expect("expected TOMTOM_API_KEY in env.");
    let window: Arc<dyn IncidentWindow> = match &navigation_config.incident_service_url {
        Some(url) => {
            info!("reading incidents from {}", url);
            Arc::new(HttpIncidentWindow::new(reqwest::Client::new(), url))
        }
        None => Arc::new(LocalIncidentWindow::new(incident_client.clone())),
    };
    let navigator = Navigator::from_config(&navigation_config, window)
        .expect("could not set up navigation.");

    // shutdown on ctrl-c
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutting down");
                trigger.cancel();
            }
            Err(why) => error!("cannot listen for ctrl-c: {}", why),
        }
    });

    // web server
    let bind_address =
        env::var("WEB_BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_owned());
    let web_future = start_web_server(
        WebState {
            incident_client,
            navigator: Arc::new(navigator),
            shutdown,
        },
        &bind_address,
    );

    if let Err(why) = web_future.await {
        error!("web server stopped: {}", why);
    }
}
