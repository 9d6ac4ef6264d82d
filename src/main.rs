use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uconnect_mqtt_bridge::bridge::{
    CommandDispatcher, CycleOptions, ForceRefresh, LoopController, SyncCycle, Timings,
};
use uconnect_mqtt_bridge::config::{Config, load_dotenv};
use uconnect_mqtt_bridge::error::{BridgeError, Result};
use uconnect_mqtt_bridge::home::rest::HaRestApi;
use uconnect_mqtt_bridge::mqtt::MqttClient;
use uconnect_mqtt_bridge::telematics::TelematicsClient;
use uconnect_mqtt_bridge::telematics::fake::FakeTelematicsClient;

const MQTT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "uconnect-mqtt-bridge")]
#[command(about = "Publish Uconnect vehicle data to Home Assistant over MQTT")]
struct Cli {
    /// Dotenv file read before the environment
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Use the built-in demo vehicle instead of the Uconnect service
    #[arg(long)]
    fake_api: bool,
}

fn init_logger(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn main() {
    let cli = Cli::parse();
    // No runtime yet: the process is still single-threaded here.
    load_dotenv(&cli.env_file);

    let config = match Config::from_env() {
        Ok(mut config) => {
            config.debug |= cli.debug;
            config.use_fake_api |= cli.fake_api;
            config
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    init_logger(config.debug);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start the async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    config.validate()?;
    info!("Starting Uconnect MQTT bridge");
    info!("Configuration:\n{}", config.to_string_without_secrets());

    let start_delay = Duration::from_secs(config.sync.start_delay_seconds);
    info!("Delaying start by {}s", start_delay.as_secs());
    tokio::time::sleep(start_delay).await;

    if config.fca.brand.is_experimental() {
        warn!(
            "Support for {} is experimental and might not work at all",
            config.fca.brand
        );
    }

    let telematics: Arc<dyn TelematicsClient> = if config.use_fake_api {
        warn!("Using the fake API, no real vehicle data is fetched");
        Arc::new(FakeTelematicsClient::new())
    } else {
        return Err(BridgeError::Config(
            "No Uconnect client is available in this build, set FCAUCONNECT_USEFAKEAPI=true"
                .into(),
        ));
    };

    let cancel = CancellationToken::new();

    let mqtt = MqttClient::new(&config.mqtt);
    let publisher = mqtt.publisher();
    let (connected_tx, connected_rx) = oneshot::channel();
    let mqtt_task = tokio::spawn(mqtt.run(Some(connected_tx), cancel.clone()));

    info!(
        "Connecting to MQTT broker {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    match tokio::time::timeout(MQTT_CONNECT_TIMEOUT, connected_rx).await {
        Ok(Ok(())) => {}
        _ => {
            cancel.cancel();
            let _ = mqtt_task.await;
            return Err(BridgeError::Mqtt(format!(
                "could not connect to {}:{} within {}s",
                config.mqtt.broker_host,
                config.mqtt.broker_port,
                MQTT_CONNECT_TIMEOUT.as_secs()
            )));
        }
    }

    let home = HaRestApi::new(&config.home_assistant.url, &config.home_assistant.token)?;
    let refresh = Arc::new(ForceRefresh::new());
    let dispatcher = Arc::new(CommandDispatcher::new(
        telematics.clone(),
        config.fca.pin.clone(),
        Timings::default().command_settle,
    ));

    let options = CycleOptions {
        auto_refresh_location: config.sync.auto_refresh_location,
        auto_refresh_battery: config.sync.auto_refresh_battery,
        convert_km_to_miles: config.sync.convert_km_to_miles,
        enable_dangerous_commands: config.sync.enable_dangerous_commands,
        dev_mode: config.dev_mode,
    };
    let cycle = SyncCycle::new(
        telematics,
        Arc::new(publisher),
        Arc::new(home),
        dispatcher,
        refresh.clone(),
        options,
        Timings::default(),
    );

    let interval = Duration::from_secs(u64::from(config.sync.refresh_interval) * 60);
    let controller = LoopController::new(cycle, refresh, interval);
    let controller_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { controller.run(cancel).await })
    };

    info!("Bridge is running, press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    cancel.cancel();
    if let Err(e) = controller_task.await {
        error!("Sync loop task failed: {}", e);
    }
    if let Err(e) = mqtt_task.await {
        error!("MQTT task failed: {}", e);
    }

    info!("Bridge stopped");
    Ok(())
}
