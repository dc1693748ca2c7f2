use anyhow::Context;
use fbserial::console::{format_status, parse_line, ConsoleCommand, HELP};
use fbserial::{
    init_logging, list_ports, spawn, Config, Device, DeviceEvent, JsonParameterStore,
    LineTransport, MemoryParameterStore, ParameterReconciler, ParameterStore, RealSerialPort,
    BUILD_DATE, VERSION,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

fn load_config() -> anyhow::Result<Config> {
    let path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => Config::default_path()?,
    };
    Config::load_or_default(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))
}

fn open_store(config: &Config) -> anyhow::Result<Box<dyn ParameterStore + Send>> {
    let store: Box<dyn ParameterStore + Send> = match &config.parameters.database_path {
        Some(path) => Box::new(
            JsonParameterStore::open(path)
                .with_context(|| format!("opening parameter database {}", path.display()))?,
        ),
        None => Box::new(MemoryParameterStore::new()),
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("fbserial {} (built {})", VERSION, BUILD_DATE);

    let config = load_config()?;

    let port = match RealSerialPort::open(&config.connection) {
        Ok(port) => port,
        Err(e) => {
            println!("{}", e);
            let candidates = list_ports().unwrap_or_default();
            if candidates.is_empty() {
                println!("No controller ports found");
            } else {
                println!("Available ports:");
                for info in candidates {
                    println!("  {}", info);
                }
            }
            return Err(e.into());
        }
    };

    let device = Device::new(LineTransport::new(port), config.engine.clone());
    let reconciler = ParameterReconciler::new(open_store(&config)?)?;
    let (handle, mut engine) = spawn(device, reconciler);

    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DeviceEvent::StatusChanged(diff)) => println!("{}", diff),
                Ok(DeviceEvent::MessageReceived(message)) => {
                    if !message.is_report() {
                        println!("{}", message);
                    }
                }
                Ok(DeviceEvent::Closed) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Console missed {} device events", missed);
                }
            }
        }
    });

    if config.parameters.check_on_connect {
        match handle.check_parameters().await {
            Ok(outcome) => println!("{}", outcome),
            Err(e) => println!("Parameter check failed: {}", e),
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut engine => break,
        };
        let Some(line) = line else {
            break;
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            ConsoleCommand::Device(command) => {
                if let Err(e) = handle.execute(command).await {
                    println!("{}", e);
                }
            }
            ConsoleCommand::CheckParameters => match handle.check_parameters().await {
                Ok(outcome) => println!("{}", outcome),
                Err(e) => println!("{}", e),
            },
            ConsoleCommand::Status => println!("{}", format_status(&handle.status())),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => break,
        }
    }

    drop(handle);
    let _ = printer.await;
    println!("bye!");
    Ok(())
}
