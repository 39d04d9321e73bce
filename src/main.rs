use log::{error, info};
use p1meter::{ChannelListener, Config, ConfigError, P1Manager, ParserFactory};
use std::io::{Error, ErrorKind};
use tokio::io::{AsyncRead, AsyncReadExt};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    let default_filter = std::env::var("P1_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::NotFound) => {
            info!("No config file found, using defaults");
            Config::default()
        }
        Err(e) => {
            error!("{e}");
            return Err(Error::new(ErrorKind::InvalidData, e.to_string()));
        }
    };

    let factory = ParserFactory::from_config(&config.parser).map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;

    // the listener hands results to the printer task
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => error!("Unable to serialize event: {e:?}"),
            }
        }
    });

    let mut manager = P1Manager::new(factory, config.device.max_telegram_size);
    manager.add_listener(Box::new(ChannelListener::new(tx)));

    let mut source: Box<dyn AsyncRead + Unpin> = if config.device.path == "-" {
        info!("Reading P1 telegrams from stdin");
        Box::new(tokio::io::stdin())
    } else {
        info!("Reading P1 telegrams from {}", config.device.path);
        Box::new(tokio::fs::File::open(&config.device.path).await?)
    };

    manager.start();
    let mut buffer = vec![0u8; config.device.read_buffer_size.max(1)];
    loop {
        let read = source.read(&mut buffer).await?;
        if read == 0 {
            info!("End of input reached");
            break;
        }
        manager.put_bytes(&buffer[..read]);
    }
    manager.stop();

    // dropping the manager closes the channel, the printer drains and exits
    drop(manager);
    let _ = printer.await;
    Ok(())
}
