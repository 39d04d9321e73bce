use log::{debug, info, trace, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use crate::events::MeasurementListener;
use crate::models::{Measurement, MeasurementSummary};

pub mod cleaner;
pub mod frame;
pub mod parser_factory;
pub mod telegram_parser;
pub mod utils;
pub mod value_parser;

#[cfg(test)]
pub(crate) mod sample_telegrams;

use frame::FrameAssembler;
use parser_factory::ParserFactory;
use telegram_parser::TelegramParser;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Checksum mismatch, calculated {expected} but telegram says {received}")]
    ChecksumMismatch { expected: String, received: String },
    #[error("Checksum {0:?} is not hexadecimal")]
    InvalidChecksum(String),
    #[error("Telegram exceeds {0} bytes")]
    BufferOverflow(usize),
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("No meter identifier present")]
    MissingMeterIdentifier,
    #[error("No DSMR version present and no override configured")]
    MissingVersion,
}

#[derive(Error, Debug)]
pub enum GasDetectionError {
    #[error("{0} does not match expected pattern")]
    MalformedValue(String),
    #[error("Unknown meter type {0}")]
    UnsupportedDeviceType(u32),
    #[error("Incomplete sub meter description on {0}")]
    Incomplete(String),
}

/// Holds the telegram parser once detection succeeded.
///
/// Detection runs while the lock is held, so of several callers only the first
/// builds a parser and all others reuse it.
#[derive(Default)]
pub struct ParserSlot {
    parser: Mutex<Option<Arc<TelegramParser>>>,
}

impl ParserSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<TelegramParser>> {
        self.parser.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_configured(&self) -> bool {
        self.get().is_some()
    }

    /// Returns the parser and whether this call created it
    pub fn get_or_try_configure<F>(&self, build: F) -> Result<(Arc<TelegramParser>, bool), DetectionError>
    where
        F: FnOnce() -> Result<TelegramParser, DetectionError>,
    {
        let mut slot = self.parser.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parser) = slot.as_ref() {
            return Ok((parser.clone(), false));
        }
        let parser = Arc::new(build()?);
        *slot = Some(parser.clone());
        Ok((parser, true))
    }
}

/// Takes complete telegrams, configures the parser on the first usable one
/// and hands meters and measurements to the registered listeners.
pub struct TelegramHandler {
    factory: ParserFactory,
    slot: Arc<ParserSlot>,
    listeners: Vec<Box<dyn MeasurementListener + Send>>,
    current: Option<MeasurementSummary>,
}

impl TelegramHandler {
    pub fn new(factory: ParserFactory) -> Self {
        Self::with_slot(factory, Arc::new(ParserSlot::new()))
    }

    /// Share the configured parser with other handlers
    pub fn with_slot(factory: ParserFactory, slot: Arc<ParserSlot>) -> Self {
        Self {
            factory,
            slot,
            listeners: Vec::new(),
            current: None,
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn MeasurementListener + Send>) {
        self.listeners.push(listener);
    }

    pub fn slot(&self) -> Arc<ParserSlot> {
        self.slot.clone()
    }

    pub fn current_summary(&self) -> Option<&MeasurementSummary> {
        self.current.as_ref()
    }

    pub fn put(&mut self, telegram: &str) {
        trace!("{}", telegram);

        if !self.slot.is_configured() {
            info!("No parser configured yet, create telegram parser based on seen telegram");
        }
        let factory = &self.factory;
        let (parser, created) = match self.slot.get_or_try_configure(|| factory.create(telegram)) {
            Ok(result) => result,
            Err(e) => {
                warn!("Could not create parser for telegram, ignoring telegram: {}", e);
                return;
            }
        };

        if created {
            info!(
                "Created parser for {} meter {} ({}) with {} meters",
                parser.dialect().version,
                parser.dialect().meter_identifier,
                parser.dialect().vendor_information,
                parser.mapping().len()
            );
            for listener in self.listeners.iter_mut() {
                listener.meters_discovered(parser.dialect(), parser.mapping());
            }
        }

        let measurements: HashSet<Measurement<'_>> = parser.parse(telegram);
        if measurements.is_empty() {
            warn!("Telegram yielded no measurements");
        }
        debug!("New measurement: {} values", measurements.len());

        self.current = Some(MeasurementSummary::from_measurements(&measurements));
        for listener in self.listeners.iter_mut() {
            listener.measurements_read(&measurements);
        }
    }
}

/// Byte level entry point: frames the P1 stream and feeds every verified
/// telegram straight into the handler.
pub struct P1Manager {
    assembler: FrameAssembler,
    handler: TelegramHandler,
}

impl P1Manager {
    pub fn new(factory: ParserFactory, max_telegram_size: usize) -> Self {
        Self {
            assembler: FrameAssembler::new(max_telegram_size),
            handler: TelegramHandler::new(factory),
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn MeasurementListener + Send>) {
        self.handler.add_listener(listener);
    }

    pub fn handler(&self) -> &TelegramHandler {
        &self.handler
    }

    pub fn start(&mut self) {
        info!("Starting P1 telegram reader");
        self.assembler.start();
    }

    pub fn stop(&mut self) {
        info!("Stopping P1 telegram reader");
        self.assembler.stop();
    }

    pub fn put_byte(&mut self, byte: u8) {
        if let Some(telegram) = self.assembler.push(byte) {
            self.handler.put(&telegram);
        }
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.put_byte(*byte);
        }
    }
}
