use log::{debug, trace, warn};

use super::utils::{crc16_update, format_checksum, parse_checksum};
use super::FrameError;

pub const DEFAULT_MAX_TELEGRAM_SIZE: usize = 4096;

const START_CHARACTER: u8 = b'/';
const FINISH_CHARACTER: u8 = b'!';
const CHECKSUM_LENGTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Not started or shut down, every byte is ignored
    Disabled,
    /// Looking for the '/' that opens a telegram
    Waiting,
    Reading,
    /// Saw '!', collecting the (optional) CRC trailer
    Checksum,
}

/// Turns the raw P1 byte stream into checksum verified telegram texts.
///
/// Frames that grow beyond `max_size` bytes before the closing '!' are
/// dropped and the assembler goes back to waiting for the next '/'.
pub struct FrameAssembler {
    state: ReaderState,
    buffer: Vec<u8>,
    checksum: Vec<u8>,
    crc: u16,
    max_size: usize,
}

impl FrameAssembler {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: ReaderState::Disabled,
            buffer: Vec::with_capacity(max_size),
            checksum: Vec::with_capacity(CHECKSUM_LENGTH),
            crc: 0,
            max_size,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn start(&mut self) {
        if self.state == ReaderState::Disabled {
            debug!("Frame assembler started");
            self.reset(ReaderState::Waiting);
        }
    }

    /// Any partially read frame is dropped
    pub fn stop(&mut self) {
        debug!("Frame assembler stopped");
        self.reset(ReaderState::Disabled);
    }

    /// Feed a whole chunk, returning the telegrams completed by it in order
    pub fn push_all(&mut self, bytes: &[u8]) -> Vec<String> {
        bytes.iter().filter_map(|b| self.push(*b)).collect()
    }

    pub fn push(&mut self, byte: u8) -> Option<String> {
        match self.state {
            ReaderState::Disabled => None,
            ReaderState::Waiting => {
                if byte == START_CHARACTER {
                    debug!("Saw /, go to Reading");
                    self.reset(ReaderState::Reading);
                    self.buffer.push(byte);
                    self.crc = crc16_update(0, byte);
                }
                None
            }
            ReaderState::Reading => {
                if self.buffer.len() >= self.max_size {
                    warn!("{}", FrameError::BufferOverflow(self.max_size));
                    self.reset(ReaderState::Waiting);
                    // the byte may open the next telegram
                    return self.push(byte);
                }
                self.buffer.push(byte);
                self.crc = crc16_update(self.crc, byte);
                if byte == FINISH_CHARACTER {
                    debug!("Saw ! -> Checksum");
                    self.state = ReaderState::Checksum;
                    self.checksum.clear();
                }
                None
            }
            ReaderState::Checksum => {
                self.checksum.push(byte);
                if self.checksum.len() == CHECKSUM_LENGTH {
                    let result = self.verify_checksum();
                    let telegram = match result {
                        Ok(()) => Some(self.take_telegram()),
                        Err(e) => {
                            warn!("Dropping telegram: {}", e);
                            None
                        }
                    };
                    self.reset(ReaderState::Waiting);
                    telegram
                } else if byte == b'\r' || byte == b'\n' {
                    // Pre DSMR 4 meters send no checksum at all
                    debug!("No checksum after !, accepting telegram");
                    let telegram = self.take_telegram();
                    self.reset(ReaderState::Waiting);
                    Some(telegram)
                } else {
                    None
                }
            }
        }
    }

    fn verify_checksum(&self) -> Result<(), FrameError> {
        let received = parse_checksum(&self.checksum)
            .ok_or_else(|| FrameError::InvalidChecksum(String::from_utf8_lossy(&self.checksum).into_owned()))?;
        debug!("Done reading checksum: {} vs {}", format_checksum(received), format_checksum(self.crc));
        if received != self.crc {
            return Err(FrameError::ChecksumMismatch {
                expected: format_checksum(self.crc),
                received: format_checksum(received),
            });
        }
        Ok(())
    }

    fn take_telegram(&mut self) -> String {
        let telegram = String::from_utf8_lossy(&self.buffer).into_owned();
        trace!("read telegram: {}", telegram);
        telegram
    }

    fn reset(&mut self, state: ReaderState) {
        self.buffer.clear();
        self.checksum.clear();
        self.crc = 0;
        self.state = state;
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TELEGRAM_SIZE)
    }
}
