use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use bytes::{BufMut, BytesMut};
use ecosim_config::{SenderType, SerializerType, TransportConfig};
use ecosim_core::Rgba;
use ecosim_simulation::ParticleSimulationEngine;
use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport misconfigured: {0}")]
    Config(String),
}

// --- Snapshot ---

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ParticleFrame {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub species: usize,
}

/// Everything the renderer needs for one frame.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SimulationSnapshot {
    pub tick: u64,
    pub particles: Vec<ParticleFrame>,
    pub colors: Vec<Rgba>,
}

impl SimulationSnapshot {
    /// Must be taken between steps.
    pub fn from_engine(engine: &ParticleSimulationEngine) -> Self {
        let particles = engine
            .snapshot()
            .into_iter()
            .map(|state| ParticleFrame {
                position: state.position.to_array(),
                velocity: state.velocity.to_array(),
                species: state.species,
            })
            .collect();

        Self {
            tick: engine.tick_count(),
            particles,
            colors: engine.species_colors(),
        }
    }
}

// --- Traits ---
/// Turns a snapshot into one text frame.
pub trait Serializer: Send + Sync {
    fn serialize(&self, snapshot: &SimulationSnapshot) -> Result<String, TransportError>;
}

/// Sends serialized data to a destination.
pub trait Sender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

// --- Serializers ---

pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, snapshot: &SimulationSnapshot) -> Result<String, TransportError> {
        Ok(serde_json::to_string(snapshot)?)
    }
}

/// Compact little-endian frame, base64 encoded:
/// - 8 bytes: tick as u64
/// - 4 bytes: particle count as u32
/// - For each particle:
///   - 12 bytes: position x, y, z as f32
///   - 12 bytes: velocity x, y, z as f32
///   - 4 bytes: species as u32
///
/// Colors are not included; the JSON frame carries them.
pub struct BinarySerializer;

pub const BINARY_HEADER_LEN: usize = 8 + 4;
pub const BINARY_PARTICLE_LEN: usize = 6 * 4 + 4;

impl Serializer for BinarySerializer {
    fn serialize(&self, snapshot: &SimulationSnapshot) -> Result<String, TransportError> {
        let count = snapshot.particles.len();
        let mut buffer = BytesMut::with_capacity(BINARY_HEADER_LEN + count * BINARY_PARTICLE_LEN);

        buffer.put_u64_le(snapshot.tick);
        buffer.put_u32_le(count as u32);
        for particle in &snapshot.particles {
            for value in particle.position.iter().chain(&particle.velocity) {
                buffer.put_f32_le(*value);
            }
            buffer.put_u32_le(particle.species as u32);
        }

        Ok(base64::encode(&buffer))
    }
}

// --- Senders ---

/// Sends data to standard output, one frame per line.
pub struct StdioSender {
    stdout: io::Stdout,
}

impl StdioSender {
    pub fn new() -> Self {
        StdioSender { stdout: io::stdout() }
    }
}

impl Sender for StdioSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut out = self.stdout.lock();
        out.write_all(data)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

impl Default for StdioSender {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends one frame per line to a file, truncated on open.
pub struct FileSender {
    writer: BufWriter<File>,
}

impl FileSender {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let file = File::create(path)?;
        info!("Writing frames to {}", path.display());
        Ok(Self { writer: BufWriter::new(file) })
    }
}

impl Sender for FileSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(data)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Discards everything. Used for headless benchmarking.
pub struct NullSender;

impl Sender for NullSender {
    fn send(&mut self, _data: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
}

// --- Controller ---

pub struct TransportController {
    serializer: Box<dyn Serializer>,
    sender: Box<dyn Sender>,
    output_frequency: u32,
    frames_sent: u64,
}

impl TransportController {
    pub fn new(
        serializer: Box<dyn Serializer>,
        sender: Box<dyn Sender>,
        output_frequency: u32,
    ) -> Self {
        Self {
            serializer,
            sender,
            output_frequency: output_frequency.max(1),
            frames_sent: 0,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let serializer: Box<dyn Serializer> = match config.serializer {
            SerializerType::Json => Box::new(JsonSerializer),
            SerializerType::Binary => Box::new(BinarySerializer),
        };
        let sender: Box<dyn Sender> = match config.sender {
            SenderType::Stdio => Box::new(StdioSender::new()),
            SenderType::Null => Box::new(NullSender),
            SenderType::File => {
                let path = config
                    .output_path
                    .as_deref()
                    .ok_or_else(|| {
                        TransportError::Config("file sender needs output_path".to_string())
                    })?;
                Box::new(FileSender::create(path)?)
            }
        };
        debug!("Transport: {:?} over {:?}", config.serializer, config.sender);
        Ok(Self::new(serializer, sender, config.output_frequency))
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Serializes and sends the engine state if this tick is due.
    /// Returns whether a frame went out.
    pub fn export(&mut self, engine: &ParticleSimulationEngine) -> Result<bool, TransportError> {
        if engine.tick_count() % u64::from(self.output_frequency) != 0 {
            return Ok(false);
        }
        let snapshot = SimulationSnapshot::from_engine(engine);
        let frame = self.serializer.serialize(&snapshot)?;
        self.sender.send(frame.as_bytes())?;
        self.frames_sent += 1;
        Ok(true)
    }
}
