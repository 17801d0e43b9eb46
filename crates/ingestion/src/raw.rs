//! Track register decoding
//!
//! The timer hardware exposes one register block per notification:
//!
//! | offset | size | field                                          |
//! |--------|------|------------------------------------------------|
//! | 0      | 4×4  | lane finish values, µs since release, 0 = none |
//! | 16     | 1    | gate status (0 = up/armed, 1 = released)       |
//! | 17     | 1    | pin state, bit `n` set = lane `n` sensor ok    |
//! | 18     | 2    | reserved                                       |
//! | 20     | 4    | sensor loop frames per second                  |
//!
//! All multi-byte values are little-endian.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytemuck::{Pod, Zeroable};
use bytes::{BufMut, Bytes, BytesMut};
use contracts::{SensorEvent, SensorEventCallback, SensorSource};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{IngestionError, Result};

/// Lanes wired on the timer board
pub const TRACK_LANES: usize = 4;

/// Size of one register block
pub const FRAME_LEN: usize = std::mem::size_of::<RawTrackFrame>();

/// Blocks buffered between the UDP bridge and the decoder
const UDP_QUEUE: usize = 64;

const GATE_UP: u8 = 0;
const GATE_RELEASED: u8 = 1;

/// One register block, fields in host order after [`RawTrackFrame::parse`]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RawTrackFrame {
    pub lanes: [u32; TRACK_LANES],
    pub status: u8,
    pub pins: u8,
    pub reserved: [u8; 2],
    pub fps: u32,
}

impl RawTrackFrame {
    /// Decode one little-endian register block
    pub fn parse(source_id: &str, data: &[u8]) -> Result<Self> {
        if data.len() != FRAME_LEN {
            return Err(IngestionError::ParseFailed {
                source_id: source_id.to_string(),
                message: format!("expected {FRAME_LEN} bytes, got {}", data.len()),
            });
        }

        let raw: RawTrackFrame = bytemuck::pod_read_unaligned(data);
        if raw.status != GATE_UP && raw.status != GATE_RELEASED {
            return Err(IngestionError::ParseFailed {
                source_id: source_id.to_string(),
                message: format!("unknown gate status {}", raw.status),
            });
        }

        Ok(Self {
            lanes: raw.lanes.map(u32::from_le),
            fps: u32::from_le(raw.fps),
            ..raw
        })
    }

    /// Encode as the board would send it
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_LEN);
        for value in self.lanes {
            buf.put_u32_le(value);
        }
        buf.put_u8(self.status);
        buf.put_u8(self.pins);
        buf.put_slice(&self.reserved);
        buf.put_u32_le(self.fps);
        buf.freeze()
    }

    pub fn gate_released(&self) -> bool {
        self.status == GATE_RELEASED
    }

    pub fn lane_healthy(&self, lane: usize) -> bool {
        self.pins & (1 << lane) != 0
    }
}

/// Turns successive register blocks into sensor events
///
/// The first block only establishes a baseline (reporting unhealthy lanes).
/// After that, edges produce events: gate status changes, lanes going from
/// 0 to a finish value, and pin bit flips.
#[derive(Debug)]
pub struct TrackDecoder {
    source_id: String,
    previous: Option<RawTrackFrame>,
}

impl TrackDecoder {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            previous: None,
        }
    }

    /// Sensor loop rate from the last good block
    pub fn fps(&self) -> Option<u32> {
        self.previous.map(|f| f.fps)
    }

    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<SensorEvent>> {
        let frame = RawTrackFrame::parse(&self.source_id, data)?;
        let mut events = Vec::new();

        match self.previous {
            None => {
                for lane in 0..TRACK_LANES {
                    if !frame.lane_healthy(lane) {
                        events.push(SensorEvent::SensorHealth {
                            lane,
                            healthy: false,
                        });
                    }
                }
            }
            Some(prev) => {
                if prev.status != frame.status {
                    events.push(if frame.gate_released() {
                        SensorEvent::GateDown
                    } else {
                        SensorEvent::GateUp
                    });
                }

                for lane in 0..TRACK_LANES {
                    if prev.lanes[lane] == 0 && frame.lanes[lane] != 0 {
                        events.push(SensorEvent::LaneTrigger {
                            lane,
                            timestamp_micros: u64::from(frame.lanes[lane]),
                        });
                    }
                }

                for lane in 0..TRACK_LANES {
                    let healthy = frame.lane_healthy(lane);
                    if prev.lane_healthy(lane) != healthy {
                        events.push(SensorEvent::SensorHealth { lane, healthy });
                    }
                }
            }
        }

        trace!(source_id = %self.source_id, events = events.len(), fps = frame.fps, "frame decoded");
        self.previous = Some(frame);
        Ok(events)
    }
}

/// Sensor source fed with raw register blocks by a hardware bridge
pub struct RawTrackSource {
    source_id: String,
    frames: async_channel::Receiver<Bytes>,
    listening: Arc<AtomicBool>,
    parse_errors: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// UDP reader feeding `frames`, when bound with [`RawTrackSource::bind_udp`]
    bridge: Mutex<Option<JoinHandle<()>>>,
    local_addr: Option<SocketAddr>,
}

impl RawTrackSource {
    pub fn new(source_id: impl Into<String>, frames: async_channel::Receiver<Bytes>) -> Self {
        Self {
            source_id: source_id.into(),
            frames,
            listening: Arc::new(AtomicBool::new(false)),
            parse_errors: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
            bridge: Mutex::new(None),
            local_addr: None,
        }
    }

    /// Receive register blocks as UDP datagrams, one block per datagram
    pub async fn bind_udp(source_id: impl Into<String>, addr: SocketAddr) -> Result<Self> {
        let source_id = source_id.into();
        let socket = UdpSocket::bind(addr).await.map_err(|e| IngestionError::Bind {
            addr,
            message: e.to_string(),
        })?;
        let local_addr = socket.local_addr().unwrap_or(addr);
        let (tx, rx) = async_channel::bounded(UDP_QUEUE);

        let bridge_id = source_id.clone();
        let bridge = tokio::spawn(async move {
            // larger than a block so oversized datagrams reach the decoder
            let mut buf = [0u8; 256];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, peer)) => {
                        trace!(source_id = %bridge_id, %peer, len, "track block received");
                        if tx.send(Bytes::copy_from_slice(&buf[..len])).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(source_id = %bridge_id, error = %e, "track listener failed");
                        break;
                    }
                }
            }
            debug!(source_id = %bridge_id, "track listener closed");
        });

        info!(source_id = %source_id, addr = %local_addr, "listening for track blocks");
        let mut source = Self::new(source_id, rx);
        source.bridge = Mutex::new(Some(bridge));
        source.local_addr = Some(local_addr);
        Ok(source)
    }

    /// Bound UDP address, if any
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Blocks rejected by the decoder so far
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }
}

impl SensorSource for RawTrackSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: SensorEventCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            warn!(source_id = %self.source_id, "raw track source already listening");
            return;
        }

        let frames = self.frames.clone();
        let listening = self.listening.clone();
        let parse_errors = self.parse_errors.clone();
        let mut decoder = TrackDecoder::new(self.source_id.clone());
        let source_id = self.source_id.clone();

        debug!(source_id = %source_id, "raw track source started");
        let handle = tokio::spawn(async move {
            while let Ok(frame) = frames.recv().await {
                if !listening.load(Ordering::Relaxed) {
                    break;
                }
                match decoder.decode(&frame) {
                    Ok(events) => events.into_iter().for_each(|e| callback(e)),
                    Err(e) => {
                        parse_errors.fetch_add(1, Ordering::Relaxed);
                        warn!(source_id = %source_id, error = %e, "dropping undecodable frame");
                    }
                }
            }
            listening.store(false, Ordering::SeqCst);
            debug!(source_id = %source_id, "raw track source finished");
        });

        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
    }

    fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(source_id = %self.source_id, "stopping raw track source");
        }
        for slot in [&self.task, &self.bridge] {
            if let Ok(mut task) = slot.lock() {
                if let Some(handle) = task.take() {
                    handle.abort();
                }
            }
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}
