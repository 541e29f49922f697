//! Emulated codec block.
//!
//! Behaves like the real component interface from the caller's side: formats
//! are staged and committed per port, buffers travel through pools, and every
//! completion arrives through a port callback on a worker thread owned by the
//! component. The decoder emits a deterministic I420 picture for each access
//! unit that carries a coded slice; the encoder produces a baseline JPEG.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{
    flags, Component, ComponentKind, Driver, DriverResult, DriverStatus, Encoding, Parameter,
    PortBuffer, PortCallback, PortFormat, PortId,
};
use crate::codec::h264::{split_access_unit, AccessUnitSummary};

const DEFAULT_STREAM_WIDTH: u32 = 640;
const DEFAULT_STREAM_HEIGHT: u32 = 480;
const DECODER_INPUT_BUFFER_SIZE: usize = 64 * 1024;
const ENCODER_OUTPUT_HEADROOM: usize = 64 * 1024;

/// A driver step that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Create,
    CommitInput,
    CommitOutput,
    EnableInput,
    EnableOutput,
    EnableComponent,
    /// Any buffer sent to either port.
    Send,
    /// Buffers sent to the input port only.
    SendInput,
}

impl FaultPoint {
    fn status(&self) -> DriverStatus {
        match self {
            FaultPoint::Create => DriverStatus::NoMemory,
            FaultPoint::CommitInput | FaultPoint::CommitOutput => DriverStatus::InvalidArgument,
            FaultPoint::EnableInput | FaultPoint::EnableOutput => DriverStatus::NoSpace,
            FaultPoint::EnableComponent => DriverStatus::NotImplemented,
            FaultPoint::Send | FaultPoint::SendInput => DriverStatus::Again,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Picture size reported on the decoder output port.
    pub stream_width: u32,
    pub stream_height: u32,
    /// Processing time per submitted buffer.
    pub latency: Duration,
    /// Accept input but never complete it.
    pub stall: bool,
    pub fault: Option<FaultPoint>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            stream_width: DEFAULT_STREAM_WIDTH,
            stream_height: DEFAULT_STREAM_HEIGHT,
            latency: Duration::ZERO,
            stall: false,
            fault: None,
        }
    }
}

/// Counters shared by a driver and every component it created.
#[derive(Debug, Default)]
pub struct SimStats {
    components_created: AtomicUsize,
    live_components: AtomicUsize,
    buffers_submitted: AtomicUsize,
    frames_completed: AtomicUsize,
}

impl SimStats {
    pub fn components_created(&self) -> usize {
        self.components_created.load(Ordering::SeqCst)
    }

    pub fn live_components(&self) -> usize {
        self.live_components.load(Ordering::SeqCst)
    }

    /// Input buffers accepted by any component.
    pub fn buffers_submitted(&self) -> usize {
        self.buffers_submitted.load(Ordering::SeqCst)
    }

    pub fn frames_completed(&self) -> usize {
        self.frames_completed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimDriver {
    config: SimConfig,
    stats: Arc<SimStats>,
}

impl SimDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SimConfig) -> Self {
        Self {
            config,
            stats: Arc::new(SimStats::default()),
        }
    }

    pub fn stream_size(mut self, width: u32, height: u32) -> Self {
        self.config.stream_width = width;
        self.config.stream_height = height;
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.config.latency = latency;
        self
    }

    pub fn stall(mut self) -> Self {
        self.config.stall = true;
        self
    }

    pub fn fail_at(mut self, fault: FaultPoint) -> Self {
        self.config.fault = Some(fault);
        self
    }

    pub fn stats(&self) -> Arc<SimStats> {
        Arc::clone(&self.stats)
    }
}

impl Driver for SimDriver {
    fn name(&self) -> &str {
        "emulated"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn create_component(&self, kind: ComponentKind) -> DriverResult<Box<dyn Component>> {
        if self.config.fault == Some(FaultPoint::Create) {
            return Err(FaultPoint::Create.status());
        }
        let component = SimComponent::spawn(kind, self.config.clone(), Arc::clone(&self.stats))
            .map_err(|e| {
                log::warn!("Failed to start {} worker: {}", kind.name(), e);
                DriverStatus::NoMemory
            })?;
        Ok(Box::new(component))
    }
}

struct PortState {
    staged: PortFormat,
    committed: PortFormat,
    callback: Option<PortCallback>,
    enabled: bool,
}

impl PortState {
    fn new(format: PortFormat) -> Self {
        Self {
            staged: format,
            committed: format,
            callback: None,
            enabled: false,
        }
    }
}

struct Shared {
    ports: [PortState; 2],
    enabled: bool,
    quality: u8,
    /// Output buffers handed over by the application.
    output_queue: VecDeque<PortBuffer>,
    /// Finished payloads waiting for an output buffer.
    ready: VecDeque<Vec<u8>>,
    /// Input held forever by a stalled component.
    held: Vec<PortBuffer>,
}

enum Job {
    Process(PortBuffer),
    Deliver,
}

struct Worker {
    kind: ComponentKind,
    config: SimConfig,
    shared: Arc<Mutex<Shared>>,
    dispatch: Arc<Mutex<()>>,
    stats: Arc<SimStats>,
}

pub struct SimComponent {
    kind: ComponentKind,
    config: SimConfig,
    shared: Arc<Mutex<Shared>>,
    // Held while a callback runs and while a port is disabled, so no callback
    // can start on a port once `disable_port` has returned.
    dispatch: Arc<Mutex<()>>,
    stats: Arc<SimStats>,
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl SimComponent {
    fn spawn(kind: ComponentKind, config: SimConfig, stats: Arc<SimStats>) -> std::io::Result<Self> {
        let (input, output) = match kind {
            ComponentKind::VideoDecoder => (Encoding::H264, Encoding::I420),
            ComponentKind::ImageEncoder => (Encoding::I420, Encoding::Jpeg),
        };
        let shared = Arc::new(Mutex::new(Shared {
            ports: [
                PortState::new(PortFormat::new(input, 0, 0)),
                PortState::new(PortFormat::new(output, 0, 0)),
            ],
            enabled: false,
            quality: 85,
            output_queue: VecDeque::new(),
            ready: VecDeque::new(),
            held: Vec::new(),
        }));
        let dispatch = Arc::new(Mutex::new(()));
        let (tx, rx) = unbounded();

        let worker = Worker {
            kind,
            config: config.clone(),
            shared: Arc::clone(&shared),
            dispatch: Arc::clone(&dispatch),
            stats: Arc::clone(&stats),
        };
        let handle = thread::Builder::new()
            .name(format!("sim-{}", kind.name()))
            .spawn(move || worker.run(rx))?;

        stats.components_created.fetch_add(1, Ordering::SeqCst);
        stats.live_components.fetch_add(1, Ordering::SeqCst);
        log::debug!("Created emulated {} component", kind.name());

        Ok(Self {
            kind,
            config,
            shared,
            dispatch,
            stats,
            jobs: Some(tx),
            worker: Some(handle),
        })
    }

    fn fault(&self, point: FaultPoint) -> DriverResult<()> {
        if self.config.fault == Some(point) {
            log::debug!("Injected fault at {:?}", point);
            return Err(point.status());
        }
        Ok(())
    }

    fn post(&self, job: Job) -> DriverResult<()> {
        match &self.jobs {
            Some(tx) => tx.send(job).map_err(|_| DriverStatus::NotConnected),
            None => Err(DriverStatus::NotConnected),
        }
    }
}

impl Component for SimComponent {
    fn kind(&self) -> ComponentKind {
        self.kind
    }

    fn set_format(&mut self, port: PortId, format: PortFormat) {
        self.shared.lock().ports[port.index()].staged = format;
    }

    fn commit_format(&mut self, port: PortId) -> DriverResult<()> {
        self.fault(match port {
            PortId::Input => FaultPoint::CommitInput,
            PortId::Output => FaultPoint::CommitOutput,
        })?;

        let mut shared = self.shared.lock();
        if shared.ports[port.index()].enabled {
            return Err(DriverStatus::AlreadyConnected);
        }
        let staged = shared.ports[port.index()].staged;
        let expected = match (self.kind, port) {
            (ComponentKind::VideoDecoder, PortId::Input) => Encoding::H264,
            (ComponentKind::VideoDecoder, PortId::Output) => Encoding::I420,
            (ComponentKind::ImageEncoder, PortId::Input) => Encoding::I420,
            (ComponentKind::ImageEncoder, PortId::Output) => Encoding::Jpeg,
        };
        if staged.encoding != expected {
            return Err(DriverStatus::InvalidArgument);
        }

        let mut committed = staged;
        match (self.kind, port) {
            (ComponentKind::VideoDecoder, PortId::Output) => {
                if committed.width == 0 || committed.height == 0 {
                    committed.width = self.config.stream_width;
                    committed.height = self.config.stream_height;
                }
            }
            (ComponentKind::ImageEncoder, PortId::Output) => {
                let input = shared.ports[PortId::Input.index()].committed;
                committed.width = input.width;
                committed.height = input.height;
            }
            _ => {}
        }
        shared.ports[port.index()].committed = committed;
        Ok(())
    }

    fn port_format(&self, port: PortId) -> PortFormat {
        self.shared.lock().ports[port.index()].committed
    }

    fn buffer_size(&self, port: PortId) -> usize {
        let format = self.port_format(port);
        match (self.kind, port) {
            (ComponentKind::VideoDecoder, PortId::Input) => DECODER_INPUT_BUFFER_SIZE,
            (ComponentKind::VideoDecoder, PortId::Output)
            | (ComponentKind::ImageEncoder, PortId::Input) => format.i420_frame_size(),
            (ComponentKind::ImageEncoder, PortId::Output) => {
                format.width as usize * format.height as usize * 4 + ENCODER_OUTPUT_HEADROOM
            }
        }
    }

    fn set_parameter(&mut self, parameter: Parameter) -> DriverResult<()> {
        match (self.kind, parameter) {
            (ComponentKind::ImageEncoder, Parameter::JpegQuality(q)) if (1..=100).contains(&q) => {
                self.shared.lock().quality = q;
                Ok(())
            }
            (ComponentKind::ImageEncoder, Parameter::JpegQuality(_)) => {
                Err(DriverStatus::InvalidArgument)
            }
            (ComponentKind::VideoDecoder, _) => Err(DriverStatus::NotImplemented),
        }
    }

    fn enable_port(&mut self, port: PortId, callback: PortCallback) -> DriverResult<()> {
        self.fault(match port {
            PortId::Input => FaultPoint::EnableInput,
            PortId::Output => FaultPoint::EnableOutput,
        })?;

        let mut shared = self.shared.lock();
        let state = &mut shared.ports[port.index()];
        if state.enabled {
            return Err(DriverStatus::AlreadyConnected);
        }
        state.callback = Some(callback);
        state.enabled = true;
        Ok(())
    }

    fn disable_port(&mut self, port: PortId) -> DriverResult<()> {
        let _dispatch = self.dispatch.lock();
        let flushed = {
            let mut shared = self.shared.lock();
            let state = &mut shared.ports[port.index()];
            if !state.enabled {
                return Err(DriverStatus::NotConnected);
            }
            state.enabled = false;
            state.callback = None;
            if port == PortId::Output {
                std::mem::take(&mut shared.output_queue)
            } else {
                VecDeque::new()
            }
        };
        // Buffers the port still held go back to their pool.
        drop(flushed);
        Ok(())
    }

    fn is_port_enabled(&self, port: PortId) -> bool {
        self.shared.lock().ports[port.index()].enabled
    }

    fn enable(&mut self) -> DriverResult<()> {
        self.fault(FaultPoint::EnableComponent)?;
        self.shared.lock().enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> DriverResult<()> {
        let mut shared = self.shared.lock();
        if !shared.enabled {
            return Err(DriverStatus::NotConnected);
        }
        shared.enabled = false;
        Ok(())
    }

    fn send_buffer(&mut self, port: PortId, buffer: PortBuffer) -> DriverResult<()> {
        self.fault(FaultPoint::Send)?;

        {
            let mut shared = self.shared.lock();
            if !shared.ports[port.index()].enabled {
                return Err(DriverStatus::NotReady);
            }
            if port == PortId::Output {
                shared.output_queue.push_back(buffer);
                drop(shared);
                return self.post(Job::Deliver);
            }

            self.fault(FaultPoint::SendInput)?;
            if buffer.length() == 0 {
                return Err(DriverStatus::InvalidArgument);
            }
            if self.kind == ComponentKind::ImageEncoder {
                let expected = shared.ports[PortId::Input.index()]
                    .committed
                    .i420_frame_size();
                if buffer.length() != expected {
                    log::debug!(
                        "Encoder input of {} bytes, expected {}",
                        buffer.length(),
                        expected
                    );
                    return Err(DriverStatus::InvalidArgument);
                }
            }
        }

        self.post(Job::Process(buffer))?;
        self.stats.buffers_submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for SimComponent {
    fn drop(&mut self) {
        {
            let _dispatch = self.dispatch.lock();
            let mut shared = self.shared.lock();
            for port in shared.ports.iter_mut() {
                port.enabled = false;
                port.callback = None;
            }
            shared.enabled = false;
        }
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Emulated {} worker panicked", self.kind.name());
            }
        }
        let mut shared = self.shared.lock();
        shared.output_queue.clear();
        shared.held.clear();
        shared.ready.clear();
        drop(shared);
        self.stats.live_components.fetch_sub(1, Ordering::SeqCst);
        log::debug!("Destroyed emulated {} component", self.kind.name());
    }
}

impl Worker {
    fn run(self, jobs: Receiver<Job>) {
        while let Ok(job) = jobs.recv() {
            match job {
                Job::Process(buffer) => self.process(buffer),
                Job::Deliver => {}
            }
            self.deliver();
        }
    }

    fn process(&self, input: PortBuffer) {
        if !self.config.latency.is_zero() {
            thread::sleep(self.config.latency);
        }

        if self.config.stall {
            log::debug!("Emulated {} stalled", self.kind.name());
            self.shared.lock().held.push(input);
            return;
        }

        let (formats, quality) = {
            let shared = self.shared.lock();
            (
                [
                    shared.ports[PortId::Input.index()].committed,
                    shared.ports[PortId::Output.index()].committed,
                ],
                shared.quality,
            )
        };

        let output = match self.kind {
            ComponentKind::VideoDecoder => decode(input.payload(), formats[1]),
            ComponentKind::ImageEncoder => encode(input.payload(), formats[0], quality),
        };

        self.dispatch(PortId::Input, input);

        if let Some(payload) = output {
            self.shared.lock().ready.push_back(payload);
        }
    }

    /// Pairs finished payloads with queued output buffers.
    fn deliver(&self) {
        loop {
            let (payload, mut buffer) = {
                let mut shared = self.shared.lock();
                if shared.ready.is_empty() || shared.output_queue.is_empty() {
                    return;
                }
                match (shared.ready.pop_front(), shared.output_queue.pop_front()) {
                    (Some(payload), Some(buffer)) => (payload, buffer),
                    _ => return,
                }
            };

            let written = payload.len().min(buffer.capacity());
            buffer.data_mut()[..written].copy_from_slice(&payload[..written]);
            if let Err(e) = buffer.set_payload(0, written) {
                log::warn!("Failed to mark {} output bytes: {}", written, e);
            }
            if written == payload.len() {
                buffer.set_flags(flags::FRAME_END);
            } else {
                log::warn!(
                    "Output of {} bytes truncated to buffer capacity {}",
                    payload.len(),
                    written
                );
            }

            self.stats.frames_completed.fetch_add(1, Ordering::SeqCst);
            self.dispatch(PortId::Output, buffer);
        }
    }

    fn dispatch(&self, port: PortId, buffer: PortBuffer) {
        let _dispatch = self.dispatch.lock();
        let callback = {
            let shared = self.shared.lock();
            let state = &shared.ports[port.index()];
            if state.enabled {
                state.callback.clone()
            } else {
                None
            }
        };
        match callback {
            Some(callback) => callback(buffer),
            None => drop(buffer),
        }
    }
}

fn decode(access_unit: &[u8], output: PortFormat) -> Option<Vec<u8>> {
    let units = match split_access_unit(access_unit) {
        Ok(units) => units,
        Err(e) => {
            log::warn!("Emulated decoder rejected access unit: {}", e);
            return None;
        }
    };
    let summary = AccessUnitSummary::of(&units);
    if !summary.has_picture() {
        log::debug!("Access unit without a coded slice, no picture produced");
        return None;
    }

    let width = output.width as usize;
    let height = output.height as usize;
    let seed = access_unit.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));

    let y_size = width * height;
    let uv_size = y_size / 4;
    let mut frame = vec![0u8; y_size + 2 * uv_size];
    let (y, chroma) = frame.split_at_mut(y_size);
    for (row, line) in y.chunks_mut(width.max(1)).enumerate() {
        for (col, px) in line.iter_mut().enumerate() {
            *px = ((row + col) as u8).wrapping_add(seed);
        }
    }
    let (u, v) = chroma.split_at_mut(uv_size);
    u.fill(0x80 ^ (seed & 0x0F));
    v.fill(0x80);
    Some(frame)
}

fn encode(input: &[u8], format: PortFormat, quality: u8) -> Option<Vec<u8>> {
    let width = format.width as usize;
    let height = format.height as usize;
    let y_size = width * height;
    let uv_size = y_size / 4;
    if input.len() < y_size + 2 * uv_size || y_size == 0 {
        return None;
    }

    let (y, uv) = input.split_at(y_size);
    let chroma_width = (width / 2).max(1);
    let mut rgb = Vec::with_capacity(y_size * 3);
    for row in 0..height {
        for col in 0..width {
            let luma = f32::from(y[row * width + col]);
            let (cb, cr) = if uv_size == 0 {
                (0.0, 0.0)
            } else {
                // Chroma arrives interleaved: U, V, U, V, ...
                let idx = ((row / 2) * chroma_width + col / 2).min(uv_size - 1);
                (
                    f32::from(uv[idx * 2]) - 128.0,
                    f32::from(uv[idx * 2 + 1]) - 128.0,
                )
            };
            rgb.push((luma + 1.402 * cr).clamp(0.0, 255.0) as u8);
            rgb.push((luma - 0.344_136 * cb - 0.714_136 * cr).clamp(0.0, 255.0) as u8);
            rgb.push((luma + 1.772 * cb).clamp(0.0, 255.0) as u8);
        }
    }

    let mut jpeg = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, quality);
    match encoder.encode(
        &rgb,
        format.width,
        format.height,
        image::ExtendedColorType::Rgb8,
    ) {
        Ok(()) => Some(jpeg),
        Err(e) => {
            log::warn!("Emulated encoder failed: {}", e);
            None
        }
    }
}
