use std::sync::Arc;
use std::time::Duration;

use super::gate::{CompletionGate, GateState, WaitOutcome};
use crate::error::{Result, SnapError};
use crate::hw::{
    flags, BufferPool, Component, ComponentKind, Driver, Parameter, PortBuffer, PortFormat,
    PortId,
};

/// Buffers per port. One in flight at a time keeps the completion argument
/// trivial: a buffer cannot be reused while the hardware still owns it.
pub const BUFFERS_PER_PORT: usize = 1;

/// What a pipeline asks of its component.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub kind: ComponentKind,
    /// Used in messages: "decoder" or "encoder".
    pub label: &'static str,
    pub input: PortFormat,
    pub output: PortFormat,
    pub parameters: Vec<Parameter>,
    /// Lower bound for the input buffer size; the port's recommendation wins
    /// when larger.
    pub min_input_buffer_size: usize,
}

/// One hardware component with its ports, pools and completion gate.
///
/// Fields are filled in step by step by [`open`](Self::open); a failed open
/// leaves whatever was built so far, and [`close`](Self::close) tears down
/// exactly that. `close` is idempotent.
#[derive(Default)]
pub struct CodecSession {
    setup: Option<SessionSetup>,
    component: Option<Box<dyn Component>>,
    input_pool: Option<BufferPool>,
    output_pool: Option<BufferPool>,
    gate: Option<Arc<CompletionGate>>,
    ports_enabled: [bool; 2],
    component_enabled: bool,
    ready: bool,
}

impl CodecSession {
    pub fn open(&mut self, driver: &dyn Driver, setup: SessionSetup) -> Result<()> {
        let label = setup.label;
        log::debug!("Opening {} on {} driver", label, driver.name());

        let component = driver.create_component(setup.kind).map_err(|status| {
            SnapError::driver(format!("Failed to create {} component", label), status)
        })?;
        self.component = Some(component);
        self.gate = Some(CompletionGate::new());
        self.setup = Some(setup.clone());

        self.configure_ports(&setup)?;
        for parameter in &setup.parameters {
            self.set_parameter(*parameter)?;
        }
        self.enable_ports()?;
        self.create_pools(&setup)?;

        let component = self.component_mut()?;
        component
            .enable()
            .map_err(|status| SnapError::driver(format!("Failed to enable {}", label), status))?;
        self.component_enabled = true;
        self.ready = true;

        log::debug!(
            "{} ready: input {:?}, output {:?}",
            label,
            self.port_format(PortId::Input),
            self.port_format(PortId::Output)
        );
        Ok(())
    }

    fn component_mut(&mut self) -> Result<&mut Box<dyn Component>> {
        let label = self.label();
        self.component
            .as_mut()
            .ok_or_else(|| SnapError::InvalidInput(format!("Hardware {} not ready", label)))
    }

    fn label(&self) -> &'static str {
        self.setup.as_ref().map_or("component", |setup| setup.label)
    }

    fn configure_ports(&mut self, setup: &SessionSetup) -> Result<()> {
        let component = self.component_mut()?;
        component.set_format(PortId::Input, setup.input);
        component.set_format(PortId::Output, setup.output);
        component
            .commit_format(PortId::Input)
            .map_err(|status| SnapError::driver("Failed to commit input format", status))?;
        component
            .commit_format(PortId::Output)
            .map_err(|status| SnapError::driver("Failed to commit output format", status))?;
        Ok(())
    }

    fn set_parameter(&mut self, parameter: Parameter) -> Result<()> {
        let component = self.component_mut()?;
        component.set_parameter(parameter).map_err(|status| match parameter {
            Parameter::JpegQuality(_) => SnapError::driver("Failed to set JPEG quality", status),
        })
    }

    fn enable_ports(&mut self) -> Result<()> {
        let gate = match &self.gate {
            Some(gate) => Arc::clone(gate),
            None => return Err(SnapError::InvalidInput("Completion gate missing".into())),
        };

        let component = self.component_mut()?;
        component
            .enable_port(PortId::Output, gate.output_callback())
            .map_err(|status| SnapError::driver("Failed to enable output port", status))?;
        self.ports_enabled[PortId::Output.index()] = true;

        let component = self.component_mut()?;
        component
            .enable_port(PortId::Input, CompletionGate::input_callback())
            .map_err(|status| SnapError::driver("Failed to enable input port", status))?;
        self.ports_enabled[PortId::Input.index()] = true;
        Ok(())
    }

    fn create_pools(&mut self, setup: &SessionSetup) -> Result<()> {
        let component = self.component_mut()?;
        let input_size = component
            .buffer_size(PortId::Input)
            .max(setup.min_input_buffer_size);
        let output_size = component.buffer_size(PortId::Output);

        let input = BufferPool::new(
            format!("{} input", setup.label),
            BUFFERS_PER_PORT,
            input_size,
        )
        .map_err(|_| SnapError::ResourceExhausted("Failed to create input pool".into()))?;
        self.input_pool = Some(input);

        let output = BufferPool::new(
            format!("{} output", setup.label),
            BUFFERS_PER_PORT,
            output_size,
        )
        .map_err(|_| SnapError::ResourceExhausted("Failed to create output pool".into()))?;
        self.output_pool = Some(output);
        Ok(())
    }

    fn disable_ports(&mut self) {
        let label = self.label();
        let ports_enabled = self.ports_enabled;
        if let Some(component) = self.component.as_mut() {
            for port in [PortId::Input, PortId::Output] {
                if ports_enabled[port.index()] {
                    if let Err(status) = component.disable_port(port) {
                        log::warn!("Failed to disable {} {} port: {}", label, port.name(), status);
                    }
                }
            }
        }
        self.ports_enabled = [false; 2];
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn port_format(&self, port: PortId) -> Option<PortFormat> {
        self.component.as_ref().map(|c| c.port_format(port))
    }

    /// Payload capacity of the input buffer.
    pub fn input_capacity(&self) -> usize {
        self.input_pool.as_ref().map_or(0, BufferPool::buffer_size)
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.as_ref().map_or(GateState::Idle, |gate| gate.state())
    }

    /// Re-commits the input format, rebuilding both ports and pools.
    ///
    /// A no-op when the committed input format already matches.
    pub fn reconfigure_input(&mut self, input: PortFormat) -> Result<()> {
        if !self.ready {
            return Err(SnapError::InvalidInput(format!(
                "Hardware {} not ready",
                self.label()
            )));
        }
        if self.port_format(PortId::Input) == Some(input) {
            return Ok(());
        }
        let mut setup = match self.setup.clone() {
            Some(setup) => setup,
            None => return Err(SnapError::InvalidInput("Session has no configuration".into())),
        };
        log::debug!("Reconfiguring {} input to {:?}", setup.label, input);

        // Ready is only restored once every step below has succeeded.
        self.ready = false;
        self.disable_ports();
        self.input_pool = None;
        self.output_pool = None;

        setup.input = input;
        self.configure_ports(&setup)?;
        self.enable_ports()?;
        self.create_pools(&setup)?;
        self.setup = Some(setup);
        self.ready = true;
        Ok(())
    }

    /// Hands every free output buffer to the output port.
    fn prime_output(&mut self) -> Result<()> {
        let pool = match &self.output_pool {
            Some(pool) => pool.clone(),
            None => return Ok(()),
        };
        while let Some(buffer) = pool.acquire() {
            let component = self.component_mut()?;
            component
                .send_buffer(PortId::Output, buffer)
                .map_err(|status| SnapError::driver("Failed to send output buffer", status))?;
        }
        Ok(())
    }

    /// Submits one complete frame and blocks for its result.
    ///
    /// `fill` writes the input payload into the acquired buffer. The returned
    /// buffer goes back to its pool when dropped; copy the payload out first.
    pub fn submit_and_wait<F>(&mut self, fill: F, timeout: Duration, product: &str) -> Result<PortBuffer>
    where
        F: FnOnce(&mut PortBuffer) -> Result<()>,
    {
        let label = self.label();
        if !self.ready {
            return Err(SnapError::InvalidInput(format!("Hardware {} not ready", label)));
        }
        let gate = match &self.gate {
            Some(gate) => Arc::clone(gate),
            None => return Err(SnapError::InvalidInput(format!("Hardware {} not ready", label))),
        };

        gate.reset();
        self.prime_output()?;

        let mut buffer = self
            .input_pool
            .as_ref()
            .and_then(BufferPool::acquire)
            .ok_or_else(|| SnapError::ResourceExhausted("No input buffer available".into()))?;
        fill(&mut buffer)?;
        buffer.set_flags(flags::FRAME_END);
        let submitted = buffer.length();

        gate.mark_submitted();
        let component = self.component_mut()?;
        if let Err(status) = component.send_buffer(PortId::Input, buffer) {
            gate.mark_failed();
            return Err(SnapError::driver("Failed to send buffer", status));
        }
        log::debug!("Submitted {} bytes to {}", submitted, label);

        match gate.wait(timeout) {
            WaitOutcome::Completed(buffer) => {
                if buffer.length() == 0 {
                    return Err(SnapError::Conversion(format!("No frame {}", product)));
                }
                log::debug!("{} returned {} bytes", label, buffer.length());
                Ok(buffer)
            }
            WaitOutcome::TimedOut => {
                log::warn!("{} did not complete within {:?}", label, timeout);
                Err(SnapError::Timeout(format!(
                    "Timeout waiting for {} frame",
                    product
                )))
            }
        }
    }

    /// Tears down whatever `open` built. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.component.is_some() {
            let label = self.label();
            log::debug!("Closing {}", label);

            // Ports go first so no callback can land on state freed below.
            self.disable_ports();
            if self.component_enabled {
                if let Some(component) = self.component.as_mut() {
                    if let Err(status) = component.disable() {
                        log::warn!("Failed to disable {}: {}", label, status);
                    }
                }
            }
        }

        self.ready = false;
        self.component_enabled = false;
        self.ports_enabled = [false; 2];
        self.input_pool = None;
        self.output_pool = None;
        self.component = None;
        self.gate = None;
        self.setup = None;
    }
}

impl Drop for CodecSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CodecSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecSession")
            .field("label", &self.label())
            .field("component", &self.component.as_ref().map(|c| c.kind()))
            .field("ports_enabled", &self.ports_enabled)
            .field("component_enabled", &self.component_enabled)
            .field("ready", &self.ready)
            .finish()
    }
}
