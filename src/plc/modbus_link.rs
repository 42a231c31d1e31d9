// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP register link
//!
//! The controller exposes its memory through a Modbus TCP gateway:
//!
//! - a byte cell `VBn` is holding register `n`, the value is carried in the low byte
//! - a float cell `VDn` is the two holding registers `n` and `n + 1`, most
//!   significant word first, which yields the four big-endian float bytes
//! - a command bit `Mx.y` is coil `x * 8 + y`

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::time::timeout;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use super::error::LinkError;
use super::link::RegisterLink;

/// Register link speaking Modbus TCP to the controller gateway.
pub struct ModbusTcpLink {
    host: String,
    port: u16,
    unit_id: u8,
    response_timeout: Duration,
    context: Option<Context>,
}

impl ModbusTcpLink {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id: 1,
            response_timeout: Duration::from_secs(1),
            context: None,
        }
    }

    /// Set the Modbus unit identifier
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Set the per-request response timeout
    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn resolve(
        &self,
    ) -> impl std::future::Future<Output = Result<SocketAddr, LinkError>> + Send + 'static {
        let host = self.host.clone();
        let port = self.port;
        let endpoint = self.endpoint();
        async move {
            tokio::net::lookup_host((host.as_str(), port))
                .await
                .map_err(|e| LinkError::ConnectionLost(format!("cannot resolve {}: {}", endpoint, e)))?
                .next()
                .ok_or_else(|| LinkError::ConnectionLost(format!("no address for {}", endpoint)))
        }
    }

    fn context(&mut self) -> Result<&mut Context, LinkError> {
        self.context
            .as_mut()
            .ok_or_else(|| LinkError::ConnectionLost("not connected".to_string()))
    }

    async fn read_holding(&mut self, address: u16, count: u16) -> Result<Vec<u16>, LinkError> {
        let response_timeout = self.response_timeout;
        let ctx = self.context()?;
        let words = timeout(response_timeout, ctx.read_holding_registers(address, count))
            .await
            .map_err(|_| timeout_error("read", address, response_timeout))?
            .map_err(|e| map_modbus_error(e, "read_holding_registers"))?
            .map_err(|code| {
                LinkError::Transient(format!(
                    "read_holding_registers({}, {}) exception: {}",
                    address, count, code
                ))
            })?;
        if words.len() != count as usize {
            return Err(LinkError::Transient(format!(
                "read_holding_registers({}, {}) returned {} words",
                address,
                count,
                words.len()
            )));
        }
        Ok(words)
    }
}

/// Timeouts mean the controller stopped answering on this session.
fn timeout_error(operation: &str, address: u16, after: Duration) -> LinkError {
    LinkError::ConnectionLost(format!(
        "{} at address {} timed out after {:?}",
        operation, address, after
    ))
}

/// Split tokio-modbus errors into session losses and single request failures.
fn map_modbus_error(error: tokio_modbus::Error, operation: &str) -> LinkError {
    match error {
        tokio_modbus::Error::Transport(io_error) => match io_error.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
            | ErrorKind::TimedOut => {
                LinkError::ConnectionLost(format!("{}: {}", operation, io_error))
            }
            _ => LinkError::Transient(format!("{}: {}", operation, io_error)),
        },
        tokio_modbus::Error::Protocol(protocol_error) => {
            LinkError::Transient(format!("{}: {}", operation, protocol_error))
        }
    }
}

#[async_trait]
impl RegisterLink for ModbusTcpLink {
    async fn open(&mut self) -> Result<(), LinkError> {
        self.close().await;

        let socket_addr = self.resolve().await?;
        debug!("Opening Modbus TCP session to {}", socket_addr);
        let ctx = timeout(
            self.response_timeout,
            tcp::connect_slave(socket_addr, Slave(self.unit_id)),
        )
        .await
        .map_err(|_| {
            LinkError::ConnectionLost(format!(
                "connect to {} timed out after {:?}",
                socket_addr, self.response_timeout
            ))
        })?
        .map_err(|e| LinkError::ConnectionLost(format!("connect to {}: {}", socket_addr, e)))?;

        self.context = Some(ctx);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.context.take() {
            if let Err(e) = ctx.disconnect().await {
                warn!("Error while closing Modbus session to {}: {}", self.endpoint(), e);
            }
        }
    }

    async fn read_byte(&mut self, address: u16) -> Result<u8, LinkError> {
        let words = self.read_holding(address, 1).await?;
        Ok((words[0] & 0x00FF) as u8)
    }

    async fn read_float_raw(&mut self, address: u16) -> Result<[u8; 4], LinkError> {
        let words = self.read_holding(address, 2).await?;
        let [b0, b1] = words[0].to_be_bytes();
        let [b2, b3] = words[1].to_be_bytes();
        Ok([b0, b1, b2, b3])
    }

    async fn write_bit(&mut self, address: u16, value: bool) -> Result<(), LinkError> {
        let response_timeout = self.response_timeout;
        let ctx = self.context()?;
        timeout(response_timeout, ctx.write_single_coil(address, value))
            .await
            .map_err(|_| timeout_error("write", address, response_timeout))?
            .map_err(|e| map_modbus_error(e, "write_single_coil"))?
            .map_err(|code| {
                LinkError::Transient(format!(
                    "write_single_coil({}, {}) exception: {}",
                    address, value, code
                ))
            })
    }

    fn describe(&self) -> String {
        format!("modbus-tcp://{}", self.endpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_socket_errors_are_connection_losses() {
        for kind in [
            ErrorKind::ConnectionReset,
            ErrorKind::BrokenPipe,
            ErrorKind::UnexpectedEof,
        ] {
            let err = map_modbus_error(
                tokio_modbus::Error::Transport(io::Error::new(kind, "boom")),
                "read",
            );
            assert!(err.is_connection_loss(), "{:?}", kind);
        }
    }

    #[test]
    fn test_other_io_errors_are_transient() {
        let err = map_modbus_error(
            tokio_modbus::Error::Transport(io::Error::new(ErrorKind::InvalidData, "bad frame")),
            "read",
        );
        assert!(!err.is_connection_loss());
    }

    #[tokio::test]
    async fn test_requests_without_session_fail_as_connection_loss() {
        let mut link = ModbusTcpLink::new("127.0.0.1", 1502);
        let err = link.read_byte(1000).await.unwrap_err();
        assert!(err.is_connection_loss());
        assert_eq!(link.describe(), "modbus-tcp://127.0.0.1:1502");
    }
}
