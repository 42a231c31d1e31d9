// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server side of the PLC simulator
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the simulated controller,
//! the client is the gateway.

use std::future;

use anyhow::Result;
use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use crate::plc::PlcMemory;
use crate::registers::{address, BYTE_BANK_SIZE};

/// Modbus service answering from a shared [`PlcMemory`].
///
/// Every connection gets its own service value; they all share the memory.
#[derive(Debug, Clone)]
pub struct PlcSimulatorService {
    memory: PlcMemory,
    command_effects: bool,
}

impl PlcSimulatorService {
    pub fn new(memory: PlcMemory) -> Self {
        Self {
            memory,
            command_effects: true,
        }
    }

    /// Keep coil writes from moving the simulated machine.
    pub fn without_command_effects(mut self) -> Self {
        self.command_effects = false;
        self
    }

    fn check_online(&self) -> Result<(), ExceptionCode> {
        if self.memory.is_online() {
            Ok(())
        } else {
            Err(ExceptionCode::ServerDeviceFailure)
        }
    }

    /// One holding register: a byte cell, or one word of a float cell.
    fn register(&self, reg: u16) -> Result<u16, ExceptionCode> {
        if let Some(raw) = self.memory.float_raw(reg) {
            return Ok(u16::from_be_bytes([raw[0], raw[1]]));
        }
        if let Some(raw) = reg.checked_sub(1).and_then(|base| self.memory.float_raw(base)) {
            return Ok(u16::from_be_bytes([raw[2], raw[3]]));
        }
        if (reg as usize) < BYTE_BANK_SIZE && !is_float_padding(reg) {
            return self.memory.byte(reg).map(u16::from).ok_or_else(|| {
                error!("SERVER: Exception::IllegalDataAddress ({})", reg);
                ExceptionCode::IllegalDataAddress
            });
        }
        error!("SERVER: Exception::IllegalDataAddress ({})", reg);
        Err(ExceptionCode::IllegalDataAddress)
    }

    fn read_registers(&self, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
        (0..cnt)
            .map(|i| {
                addr.checked_add(i)
                    .ok_or(ExceptionCode::IllegalDataAddress)
                    .and_then(|reg| self.register(reg))
            })
            .collect()
    }

    fn write_register(&self, addr: u16, value: u16) -> Result<(), ExceptionCode> {
        if (addr as usize) >= BYTE_BANK_SIZE || self.memory.float_raw(addr).is_some() {
            error!("SERVER: Exception::IllegalDataAddress ({})", addr);
            return Err(ExceptionCode::IllegalDataAddress);
        }
        self.memory.set_byte(addr, (value & 0xff) as u8);
        Ok(())
    }

    /// Writes either two words onto a float cell, or consecutive byte cells.
    fn write_registers(&self, addr: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        if self.memory.float_raw(addr).is_some() {
            let [high, low] = values else {
                error!("SERVER: Exception::IllegalDataValue (float write of {} words)", values.len());
                return Err(ExceptionCode::IllegalDataValue);
            };
            let [b0, b1] = high.to_be_bytes();
            let [b2, b3] = low.to_be_bytes();
            self.memory.set_float_raw(addr, [b0, b1, b2, b3]);
            return Ok(());
        }
        for (i, value) in values.iter().enumerate() {
            self.write_register(addr.saturating_add(i as u16), *value)?;
        }
        Ok(())
    }

    fn write_coil(&self, addr: u16, value: bool) {
        let rising = value && !self.memory.coil(addr);
        self.memory.set_coil(addr, value);
        debug!("SERVER: coil {} <- {}", addr, value);
        if rising && self.command_effects {
            self.memory.apply_command(addr);
        }
    }
}

/// The unused half of a four-byte float slot (e.g. 1012/1013 after 1010/1011).
fn is_float_padding(reg: u16) -> bool {
    address::FLOAT_CELLS
        .iter()
        .any(|base| reg == base + 2 || reg == base + 3)
}

impl tokio_modbus::server::Service for PlcSimulatorService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        if let Err(e) = self.check_online() {
            return future::ready(Err(e));
        }
        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                self.read_registers(addr, cnt).map(Response::ReadHoldingRegisters)
            }
            Request::WriteSingleRegister(addr, value) => self
                .write_register(addr, value)
                .map(|_| Response::WriteSingleRegister(addr, value)),
            Request::WriteMultipleRegisters(addr, values) => self
                .write_registers(addr, &values)
                .map(|_| Response::WriteMultipleRegisters(addr, values.len() as u16)),
            Request::ReadCoils(addr, cnt) => Ok(Response::ReadCoils(
                (0..cnt)
                    .map(|i| self.memory.coil(addr.saturating_add(i)))
                    .collect(),
            )),
            Request::WriteSingleCoil(addr, value) => {
                self.write_coil(addr, value);
                Ok(Response::WriteSingleCoil(addr, value))
            }
            _ => {
                error!("SERVER: Exception::IllegalFunction - Unimplemented function code in request: {req:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };
        future::ready(res)
    }
}

/// Serve `memory` over Modbus TCP on `listener` until the task is dropped.
pub async fn serve_simulator(listener: TcpListener, memory: PlcMemory) -> Result<()> {
    let service = PlcSimulatorService::new(memory);
    serve_service(listener, service).await
}

/// Serve a preconfigured service over Modbus TCP on `listener`.
pub async fn serve_service(listener: TcpListener, service: PlcSimulatorService) -> Result<()> {
    info!("PLC simulator listening on {}", listener.local_addr()?);
    let server = Server::new(listener);

    let on_connected = move |stream, socket_addr| {
        let service = service.clone();
        async move {
            debug!("PLC simulator client connected from {}", socket_addr);
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(service.clone()))
            })
        }
    };

    let on_process_error = |err| {
        error!("PLC simulator error: {err}");
    };

    server.serve(&on_connected, on_process_error).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_cell_is_two_words_high_first() {
        let memory = PlcMemory::new();
        memory.set_float(address::LIFT_PRESSURE, 12.5);
        let service = PlcSimulatorService::new(memory);
        let words = service.read_registers(address::LIFT_PRESSURE, 2).unwrap();
        let [b0, b1] = words[0].to_be_bytes();
        let [b2, b3] = words[1].to_be_bytes();
        assert_eq!(f32::from_be_bytes([b0, b1, b2, b3]), 12.5);
    }

    #[test]
    fn test_byte_cells_and_padding() {
        let memory = PlcMemory::new();
        let service = PlcSimulatorService::new(memory.clone());
        assert_eq!(
            service.read_registers(address::OIL_TEMPERATURE_ALARM, 3).unwrap(),
            vec![4, 4, 2]
        );
        assert_eq!(
            service.read_registers(address::LIFT_PRESSURE + 2, 1),
            Err(ExceptionCode::IllegalDataAddress)
        );

        service.write_register(address::FILTER_ALARM, 0x0101).unwrap();
        assert_eq!(memory.byte(address::FILTER_ALARM), Some(1));
    }

    #[test]
    fn test_float_write() {
        let memory = PlcMemory::new();
        let service = PlcSimulatorService::new(memory.clone());
        let [b0, b1, b2, b3] = (-3.25f32).to_be_bytes();
        service
            .write_registers(
                address::PLATFORM1_TILT,
                &[u16::from_be_bytes([b0, b1]), u16::from_be_bytes([b2, b3])],
            )
            .unwrap();
        assert_eq!(
            memory.float_raw(address::PLATFORM1_TILT),
            Some((-3.25f32).to_be_bytes())
        );
        assert_eq!(
            service.write_registers(address::PLATFORM1_TILT, &[1]),
            Err(ExceptionCode::IllegalDataValue)
        );
    }
}
