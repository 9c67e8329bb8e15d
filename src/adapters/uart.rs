//! UART adapter — the host link.
//!
//! Implements [`Transport`] over UART0 (default pins). The ESP-IDF console
//! is expected on the USB-Serial-JTAG port so log output never mixes with
//! protocol frames.
//!
//! - **`target_os = "espidf"`** — ESP-IDF UART driver with a buffered
//!   receive ring; `available()` reports its fill level.
//! - **`not(target_os = "espidf")`** — in-memory queues for simulation:
//!   [`UartTransport::inject`] feeds the receive side,
//!   [`UartTransport::take_output`] collects what was written.

use log::info;

use crate::error::TransportError;
use crate::protocol::transport::Transport;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

/// Driver receive ring; comfortably above one command.
#[cfg(target_os = "espidf")]
const RX_BUFFER_SIZE: i32 = 256;

#[cfg(target_os = "espidf")]
const TX_BUFFER_SIZE: i32 = 256;

#[cfg(target_os = "espidf")]
const HOST_UART: uart_port_t = 0;

/// Ticks to wait for the TX FIFO to drain on flush.
#[cfg(target_os = "espidf")]
const FLUSH_TIMEOUT_TICKS: u32 = 100;

pub struct UartTransport {
    #[cfg(not(target_os = "espidf"))]
    rx: VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    tx: Vec<u8>,
}

impl UartTransport {
    /// Install the UART driver at `baud`, 8N1.
    #[cfg(target_os = "espidf")]
    pub fn new(baud: u32) -> Result<Self, TransportError> {
        let cfg = uart_config_t {
            baud_rate: baud as i32,
            data_bits: uart_word_length_t_UART_DATA_8_BITS,
            parity: uart_parity_t_UART_PARITY_DISABLE,
            stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
            flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
            ..Default::default()
        };
        // SAFETY: called once from main() before the idle loop; the driver
        // is owned by this adapter for the lifetime of the program.
        unsafe {
            let ret = uart_driver_install(
                HOST_UART,
                RX_BUFFER_SIZE,
                TX_BUFFER_SIZE,
                0,
                core::ptr::null_mut(),
                0,
            );
            if ret != ESP_OK as i32 {
                return Err(TransportError::DriverInstall(ret));
            }
            let ret = uart_param_config(HOST_UART, &cfg);
            if ret != ESP_OK as i32 {
                return Err(TransportError::DriverInstall(ret));
            }
        }
        info!("UART: host link at {} baud", baud);
        Ok(Self {})
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(baud: u32) -> Result<Self, TransportError> {
        info!("UART: simulation backend ({} baud)", baud);
        Ok(Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
        })
    }

    /// Queue bytes as if the host had sent them.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Everything written since the last call.
    #[cfg(not(target_os = "espidf"))]
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }
}

#[cfg(target_os = "espidf")]
impl Transport for UartTransport {
    type Error = TransportError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        // SAFETY: buf is valid for buf.len() bytes; zero timeout never blocks.
        let n = unsafe {
            uart_read_bytes(
                HOST_UART,
                buf.as_mut_ptr().cast(),
                buf.len() as u32,
                0,
            )
        };
        usize::try_from(n).map_err(|_| TransportError::ReadFailed)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        // SAFETY: data is valid for data.len() bytes for the whole call.
        let n = unsafe { uart_write_bytes(HOST_UART, data.as_ptr().cast(), data.len()) };
        usize::try_from(n).map_err(|_| TransportError::WriteFailed)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        // SAFETY: driver installed in new().
        let ret = unsafe { uart_wait_tx_done(HOST_UART, FLUSH_TIMEOUT_TICKS) };
        if ret == ESP_OK as i32 {
            Ok(())
        } else {
            Err(TransportError::WriteFailed)
        }
    }

    fn available(&self) -> usize {
        let mut len: usize = 0;
        // SAFETY: len is a valid out-pointer; driver installed in new().
        let ret = unsafe { uart_get_buffered_data_len(HOST_UART, &mut len) };
        if ret == ESP_OK as i32 { len } else { 0 }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Transport for UartTransport {
    type Error = TransportError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.tx.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn available(&self) -> usize {
        self.rx.len()
    }
}
