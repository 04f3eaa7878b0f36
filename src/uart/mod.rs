pub mod mock;
pub mod protocol;
pub use protocol::*;

use std::io::{self, Read, Write};
use std::sync::Mutex;
use std::time::Duration;
use serialport::SerialPort;

use crate::auv::state::lock;
use crate::error::{ControlError, Result};

pub const DEFAULT_BAUD: u32 = 9600;
pub const MAX_LINE_LEN: usize = 256;

//line-oriented transport to one device
pub trait DeviceChannel: Send{
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    //Ok(None) when nothing complete arrived before the read timeout
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

pub struct SerialChannel{
    port: Box<dyn SerialPort>,
    rx_buffer: Vec<u8>,
}

impl SerialChannel{
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self>{
        let port = serialport::new(port_name, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|source| ControlError::ChannelOpen{ name: port_name.to_string(), source })?;

        Ok(SerialChannel{
            port,
            rx_buffer: Vec::with_capacity(MAX_LINE_LEN),
        })
    }

    fn take_line(&mut self) -> Option<String>{
        let pos = self.rx_buffer.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.rx_buffer.drain(..=pos).collect();
        //invalid bytes are dropped, same as a lossy decode with errors ignored
        let text = String::from_utf8_lossy(&raw).replace('\u{FFFD}', "");
        Some(text.trim().to_string())
    }
}

impl DeviceChannel for SerialChannel{
    fn write_line(&mut self, line: &str) -> io::Result<()>{
        self.port.write_all(line.as_bytes())?;
        self.port.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>>{
        let mut read_buf = [0u8; 64];

        loop{
            if let Some(line) = self.take_line(){
                return Ok(Some(line));
            }

            match self.port.read(&mut read_buf){
                Ok(0) => return Ok(None),
                Ok(n) =>{
                    self.rx_buffer.extend_from_slice(&read_buf[..n]);
                    //a runaway line without terminator is garbage, start over
                    if self.rx_buffer.len() > MAX_LINE_LEN && !self.rx_buffer.contains(&b'\n'){
                        self.rx_buffer.clear();
                        return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }
}

//a named channel shared between tasks, every operation holds the lock only
//for its own duration
pub struct Channel{
    name: String,
    inner: Mutex<Box<dyn DeviceChannel>>,
}

impl Channel{
    pub fn new(name: &str, device: Box<dyn DeviceChannel>) -> Self{
        Channel{
            name: name.to_string(),
            inner: Mutex::new(device),
        }
    }

    pub fn open_serial(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self>{
        let device = SerialChannel::open(port_name, baud_rate, timeout)?;
        Ok(Self::new(port_name, Box::new(device)))
    }

    pub fn name(&self) -> &str{
        &self.name
    }

    pub fn write_line(&self, line: &str) -> io::Result<()>{
        lock(&self.inner).write_line(line)
    }

    pub fn read_line(&self) -> io::Result<Option<String>>{
        lock(&self.inner).read_line()
    }

    //write a request and read its reply as one exclusive operation
    pub fn transact(&self, line: &str) -> io::Result<Option<String>>{
        let mut device = lock(&self.inner);
        device.write_line(line)?;
        device.read_line()
    }
}
