use log::info;
use pnet::datalink::{self, Channel, DataLinkReceiver};
use std::io;
use std::time::Duration;

/// How long a single read may block before the capture loop gets a
/// chance to poll its run flag again.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub enum CaptureError {
    NoSuchInterface(String),
    UnsupportedChannel(String),
    ChannelCreate(io::Error),
    Read(io::Error),
}

/// Seam between the capture loop and the wire. `Ok(None)` means the read
/// timed out with nothing captured, which is a normal idle-link outcome.
pub trait PacketSource: Send {
    fn recv(&mut self) -> Result<Option<Vec<u8>>, CaptureError>;
}

/// Constructs a [PacketSource]; the indirection keeps interface lookup
/// and privileged channel creation out of the supervisor itself.
pub trait SourceFactory: Send + Sync + 'static {
    fn open(&self) -> Result<Box<dyn PacketSource>, CaptureError>;
}

/// Live capture over a pnet datalink channel.
pub struct DatalinkSource {
    rx: Box<dyn DataLinkReceiver>,
}

impl DatalinkSource {
    pub fn open(interface_name: &str) -> Result<Self, CaptureError> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|i| i.name == interface_name)
            .ok_or_else(|| CaptureError::NoSuchInterface(interface_name.to_owned()))?;

        let config = datalink::Config {
            read_timeout: Some(READ_TIMEOUT),
            ..Default::default()
        };

        match datalink::channel(&interface, config) {
            Ok(Channel::Ethernet(_tx, rx)) => {
                info!("capturing on interface {}", interface_name);
                Ok(Self { rx })
            }
            Ok(_) => Err(CaptureError::UnsupportedChannel(interface_name.to_owned())),
            Err(e) => Err(CaptureError::ChannelCreate(e)),
        }
    }
}

impl PacketSource for DatalinkSource {
    fn recv(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
        match self.rx.next() {
            Ok(frame) => Ok(Some(frame.to_vec())),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) => Err(CaptureError::Read(e)),
        }
    }
}

pub struct DatalinkFactory {
    interface: String,
}

impl DatalinkFactory {
    pub fn new(interface: String) -> Self {
        Self { interface }
    }
}

impl SourceFactory for DatalinkFactory {
    fn open(&self) -> Result<Box<dyn PacketSource>, CaptureError> {
        DatalinkSource::open(&self.interface).map(|s| Box::new(s) as Box<dyn PacketSource>)
    }
}
