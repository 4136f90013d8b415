// Blocking entry points
//
// Same operations and errors as the async clients, driven to completion
// on a runtime owned by the client. Must not be called from inside an
// async context.

use tokio::runtime::{Builder, Runtime};
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::gen1::{Gen1Description, Gen1DeviceInfo, Gen1Status};
use crate::gen2::{Gen2DeviceConfig, Gen2DeviceInfo, Gen2DeviceStatus};
use crate::models::WireValue;
use crate::transport::TransportConfig;
use crate::{gen1, gen2};

fn runtime() -> Result<Runtime, Error> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}

/// Blocking Gen1 client.
#[derive(Debug)]
pub struct Gen1Client {
    inner: gen1::Gen1Client,
    runtime: Runtime,
}

impl Gen1Client {
    pub fn new(
        base_url: Url,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            inner: gen1::Gen1Client::new(base_url, credentials, transport)?,
            runtime: runtime()?,
        })
    }

    pub fn get_device_information(&self) -> Result<Gen1DeviceInfo, Error> {
        self.runtime.block_on(self.inner.get_device_information())
    }

    pub fn get_device_description(&self) -> Result<Gen1Description, Error> {
        self.runtime.block_on(self.inner.get_device_description())
    }

    pub fn get_device_state(&self) -> Result<Gen1Status, Error> {
        self.runtime.block_on(self.inner.get_device_state())
    }

    pub fn set_device_state(&self, block: &str, sensor: &str, value: &WireValue) -> Result<(), Error> {
        self.runtime
            .block_on(self.inner.set_device_state(block, sensor, value))
    }
}

/// Blocking Gen2 HTTP client.
#[derive(Debug)]
pub struct Gen2Client {
    inner: gen2::Gen2Client,
    runtime: Runtime,
}

impl Gen2Client {
    pub fn new(
        base_url: Url,
        password: Option<&str>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            inner: gen2::Gen2Client::new(base_url, password, transport)?,
            runtime: runtime()?,
        })
    }

    pub fn get_device_information(&self) -> Result<Gen2DeviceInfo, Error> {
        self.runtime.block_on(self.inner.get_device_information())
    }

    pub fn get_device_configuration(&self) -> Result<Gen2DeviceConfig, Error> {
        self.runtime.block_on(self.inner.get_device_configuration())
    }

    pub fn get_device_state(&self) -> Result<Gen2DeviceStatus, Error> {
        self.runtime.block_on(self.inner.get_device_state())
    }

    pub fn set_device_state(&self, key: &str, value: &WireValue) -> Result<(), Error> {
        self.runtime.block_on(self.inner.set_device_state(key, value))
    }
}
