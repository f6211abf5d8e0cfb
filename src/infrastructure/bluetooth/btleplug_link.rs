//! Concrete [`RadioLink`] binding over btleplug.
//!
//! The only code that touches the platform BLE stack. One instance per
//! process; everything above it stays hardware-agnostic.

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::BoxStream;
use futures::StreamExt;
use uuid::Uuid;

use crate::error::RadioError;
use crate::infrastructure::radio::{PeripheralHandle, RadioLink, RadioSignal, RadioState};

fn map_err(e: btleplug::Error) -> RadioError {
    match e {
        btleplug::Error::PermissionDenied => RadioError::PermissionDenied,
        btleplug::Error::DeviceNotFound => RadioError::UnknownPeripheral,
        other => RadioError::Stack(other.to_string()),
    }
}

fn map_state(state: CentralState) -> RadioState {
    match state {
        CentralState::PoweredOn => RadioState::PoweredOn,
        CentralState::PoweredOff => RadioState::PoweredOff,
        _ => RadioState::Unknown,
    }
}

fn handle_of(id: &PeripheralId) -> PeripheralHandle {
    PeripheralHandle::new(format!("{id:?}"))
}

pub struct BtleplugLink {
    adapter: Adapter,
}

impl BtleplugLink {
    /// Bind to the first available adapter.
    pub async fn new() -> Result<Self, RadioError> {
        let manager = Manager::new().await.map_err(map_err)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(map_err)?
            .into_iter()
            .next()
            .ok_or(RadioError::AdapterNotFound)?;
        Ok(Self { adapter })
    }

    async fn peripheral(&self, handle: &PeripheralHandle) -> Result<Peripheral, RadioError> {
        let peripherals = self.adapter.peripherals().await.map_err(map_err)?;
        peripherals
            .into_iter()
            .find(|p| handle_of(&p.id()) == *handle)
            .ok_or(RadioError::UnknownPeripheral)
    }

    async fn characteristic(
        &self,
        peripheral: &Peripheral,
        uuid: Uuid,
    ) -> Result<Characteristic, RadioError> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(RadioError::CharacteristicNotFound(uuid))
    }
}

#[async_trait]
impl RadioLink for BtleplugLink {
    async fn state(&self) -> Result<RadioState, RadioError> {
        let state = self.adapter.adapter_state().await.map_err(map_err)?;
        Ok(map_state(state))
    }

    async fn signals(&self) -> Result<BoxStream<'static, RadioSignal>, RadioError> {
        let events = self.adapter.events().await.map_err(map_err)?;
        let adapter = self.adapter.clone();
        let stream = events
            .filter_map(move |event| {
                let adapter = adapter.clone();
                async move {
                    match event {
                        CentralEvent::DeviceDiscovered(id) => {
                            // The advertised name comes from the cached
                            // peripheral properties, not the event itself.
                            let name = match adapter.peripheral(&id).await {
                                Ok(p) => p
                                    .properties()
                                    .await
                                    .ok()
                                    .flatten()
                                    .and_then(|props| props.local_name),
                                Err(_) => None,
                            };
                            Some(RadioSignal::Discovered {
                                handle: handle_of(&id),
                                name,
                            })
                        }
                        CentralEvent::DeviceDisconnected(id) => Some(RadioSignal::Disconnected {
                            handle: handle_of(&id),
                        }),
                        CentralEvent::StateUpdate(state) => {
                            Some(RadioSignal::StateChanged(map_state(state)))
                        }
                        _ => None,
                    }
                }
            })
            .boxed();
        Ok(stream)
    }

    async fn start_scan(&self) -> Result<(), RadioError> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(map_err)
    }

    async fn stop_scan(&self) -> Result<(), RadioError> {
        self.adapter.stop_scan().await.map_err(map_err)
    }

    async fn connect(&self, handle: &PeripheralHandle) -> Result<(), RadioError> {
        let peripheral = self.peripheral(handle).await?;
        peripheral.connect().await.map_err(map_err)
    }

    async fn cancel_connection(&self, handle: &PeripheralHandle) -> Result<(), RadioError> {
        let peripheral = self.peripheral(handle).await?;
        peripheral.disconnect().await.map_err(map_err)
    }

    async fn is_connected(&self, handle: &PeripheralHandle) -> Result<bool, RadioError> {
        let peripheral = self.peripheral(handle).await?;
        peripheral.is_connected().await.map_err(map_err)
    }

    async fn discover_services(&self, handle: &PeripheralHandle) -> Result<(), RadioError> {
        let peripheral = self.peripheral(handle).await?;
        peripheral.discover_services().await.map_err(map_err)
    }

    async fn read_characteristic(
        &self,
        handle: &PeripheralHandle,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, RadioError> {
        let peripheral = self.peripheral(handle).await?;
        let c = self.characteristic(&peripheral, characteristic).await?;
        peripheral.read(&c).await.map_err(map_err)
    }

    async fn subscribe(
        &self,
        handle: &PeripheralHandle,
        characteristic: Uuid,
    ) -> Result<(), RadioError> {
        let peripheral = self.peripheral(handle).await?;
        let c = self.characteristic(&peripheral, characteristic).await?;
        peripheral.subscribe(&c).await.map_err(map_err)
    }

    async fn notifications(
        &self,
        handle: &PeripheralHandle,
        characteristic: Uuid,
    ) -> Result<BoxStream<'static, Vec<u8>>, RadioError> {
        let peripheral = self.peripheral(handle).await?;
        let stream = peripheral
            .notifications()
            .await
            .map_err(map_err)?
            .filter_map(move |n| async move {
                (n.uuid == characteristic).then_some(n.value)
            })
            .boxed();
        Ok(stream)
    }
}
