//! Sensor manager for BLE discovery, connection and notification forwarding.
//!
//! Bike and heart rate notifications are decoded here and handed to a
//! [`WorkoutSession`]; nothing downstream sees raw bytes. Status changes go
//! out on a crossbeam channel for whoever is displaying them.

use crate::recording::session::WorkoutSession;
use crate::sensors::ftms::{
    parse_heart_rate_measurement, parse_supported_resistance_range, FrameLayout, IndoorBikeData,
    ResistanceRange, FTMS_SERVICE_UUID, HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID,
    INDOOR_BIKE_DATA_UUID, SUPPORTED_RESISTANCE_RANGE_UUID,
};
use crate::sensors::types::{
    ConnectionState, DiscoveredSensor, SensorConfig, SensorError, SensorEvent, SensorKind,
};
use btleplug::api::{Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use crossbeam::channel::{Receiver, Sender};
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Manages BLE sensor discovery, connection and data forwarding.
pub struct SensorManager {
    config: SensorConfig,
    adapter: Option<Adapter>,
    event_tx: Option<Sender<SensorEvent>>,
    /// Discovered sensors (device_id -> DiscoveredSensor)
    discovered: Arc<Mutex<HashMap<String, DiscoveredSensor>>>,
    /// Connected peripherals (device_id -> Peripheral)
    connected: Arc<Mutex<HashMap<String, Peripheral>>>,
}

impl SensorManager {
    pub fn new(config: SensorConfig) -> Self {
        Self {
            config,
            adapter: None,
            event_tx: None,
            discovered: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SensorConfig::default())
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Initialize the first BLE adapter.
    ///
    /// This must be called before any sensor operations.
    pub async fn initialize(&mut self) -> Result<(), SensorError> {
        tracing::info!("Initializing SensorManager");

        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(SensorError::AdapterNotFound)?;

        if let Ok(info) = adapter.adapter_info().await {
            tracing::info!("BLE adapter initialized: {}", info);
        }
        self.adapter = Some(adapter);
        Ok(())
    }

    /// Get an event receiver for sensor events.
    pub fn event_receiver(&mut self) -> Receiver<SensorEvent> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.event_tx = Some(tx);
        rx
    }

    fn send_event(&self, event: SensorEvent) {
        send_event(&self.event_tx, event);
    }

    fn adapter(&self) -> Result<&Adapter, SensorError> {
        self.adapter.as_ref().ok_or(SensorError::AdapterNotFound)
    }

    /// Scan for sensors of the given kinds.
    ///
    /// Returns early once every requested kind has been seen at least once,
    /// otherwise after `timeout`.
    pub async fn discover(
        &self,
        timeout: Duration,
        kinds: &[SensorKind],
    ) -> Result<Vec<DiscoveredSensor>, SensorError> {
        let adapter = self.adapter()?;
        let services: Vec<Uuid> = kinds.iter().map(|&kind| service_uuid(kind)).collect();

        tracing::info!("Scanning for {:?} ({}s)", kinds, timeout.as_secs());
        self.discovered.lock().await.clear();

        // Subscribe before scanning so no advertisement is missed
        let mut events = adapter.events().await?;
        adapter
            .start_scan(ScanFilter { services })
            .await
            .map_err(|e| SensorError::ScanFailed(e.to_string()))?;
        self.send_event(SensorEvent::ScanStarted);

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let event = match tokio::time::timeout_at(deadline, events.next()).await {
                Ok(Some(event)) => event,
                Ok(None) | Err(_) => break,
            };

            let id = match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                _ => continue,
            };

            let Ok(peripheral) = adapter.peripheral(&id).await else {
                continue;
            };
            let Some(sensor) = describe_peripheral(&peripheral).await else {
                continue;
            };
            if !kinds.contains(&sensor.kind) {
                continue;
            }

            let mut discovered = self.discovered.lock().await;
            if !discovered.contains_key(&sensor.device_id) {
                tracing::info!("Discovered {} '{}' ({})", sensor.kind, sensor.name, sensor.device_id);
                self.send_event(SensorEvent::Discovered(sensor.clone()));
            }
            discovered.insert(sensor.device_id.clone(), sensor);

            let all_found = kinds
                .iter()
                .all(|kind| discovered.values().any(|s| s.kind == *kind));
            if all_found {
                break;
            }
        }

        if let Err(e) = adapter.stop_scan().await {
            tracing::warn!("Failed to stop scan: {}", e);
        }
        self.send_event(SensorEvent::ScanStopped);

        Ok(self.discovered.lock().await.values().cloned().collect())
    }

    /// Connect to a bike and forward its Indoor Bike Data into `session`.
    ///
    /// The Supported Resistance Range is read once per connection. When the
    /// notification stream ends the session's range is cleared.
    pub async fn connect_bike(
        &self,
        device_id: &str,
        session: WorkoutSession,
    ) -> Result<(), SensorError> {
        let peripheral = self.connect_peripheral(device_id, SensorKind::Bike).await?;
        let bike_data = find_characteristic(&peripheral, INDOOR_BIKE_DATA_UUID)?;

        let mut notifications = peripheral.notifications().await?;
        peripheral
            .subscribe(&bike_data)
            .await
            .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;
        tracing::debug!("Subscribed to Indoor Bike Data on {}", device_id);

        match self.read_resistance_range(&peripheral).await {
            Ok(Some(range)) => {
                session.on_resistance_range(range);
                self.send_event(SensorEvent::ResistanceRange {
                    device_id: device_id.to_string(),
                    min: range.min,
                    max: range.max,
                    step: range.step,
                });
            }
            Ok(None) => tracing::info!("{} reports no usable resistance range", device_id),
            Err(e) => tracing::warn!("Reading resistance range failed: {}", e),
        }

        let layout = self.config.frame_layout;
        let event_tx = self.event_tx.clone();
        let connected = self.connected.clone();
        let device_id = device_id.to_string();

        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != INDOOR_BIKE_DATA_UUID {
                    continue;
                }
                match decode_bike_notification(layout, &notification.value) {
                    Some(frame) => session.on_bike_data(frame),
                    None => tracing::debug!(
                        "Dropped {} byte bike frame from {}",
                        notification.value.len(),
                        device_id
                    ),
                }
            }

            tracing::info!("Bike {} disconnected", device_id);
            session.clear_resistance_range();
            connected.lock().await.remove(&device_id);
            send_event(
                &event_tx,
                SensorEvent::ConnectionChanged {
                    device_id,
                    kind: SensorKind::Bike,
                    state: ConnectionState::Disconnected,
                },
            );
        });

        Ok(())
    }

    /// Connect to a heart rate monitor and forward readings into `session`.
    pub async fn connect_heart_rate(
        &self,
        device_id: &str,
        session: WorkoutSession,
    ) -> Result<(), SensorError> {
        let peripheral = self
            .connect_peripheral(device_id, SensorKind::HeartRate)
            .await?;
        let measurement = find_characteristic(&peripheral, HEART_RATE_MEASUREMENT_UUID)?;

        let mut notifications = peripheral.notifications().await?;
        peripheral
            .subscribe(&measurement)
            .await
            .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;
        tracing::debug!("Subscribed to Heart Rate Measurement on {}", device_id);

        let event_tx = self.event_tx.clone();
        let connected = self.connected.clone();
        let device_id = device_id.to_string();

        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != HEART_RATE_MEASUREMENT_UUID {
                    continue;
                }
                if let Some(bpm) = parse_heart_rate_measurement(&notification.value) {
                    session.on_heart_rate(bpm);
                }
            }

            tracing::info!("Heart rate monitor {} disconnected", device_id);
            connected.lock().await.remove(&device_id);
            send_event(
                &event_tx,
                SensorEvent::ConnectionChanged {
                    device_id,
                    kind: SensorKind::HeartRate,
                    state: ConnectionState::Disconnected,
                },
            );
        });

        Ok(())
    }

    async fn connect_peripheral(
        &self,
        device_id: &str,
        kind: SensorKind,
    ) -> Result<Peripheral, SensorError> {
        let adapter = self.adapter()?;
        tracing::info!("Connecting to {} {}", kind, device_id);

        self.send_event(SensorEvent::ConnectionChanged {
            device_id: device_id.to_string(),
            kind,
            state: ConnectionState::Connecting,
        });

        let peripheral = adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|p| p.id().to_string() == device_id)
            .ok_or_else(|| SensorError::SensorNotFound(device_id.to_string()))?;

        let connect = async {
            peripheral.connect().await?;
            peripheral.discover_services().await
        };
        match tokio::time::timeout(self.config.connection_timeout, connect).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.send_event(SensorEvent::Error(e.to_string()));
                return Err(SensorError::ConnectionFailed(e.to_string()));
            }
            Err(_) => {
                self.send_event(SensorEvent::Error(format!("{} timed out", device_id)));
                return Err(SensorError::ConnectionTimeout);
            }
        }

        self.connected
            .lock()
            .await
            .insert(device_id.to_string(), peripheral.clone());

        self.send_event(SensorEvent::ConnectionChanged {
            device_id: device_id.to_string(),
            kind,
            state: ConnectionState::Connected,
        });
        tracing::info!("Connected to {} {}", kind, device_id);

        Ok(peripheral)
    }

    /// Read the Supported Resistance Range, if the bike exposes it.
    async fn read_resistance_range(
        &self,
        peripheral: &Peripheral,
    ) -> Result<Option<ResistanceRange>, SensorError> {
        let Ok(characteristic) = find_characteristic(peripheral, SUPPORTED_RESISTANCE_RANGE_UUID)
        else {
            return Ok(None);
        };
        let bytes = peripheral
            .read(&characteristic)
            .await
            .map_err(|e| SensorError::ReadFailed(e.to_string()))?;
        Ok(parse_supported_resistance_range(&bytes))
    }

    /// Disconnect from a sensor.
    pub async fn disconnect(&self, device_id: &str) -> Result<(), SensorError> {
        tracing::info!("Disconnecting from sensor: {}", device_id);

        let peripheral = self.connected.lock().await.remove(device_id);
        if let Some(peripheral) = peripheral {
            peripheral.disconnect().await?;
        }
        Ok(())
    }

    /// Get list of discovered sensors.
    pub async fn get_discovered(&self) -> Vec<DiscoveredSensor> {
        self.discovered.lock().await.values().cloned().collect()
    }

    /// Disconnect every connected sensor.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down SensorManager");

        let device_ids: Vec<String> = self.connected.lock().await.keys().cloned().collect();
        for device_id in device_ids {
            if let Err(e) = self.disconnect(&device_id).await {
                tracing::warn!("Disconnect of {} failed: {}", device_id, e);
            }
        }
    }
}

fn send_event(event_tx: &Option<Sender<SensorEvent>>, event: SensorEvent) {
    if let Some(tx) = event_tx {
        let _ = tx.send(event);
    }
}

fn find_characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic, SensorError> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or(SensorError::MissingCharacteristic(uuid))
}

async fn describe_peripheral(peripheral: &Peripheral) -> Option<DiscoveredSensor> {
    let properties = peripheral.properties().await.ok()??;
    let kind = classify_services(&properties.services)?;

    Some(DiscoveredSensor {
        device_id: peripheral.id().to_string(),
        name: properties
            .local_name
            .unwrap_or_else(|| "Unknown Sensor".to_string()),
        kind,
        signal_strength: properties.rssi,
        last_seen: Instant::now(),
    })
}

/// Primary GATT service advertised by each sensor kind.
pub fn service_uuid(kind: SensorKind) -> Uuid {
    match kind {
        SensorKind::Bike => FTMS_SERVICE_UUID,
        SensorKind::HeartRate => HEART_RATE_SERVICE_UUID,
    }
}

/// Classify a peripheral from its advertised services. FTMS wins over HRS.
pub fn classify_services(services: &[Uuid]) -> Option<SensorKind> {
    if services.contains(&FTMS_SERVICE_UUID) {
        Some(SensorKind::Bike)
    } else if services.contains(&HEART_RATE_SERVICE_UUID) {
        Some(SensorKind::HeartRate)
    } else {
        None
    }
}

/// Decode one Indoor Bike Data notification. `None` when nothing decoded.
pub fn decode_bike_notification(layout: FrameLayout, data: &[u8]) -> Option<IndoorBikeData> {
    let frame = layout.decode(data);
    (!frame.is_empty()).then_some(frame)
}

/// Pick the sensor of `kind` to connect to: name filter first (case-insensitive
/// substring), then strongest signal.
pub fn select_sensor<'a>(
    sensors: &'a [DiscoveredSensor],
    kind: SensorKind,
    name_filter: Option<&str>,
) -> Option<&'a DiscoveredSensor> {
    let filter = name_filter.map(str::to_lowercase);
    sensors
        .iter()
        .filter(|s| s.kind == kind)
        .filter(|s| match &filter {
            Some(filter) => s.name.to_lowercase().contains(filter.as_str()),
            None => true,
        })
        .max_by_key(|s| s.signal_strength.unwrap_or(i16::MIN))
}
