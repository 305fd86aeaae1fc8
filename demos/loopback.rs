//! In-process GATT peripheral with a simulated central.
//!
//! The loopback adapter completes registrations and advertising over an event
//! channel and prints every response it is asked to send. A scripted central
//! then reads and writes the battery and device name characteristics.

#![allow(unused_crate_dependencies)]
#![allow(clippy::print_stdout)]

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use gatt_periph::att::ErrorCode;
use gatt_periph::gatt::{CharHandle, Characteristic, Descriptor, Prop, Service, ServiceHandle};
use gatt_periph::*;

#[derive(Clone, Debug, clap::Parser)]
struct Args {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Advertised local name (overrides the configuration file).
    #[arg(short, long)]
    name: Option<String>,

    /// Battery level updates to push.
    #[arg(short, long, default_value_t = 3)]
    updates: u8,
}

const DEVICE_NAME: u16 = 0x2A00;
const BATTERY_LEVEL: u16 = 0x2A19;

/// Adapter that answers all requests in-process.
#[derive(Debug)]
struct Loopback {
    tx: EventSender,
    regs: parking_lot::Mutex<Vec<ServiceReg>>,
    outstanding: parking_lot::Mutex<BTreeSet<RequestId>>,
    answered: Notify,
}

impl Loopback {
    /// Returns the handle of a published characteristic.
    fn handle_of(&self, uuid: Uuid) -> Option<CharHandle> {
        (self.regs.lock().iter())
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.uuid == uuid)
            .map(|c| c.handle)
    }

    /// Records a request that must be answered.
    fn track(&self, id: RequestId) -> RequestId {
        self.outstanding.lock().insert(id);
        id
    }

    /// Waits until all tracked requests have been answered.
    async fn settled(&self) {
        while !self.outstanding.lock().is_empty() {
            self.answered.notified().await;
        }
    }
}

impl Adapter for Loopback {
    fn start_advertising(&self, adv: &Advertisement) {
        info!("Advertising {:?} with {:?}", adv.local_name, adv.services);
        let _ = self.tx.send(Event::AdvertisingStarted(Ok(())));
    }

    fn stop_advertising(&self) {
        info!("Advertising stopped");
    }

    fn add_service(&self, svc: &ServiceReg) {
        info!("Publishing {} ({})", svc.uuid, svc.handle);
        self.regs.lock().push(svc.clone());
        let _ = self.tx.send(Event::ServiceAdded {
            service: svc.handle,
            result: Ok(()),
        });
    }

    fn remove_service(&self, hdl: ServiceHandle) {
        info!("Unpublishing {hdl}");
        self.regs.lock().retain(|s| s.handle != hdl);
    }

    fn remove_all_services(&self) {
        info!("Unpublishing all services");
        self.regs.lock().clear();
    }

    fn update_value(&self, hdl: CharHandle, value: &[u8]) -> bool {
        println!("NOTIFY {hdl} {value:02X?}");
        true
    }

    fn respond(&self, req: RequestId, rsp: Response) {
        println!("RSP    {} {rsp:02X?}", req.0);
        self.outstanding.lock().remove(&req);
        self.answered.notify_one();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let mut cfg = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(name) = args.name {
        cfg = cfg.local_name(name);
    }
    let timeout = cfg.timeout.or(Some(Duration::from_secs(5)));
    let cfg = cfg.timeout(timeout);

    let (tx, rx) = event_channel();
    let adapter = Loopback {
        tx: tx.clone(),
        regs: parking_lot::Mutex::default(),
        outstanding: parking_lot::Mutex::default(),
        answered: Notify::new(),
    };
    let srv = Arc::new(Server::with_config(adapter, cfg));
    let event_loop = srv.event_loop(rx);
    let r = serve(&srv, &tx, args.updates).await;
    srv.stop();
    event_loop.stop().await;
    r
}

async fn serve(srv: &Arc<Server<Loopback>>, tx: &EventSender, updates: u8) -> Result<()> {
    let uuid = |v| Uuid::from_u16(v).expect("non-zero UUID");
    tx.send(Event::StateChanged(AdapterState::PoweredOn))?;
    srv.set_on_state_changed(|s| info!("Adapter state: {s}"));
    srv.set_on_write(move |w| {
        if w.uuid == uuid(DEVICE_NAME) && w.new_value.is_empty() {
            return Err(ErrorCode::ValueNotAllowed);
        }
        Ok(())
    });

    let gap = Service::primary(uuid(0x1800)).with(
        Characteristic::new(uuid(DEVICE_NAME), Prop::READ | Prop::WRITE, "loopback")
            .with(Descriptor::user_description("Device Name")),
    );
    let bas = Service::primary(uuid(0x180F)).with(Characteristic::new(
        uuid(BATTERY_LEVEL),
        Prop::READ | Prop::NOTIFY,
        [100],
    ));
    srv.add_async(gap).await?;
    let i = srv.add_async(bas).await?;
    info!("Registered {i} services: {:?}", srv.services());
    srv.start_async().await?;

    for level in (0..updates).map(|n| 100 - 10 * n.min(10)) {
        srv.update(uuid(BATTERY_LEVEL), [level])?;
    }

    // Play a central against the registered handles
    let central = Central { id: 1 };
    let ids = AtomicU64::new(1);
    let id = || srv.adapter().track(RequestId(ids.fetch_add(1, Ordering::Relaxed)));
    let name = (srv.adapter().handle_of(uuid(DEVICE_NAME)))
        .ok_or_else(|| anyhow::anyhow!("device name not published"))?;
    tx.send(Event::ReadRequest(ReadRequest {
        id: id(),
        central,
        handle: name,
        offset: 4,
    }))?;
    tx.send(Event::WriteRequests(vec![WriteRequest {
        id: id(),
        central,
        handle: name,
        offset: 0,
        value: b"LOOP".to_vec(),
    }]))?;
    tx.send(Event::ReadRequest(ReadRequest {
        id: id(),
        central,
        handle: name,
        offset: 9,
    }))?;
    tokio::time::timeout(Duration::from_secs(5), srv.adapter().settled()).await?;
    info!(
        "Device name: {:?}",
        String::from_utf8_lossy(&srv.value(uuid(DEVICE_NAME)).unwrap_or_default())
    );
    Ok(())
}
