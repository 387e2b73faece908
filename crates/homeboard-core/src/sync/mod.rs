// ── Platform sync adapters ──
//
// Each adapter collects a vendor inventory into `DeviceDraft`s without
// touching the backend. `commit_inventory` then writes it in one
// upsert-and-prune pass, stamps the platform and logs the sync. A failed
// collection never reaches the commit, so prior rows stay as they were.

pub mod enlighten;
pub mod konnected;
pub mod reolink;
pub mod smartthings;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use homeboard_api::store::functions::InventorySyncResponse;
use homeboard_api::store::rows::{
    DEVICE_CONFLICT_KEY, NewActivityLog, NewDevice, NewEnergyUsage, PlatformSyncPatch,
};
use homeboard_api::store::tables;
use homeboard_api::{Query, StoreClient, TransportConfig};

use crate::config::HubConfig;
use crate::error::CoreError;
use crate::model::{Platform, PlatformKind, actions};

/// Whether an adapter talks to a real vendor or fabricates readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Fidelity {
    Live,
    Simulated,
}

/// Everything an adapter may need from the hub.
pub(crate) struct SyncContext<'a> {
    pub store: &'a StoreClient,
    pub user_id: Uuid,
    pub transport: &'a TransportConfig,
    pub config: &'a HubConfig,
}

/// One device as produced by an adapter, before ownership is stamped.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDraft {
    pub external_id: String,
    pub name: String,
    pub device_type: String,
    pub room: Option<String>,
    pub status: Value,
    pub capabilities: Value,
}

/// One energy sample produced by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyDraft {
    pub recorded_at: DateTime<Utc>,
    pub usage_kwh: f64,
    pub solar_generation_kwh: f64,
    pub cost_usd: Option<f64>,
}

/// A collected vendor inventory.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub devices: Vec<DeviceDraft>,
    pub energy: Vec<EnergyDraft>,
    /// False when the adapter fell back to placeholder devices.
    pub reachable: bool,
    pub note: Option<String>,
}

pub(crate) enum Collected {
    /// Commit locally through `commit_inventory`.
    Inventory(Inventory),
    /// A server-side handler already committed the inventory.
    Remote(InventorySyncResponse),
}

pub(crate) trait SyncAdapter {
    fn fidelity(&self) -> Fidelity;

    async fn collect(
        &self,
        ctx: &SyncContext<'_>,
        platform: &Platform,
    ) -> Result<Collected, CoreError>;
}

/// Result of one sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub platform_id: Uuid,
    pub platform_name: String,
    pub kind: PlatformKind,
    pub fidelity: Fidelity,
    pub reachable: bool,
    pub devices_upserted: usize,
    pub devices_pruned: usize,
    pub energy_samples: usize,
    /// Committed by a server-side handler rather than this process.
    pub remote: bool,
    pub note: Option<String>,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}: {} device(s) synced",
            self.platform_name, self.devices_upserted
        );
        if self.devices_pruned > 0 {
            out.push_str(&format!(", {} removed", self.devices_pruned));
        }
        if self.energy_samples > 0 {
            out.push_str(&format!(", {} energy sample(s)", self.energy_samples));
        }
        if self.fidelity == Fidelity::Simulated {
            out.push_str(" (simulated data)");
        }
        if !self.reachable {
            out.push_str(" (device unreachable, placeholders stored)");
        }
        out
    }
}

/// Sync one platform with the adapter for its kind.
pub(crate) async fn run(ctx: &SyncContext<'_>, platform: &Platform) -> Result<SyncReport, CoreError> {
    let (fidelity, collected) = match &platform.kind {
        PlatformKind::SmartThings => collect_with(&smartthings::SmartThingsAdapter, ctx, platform).await?,
        PlatformKind::Reolink => collect_with(&reolink::ReolinkAdapter, ctx, platform).await?,
        PlatformKind::Konnected => collect_with(&konnected::KonnectedAdapter, ctx, platform).await?,
        PlatformKind::Enlighten => collect_with(&enlighten::EnlightenAdapter, ctx, platform).await?,
        PlatformKind::Other(kind) => {
            return Err(CoreError::unsupported(
                "sync",
                format!("no sync adapter for platform type '{kind}'"),
            ));
        }
    };

    match collected {
        Collected::Remote(resp) => {
            info!(
                platform = %platform.name,
                devices = resp.device_count,
                rooms = resp.room_count,
                "inventory synced by server handler"
            );
            Ok(SyncReport {
                platform_id: platform.id,
                platform_name: platform.name.clone(),
                kind: platform.kind.clone(),
                fidelity,
                reachable: true,
                devices_upserted: resp.device_count,
                devices_pruned: 0,
                energy_samples: 0,
                remote: true,
                note: Some(format!(
                    "{} location(s), {} room(s)",
                    resp.location_count, resp.room_count
                )),
            })
        }
        Collected::Inventory(inventory) => {
            commit_inventory(ctx, platform, fidelity, inventory).await
        }
    }
}

async fn collect_with(
    adapter: &impl SyncAdapter,
    ctx: &SyncContext<'_>,
    platform: &Platform,
) -> Result<(Fidelity, Collected), CoreError> {
    let fidelity = adapter.fidelity();
    debug!(platform = %platform.name, kind = %platform.kind, %fidelity, "collecting inventory");
    Ok((fidelity, adapter.collect(ctx, platform).await?))
}

/// Write a collected inventory: upsert on `(user_id, device_id,
/// platform_id)`, prune this platform's rows not in the pass, append
/// energy samples, stamp the platform and write one activity log.
pub(crate) async fn commit_inventory(
    ctx: &SyncContext<'_>,
    platform: &Platform,
    fidelity: Fidelity,
    inventory: Inventory,
) -> Result<SyncReport, CoreError> {
    let now = Utc::now();
    let Inventory {
        devices,
        energy,
        reachable,
        note,
    } = inventory;

    let external_ids: Vec<String> = devices.iter().map(|d| d.external_id.clone()).collect();
    let rows: Vec<NewDevice> = devices
        .into_iter()
        .map(|d| NewDevice {
            user_id: ctx.user_id,
            platform_id: platform.id,
            device_id: d.external_id,
            device_name: d.name,
            device_type: d.device_type,
            room: d.room,
            status: d.status,
            capabilities: d.capabilities,
            last_updated: now,
        })
        .collect();

    let upserted = rows.len();
    if !rows.is_empty() {
        let _: Vec<Value> = ctx
            .store
            .upsert(tables::DEVICES, &rows, DEVICE_CONFLICT_KEY)
            .await?;
    }

    let mut prune = Query::new()
        .eq("user_id", ctx.user_id)
        .eq("platform_id", platform.id);
    if !external_ids.is_empty() {
        prune = prune.not_in("device_id", &external_ids);
    }
    let pruned = ctx
        .store
        .delete::<Value>(tables::DEVICES, &prune)
        .await?
        .len();

    let energy_samples = energy.len();
    if !energy.is_empty() {
        let samples: Vec<NewEnergyUsage> = energy
            .into_iter()
            .map(|e| NewEnergyUsage {
                user_id: ctx.user_id,
                recorded_at: e.recorded_at,
                usage_kwh: e.usage_kwh,
                solar_generation_kwh: e.solar_generation_kwh,
                cost_usd: e.cost_usd,
            })
            .collect();
        let _: Vec<Value> = ctx.store.insert(tables::ENERGY_USAGE, &samples).await?;
    }

    let _: Vec<Value> = ctx
        .store
        .update(
            tables::PLATFORMS,
            &Query::new().eq("id", platform.id),
            &PlatformSyncPatch {
                is_connected: reachable,
                last_sync: now,
                updated_at: now,
            },
        )
        .await?;

    let report = SyncReport {
        platform_id: platform.id,
        platform_name: platform.name.clone(),
        kind: platform.kind.clone(),
        fidelity,
        reachable,
        devices_upserted: upserted,
        devices_pruned: pruned,
        energy_samples,
        remote: false,
        note,
    };

    let log = NewActivityLog {
        user_id: ctx.user_id,
        device_id: None,
        action: actions::PLATFORM_SYNC.into(),
        details: json!({
            "description": report.summary(),
            "platform": platform.name,
            "platform_type": platform.kind.as_str(),
            "device_count": upserted,
            "pruned": pruned,
            "fidelity": fidelity,
            "reachable": reachable,
        }),
    };
    let _: Vec<Value> = ctx.store.insert(tables::ACTIVITY_LOGS, &[log]).await?;

    info!(
        platform = %platform.name,
        upserted,
        pruned,
        energy_samples,
        %fidelity,
        "inventory committed"
    );
    Ok(report)
}

/// Lowercase, dash-separated fragment for building stable external ids.
pub(crate) fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slug("192.168.1.20:8080"), "192-168-1-20-8080");
        assert_eq!(slug("  Front Door!! "), "front-door");
    }

    #[test]
    fn report_summary_flags_simulated_and_unreachable() {
        let report = SyncReport {
            platform_id: Uuid::nil(),
            platform_name: "Solar".into(),
            kind: PlatformKind::Enlighten,
            fidelity: Fidelity::Simulated,
            reachable: false,
            devices_upserted: 13,
            devices_pruned: 1,
            energy_samples: 24,
            remote: false,
            note: None,
        };
        let s = report.summary();
        assert!(s.contains("13 device(s)"));
        assert!(s.contains("1 removed"));
        assert!(s.contains("simulated"));
        assert!(s.contains("unreachable"));
    }
}
