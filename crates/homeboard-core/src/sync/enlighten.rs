// ── Enlighten (simulated) ──
//
// No vendor call is made. Readings are randomized with a fixed shape:
// twelve inverters, one system row carrying a 24-interval series, and 24
// hourly energy samples ending at the current hour. Every status bag is
// marked `"simulated": true`.

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use super::{
    Collected, DeviceDraft, EnergyDraft, Fidelity, Inventory, SyncAdapter, SyncContext, slug,
};
use crate::error::CoreError;
use crate::model::{Platform, PlatformCredentials};

pub(crate) const INVERTER_COUNT: usize = 12;
pub(crate) const INTERVALS: usize = 24;
const RATE_USD_PER_KWH: f64 = 0.15;

pub(crate) struct EnlightenAdapter;

impl SyncAdapter for EnlightenAdapter {
    fn fidelity(&self) -> Fidelity {
        Fidelity::Simulated
    }

    async fn collect(
        &self,
        _ctx: &SyncContext<'_>,
        platform: &Platform,
    ) -> Result<Collected, CoreError> {
        let system_id = match platform.typed_credentials()? {
            PlatformCredentials::Enlighten(creds) => creds.system_id,
            _ => None,
        }
        .unwrap_or_else(|| platform.id.simple().to_string());

        Ok(Collected::Inventory(simulate(
            rand::random(),
            &system_id,
            Utc::now(),
        )))
    }
}

/// Generate one simulated inventory. Deterministic for a given seed.
pub(crate) fn simulate(seed: u64, system_id: &str, now: DateTime<Utc>) -> Inventory {
    let mut rng = SmallRng::seed_from_u64(seed);
    let base = format!("enlighten-{}", slug(system_id));

    let mut devices = Vec::with_capacity(INVERTER_COUNT + 1);
    let mut total_w = 0.0;
    let mut total_today = 0.0;
    let mut total_lifetime = 0.0;
    for n in 1..=INVERTER_COUNT {
        let power_w = round1(rng.random_range(180.0..320.0));
        let today = round2(rng.random_range(0.8..2.2));
        let lifetime = round1(rng.random_range(900.0..2400.0));
        total_w += power_w;
        total_today += today;
        total_lifetime += lifetime;
        devices.push(DeviceDraft {
            external_id: format!("{base}-inverter-{n:02}"),
            name: format!("Microinverter {n}"),
            device_type: "solar_inverter".into(),
            room: Some("Roof".into()),
            status: json!({
                "online": true,
                "current_power_w": power_w,
                "energy_today_kwh": today,
                "lifetime_kwh": lifetime,
                "simulated": true,
            }),
            capabilities: json!({ "read_only": true }),
        });
    }

    let hour_start = now.timestamp() - now.timestamp().rem_euclid(3600);
    let current_hour = DateTime::from_timestamp(hour_start, 0).unwrap_or(now);

    let mut energy = Vec::with_capacity(INTERVALS);
    let mut intervals = Vec::with_capacity(INTERVALS);
    for back in (0..INTERVALS).rev() {
        let recorded_at = current_hour - TimeDelta::hours(i64::try_from(back).unwrap_or(0));
        let usage = round2(rng.random_range(0.4..2.5));
        let solar = round2(rng.random_range(0.0..3.0));
        intervals.push(solar);
        energy.push(EnergyDraft {
            recorded_at,
            usage_kwh: usage,
            solar_generation_kwh: solar,
            cost_usd: Some(round2(usage * RATE_USD_PER_KWH)),
        });
    }

    devices.push(DeviceDraft {
        external_id: format!("{base}-system"),
        name: "Solar System".into(),
        device_type: "solar_system".into(),
        room: None,
        status: json!({
            "online": true,
            "current_power_w": round1(total_w),
            "energy_today_kwh": round2(total_today),
            "lifetime_kwh": round1(total_lifetime),
            "inverters": INVERTER_COUNT,
            "intervals": intervals,
            "simulated": true,
        }),
        capabilities: json!({ "read_only": true }),
    });

    Inventory {
        devices,
        energy,
        reachable: true,
        note: Some("simulated readings".into()),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
