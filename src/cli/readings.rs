//! CLI reading command handlers.

use crate::error::Result;
use crate::readings::{GlucoseClient, GlucoseReading};

/// Handle `cgm-link readings`.
pub async fn handle_readings(client: &GlucoseClient, minutes: u32) -> Result<()> {
    let readings = client
        .readings_since(chrono::Duration::minutes(i64::from(minutes)))
        .await?;
    if readings.is_empty() {
        println!("No readings in the last {minutes} minutes");
        return Ok(());
    }
    for reading in &readings {
        println!("{}", format_reading(reading));
    }
    Ok(())
}

/// Handle `cgm-link latest`.
pub async fn handle_latest(client: &GlucoseClient) -> Result<()> {
    match client.latest_reading().await? {
        Some(reading) => println!("{}", format_reading(&reading)),
        None => println!("No recent reading"),
    }
    Ok(())
}

fn format_reading(reading: &GlucoseReading) -> String {
    let unit = reading.unit.as_deref().unwrap_or("mg/dL");
    let mut line = format!(
        "{}  {} {unit}",
        reading.system_time.format("%Y-%m-%d %H:%M:%S"),
        reading.value
    );
    if let Some(trend) = &reading.trend {
        line.push_str(&format!("  {trend}"));
    }
    if !reading.status.is_empty() {
        line.push_str(&format!("  [{}]", reading.status));
    }
    line
}
