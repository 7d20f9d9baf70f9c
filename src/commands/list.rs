//! List commands implementation

use aotf_core::CalibrationTable;

use crate::devices;

/// List all supported devices
pub fn list_devices() {
    let devices = devices::available_devices();
    if devices.is_empty() {
        println!("No devices available (recompile with device features enabled)");
        return;
    }

    println!("Supported devices:");
    println!();
    for d in &devices {
        println!("  {:8} - {}", d.name, d.description);
        if !d.aliases.is_empty() {
            println!("  {:8}   aliases: {}", "", d.aliases.join(", "));
        }
    }
    println!();
    println!("Device string: name[:key=value,...], all devices accept index=<n>");
}

/// List all calibrations of a table
pub fn list_calibrations(table: &CalibrationTable) {
    if table.is_empty() {
        println!("No calibrations loaded");
        return;
    }

    println!("{:<12} {:>10} {:>10}  Coefficients", "Id", "Min", "Max");
    println!("{}", "-".repeat(60));

    for cal in table.iter() {
        let coeffs: Vec<String> = cal
            .polynomial
            .coefficients()
            .iter()
            .map(|c| format!("{:e}", c))
            .collect();
        println!(
            "{:<12} {:>10} {:>10}  [{}]",
            cal.id,
            cal.domain.min,
            cal.domain.max,
            coeffs.join(", ")
        );
    }
}
