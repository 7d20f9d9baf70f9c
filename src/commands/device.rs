//! Device command implementations

use aotf_core::{Aotf, Outcome, Response, Transport};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Print board information
pub fn cmd_info<T: Transport>(aotf: &mut Aotf<T>) -> CmdResult {
    let serial = aotf.serial()?;
    let date = aotf.date()?;
    let index = aotf.controller_index()?;

    println!("AOTF Controller Information");
    println!("===========================");
    println!();
    println!("Serial:          {}", serial);
    println!("Date:            {}", date);
    println!("Controller:      {}", index);

    match aotf.calibration() {
        Some(cal) => println!("Calibration:     {}", cal.id),
        None => println!("Calibration:     {} available", aotf.calibrations().len()),
    }
    Ok(())
}

/// Reset the synthesizer
pub fn cmd_reset<T: Transport>(aotf: &mut Aotf<T>) -> CmdResult {
    aotf.reset()?;
    println!("DDS reset");
    Ok(())
}

/// Send a raw command and print the reply
pub fn cmd_query<T: Transport>(aotf: &mut Aotf<T>, command: &str) -> CmdResult {
    match aotf.query(command)? {
        Response::Completed(payload) => {
            println!("{}", payload);
            Ok(())
        }
        Response::TimedOut => Err(format!(
            "No complete reply to '{}' within {:?}",
            command,
            aotf.config().timeout
        )
        .into()),
    }
}

/// Set a channel frequency, in MHz or Hz
pub fn cmd_frequency<T: Transport>(
    aotf: &mut Aotf<T>,
    channel: i32,
    mhz: Option<f64>,
    hz: Option<f64>,
) -> CmdResult {
    match (mhz, hz) {
        (Some(mhz), _) => {
            aotf.set_acoustic_frequency_mhz(mhz, channel)?;
            println!("Channel {}: {} MHz", channel, mhz);
        }
        (None, Some(hz)) => {
            aotf.set_acoustic_frequency_hz(hz, channel)?;
            println!("Channel {}: {} Hz", channel, hz);
        }
        (None, None) => return Err("Either --mhz or --hz is required".into()),
    }
    Ok(())
}

/// Set a channel amplitude, in percent or device-native units
pub fn cmd_amplitude<T: Transport>(
    aotf: &mut Aotf<T>,
    channel: i32,
    percent: Option<f64>,
    raw: Option<i32>,
) -> CmdResult {
    match (percent, raw) {
        (Some(percent), _) => {
            aotf.set_amplitude_percent(percent, channel)?;
            println!("Channel {}: amplitude {}%", channel, percent);
        }
        (None, Some(raw)) => {
            aotf.set_amplitude_int(raw, channel)?;
            println!("Channel {}: amplitude {}", channel, raw);
        }
        (None, None) => return Err("Either --percent or --raw is required".into()),
    }
    Ok(())
}

/// Tune a channel to a wavelength
///
/// A skipped request is reported as a failure so scripts notice it.
pub fn cmd_wavelength<T: Transport>(
    aotf: &mut Aotf<T>,
    channel: i32,
    id: &str,
    wavelength: f64,
) -> CmdResult {
    if let Outcome::Skipped(reason) = aotf.select_calibration(id) {
        return Err(format!("{} (see list-calibrations)", reason).into());
    }

    match aotf.set_wavelength(wavelength, channel)? {
        Outcome::Applied(frequency) => {
            println!(
                "Channel {}: {} -> {} MHz (calibration {})",
                channel, wavelength, frequency, id
            );
            Ok(())
        }
        Outcome::Skipped(reason) => Err(format!("Wavelength not applied: {}", reason).into()),
    }
}
