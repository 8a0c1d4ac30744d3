//! # Temperature Compensation
//!
//! Integer fixed-point conversion of the rig's raw temperature word into
//! centi-degrees Celsius. The arithmetic follows the classic Bosch
//! environmental-sensor compensation and must match it bit for bit.

use serde::Deserialize;

/// Default `dig_T1` calibration word
pub const DEFAULT_DIG_T1: i64 = 0x6D42;

/// Default `dig_T2` calibration word
pub const DEFAULT_DIG_T2: i64 = 0x6877;

/// Default `dig_T3` calibration word
pub const DEFAULT_DIG_T3: i64 = 0xFC18;

/// Sensor calibration constants
///
/// Values are used exactly as configured. `0xFC18` is therefore `64536`,
/// not the two's-complement `-1000` a 16-bit register read would give.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Calibration {
    #[serde(default = "default_dig_t1")]
    pub dig_t1: i64,

    #[serde(default = "default_dig_t2")]
    pub dig_t2: i64,

    #[serde(default = "default_dig_t3")]
    pub dig_t3: i64,
}

fn default_dig_t1() -> i64 { DEFAULT_DIG_T1 }
fn default_dig_t2() -> i64 { DEFAULT_DIG_T2 }
fn default_dig_t3() -> i64 { DEFAULT_DIG_T3 }

impl Default for Calibration {
    fn default() -> Self {
        Self {
            dig_t1: DEFAULT_DIG_T1,
            dig_t2: DEFAULT_DIG_T2,
            dig_t3: DEFAULT_DIG_T3,
        }
    }
}

impl Calibration {
    /// Compensate a raw temperature word
    ///
    /// # Arguments
    ///
    /// * `raw_temp24` - Raw temperature field as decoded from the frame
    ///
    /// # Returns
    ///
    /// * `i64` - Temperature in hundredths of a degree Celsius
    ///
    /// All shifts are arithmetic on `i64`; the full `u32` input range cannot
    /// overflow an intermediate.
    ///
    /// # Examples
    ///
    /// ```
    /// use ringosc_capture::compensation::Calibration;
    ///
    /// let centi = Calibration::default().compensate(0x0080_0000);
    /// assert_eq!(centi, 2880);
    /// ```
    pub fn compensate(&self, raw_temp24: u32) -> i64 {
        let raw_temp = i64::from(raw_temp24) >> 4;
        let var1 = (((raw_temp >> 3) - (self.dig_t1 << 1)) * self.dig_t2) >> 11;
        let temp_diff = (raw_temp >> 4) - self.dig_t1;
        let var2 = (((temp_diff * temp_diff) >> 12) * self.dig_t3) >> 14;
        let t_fine = var1 + var2;
        (t_fine * 5 + 128) >> 8
    }
}

/// Convert centi-degrees to degrees Celsius for display and logging
pub fn centi_to_celsius(centi: i64) -> f64 {
    centi as f64 / 100.0
}
