//! Attribute map → sensor descriptors.
//!
//! Readings come as `<Name>_value` / `<Name>_unit` pairs. The value sibling
//! gets its unit and device class from the pair; kilometre readings are
//! converted to miles when the unit policy asks for it. Conversion and unit
//! classification are independent steps: a value that does not parse as an
//! integer keeps its text unchanged but is still classified.

use crate::vehicle::Attributes;
use log::debug;
use serde::Serialize;

pub const VALUE_SUFFIX: &str = "_value";
pub const UNIT_SUFFIX: &str = "_unit";

const KM_PER_MILE_FACTOR: f64 = 0.62137;

pub const STATE_OF_CHARGE: &str = "EV_Battery_State_of_Charge";
pub const TIME_TO_FULLY_CHARGE: &str = "EV_Time_To_Fully_Charge";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorDescriptor {
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
    pub device_class: Option<String>,
}

impl SensorDescriptor {
    fn plain(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            unit: None,
            device_class: None,
        }
    }
}

/// Whether km readings should be shown in miles.
///
/// An explicit override always converts; otherwise convert unless Home
/// Assistant already measures length in km.
pub fn should_convert_km_to_miles(force: bool, ha_length_unit: &str) -> bool {
    force || ha_length_unit != "km"
}

/// Key of the unit sibling for a `_value` key, `None` for any other key.
pub fn paired_unit_key(key: &str) -> Option<String> {
    key.strip_suffix(VALUE_SUFFIX)
        .map(|prefix| format!("{prefix}{UNIT_SUFFIX}"))
}

/// One descriptor per attribute, in attribute order.
pub fn sensors_from_attributes(
    attributes: &Attributes,
    convert_km: bool,
) -> Vec<SensorDescriptor> {
    attributes
        .iter()
        .map(|(key, value)| {
            let mut sensor = SensorDescriptor::plain(key, value);

            if let Some(unit_key) = paired_unit_key(key) {
                let mut unit = attributes.get(&unit_key).map(str::to_string);

                if unit.as_deref() == Some("km") {
                    sensor.device_class = Some("distance".to_string());

                    if convert_km {
                        match value.trim().parse::<i64>() {
                            Ok(km) => {
                                sensor.value = format_miles(km);
                                unit = Some("mi".to_string());
                            }
                            Err(_) => {
                                debug!("[Sync] {} is not an integer, not converting", key);
                            }
                        }
                    }
                }

                classify_unit(&mut sensor, unit);
            }

            sensor
        })
        .collect()
}

/// Two decimals, ties to even (500 km is exactly 310.685 mi → 310.68).
fn format_miles(km: i64) -> String {
    let miles = (km as f64 * KM_PER_MILE_FACTOR * 100.0).round_ties_even() / 100.0;
    miles.to_string()
}

fn classify_unit(sensor: &mut SensorDescriptor, unit: Option<String>) {
    match unit.as_deref() {
        Some("volts") => {
            sensor.device_class = Some("voltage".to_string());
            sensor.unit = Some("V".to_string());
        }
        None | Some("null") => sensor.unit = Some(String::new()),
        Some(_) => sensor.unit = unit,
    }
}

/// Fixed device class/unit for sensors Home Assistant must understand.
///
/// Applied after the generic pass; a no-op when the vehicle lacks the sensor.
pub fn apply_overrides(sensors: &mut [SensorDescriptor]) {
    for sensor in sensors.iter_mut() {
        let (class, unit) = match sensor.name.as_str() {
            STATE_OF_CHARGE => ("battery", "%"),
            TIME_TO_FULLY_CHARGE => ("duration", "min"),
            _ => continue,
        };
        sensor.device_class = Some(class.to_string());
        sensor.unit = Some(unit.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().copied().collect()
    }

    fn find<'a>(sensors: &'a [SensorDescriptor], name: &str) -> &'a SensorDescriptor {
        sensors.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_range_converted_to_miles() {
        let sensors =
            sensors_from_attributes(&attrs(&[("Range_value", "100"), ("Range_unit", "km")]), true);
        let range = find(&sensors, "Range_value");
        assert_eq!(range.value, "62.14");
        assert_eq!(range.unit.as_deref(), Some("mi"));
        assert_eq!(range.device_class.as_deref(), Some("distance"));
    }

    #[test]
    fn test_range_kept_in_km_without_conversion() {
        let sensors =
            sensors_from_attributes(&attrs(&[("Range_value", "100"), ("Range_unit", "km")]), false);
        let range = find(&sensors, "Range_value");
        assert_eq!(range.value, "100");
        assert_eq!(range.unit.as_deref(), Some("km"));
        assert_eq!(range.device_class.as_deref(), Some("distance"));
    }

    #[test]
    fn test_non_integer_km_keeps_value_and_unit() {
        let sensors =
            sensors_from_attributes(&attrs(&[("Range_value", "99.5"), ("Range_unit", "km")]), true);
        let range = find(&sensors, "Range_value");
        assert_eq!(range.value, "99.5");
        assert_eq!(range.unit.as_deref(), Some("km"));
        assert_eq!(range.device_class.as_deref(), Some("distance"));
    }

    #[test]
    fn test_conversion_rounds_to_two_decimals() {
        for (km, expected) in [
            ("0", "0"),
            ("1", "0.62"),
            ("12345", "7670.81"),
            ("-10", "-6.21"),
            ("500", "310.68"),
            ("2500", "1553.42"),
        ] {
            let sensors =
                sensors_from_attributes(&attrs(&[("Odo_value", km), ("Odo_unit", "km")]), true);
            assert_eq!(find(&sensors, "Odo_value").value, expected, "km = {km}");
        }
    }

    #[test]
    fn test_volts_classified() {
        let sensors = sensors_from_attributes(
            &attrs(&[("Battery_Voltage_value", "400"), ("Battery_Voltage_unit", "volts")]),
            true,
        );
        let voltage = find(&sensors, "Battery_Voltage_value");
        assert_eq!(voltage.value, "400");
        assert_eq!(voltage.unit.as_deref(), Some("V"));
        assert_eq!(voltage.device_class.as_deref(), Some("voltage"));
    }

    #[test]
    fn test_null_or_missing_unit_becomes_empty() {
        let sensors = sensors_from_attributes(
            &attrs(&[("Pressure_value", "2.4"), ("Pressure_unit", "null"), ("Lonely_value", "7")]),
            true,
        );
        assert_eq!(find(&sensors, "Pressure_value").unit.as_deref(), Some(""));
        assert_eq!(find(&sensors, "Lonely_value").unit.as_deref(), Some(""));
        assert!(find(&sensors, "Pressure_value").device_class.is_none());
    }

    #[test]
    fn test_other_units_pass_through() {
        let sensors =
            sensors_from_attributes(&attrs(&[("Temp_value", "21"), ("Temp_unit", "°C")]), true);
        let temp = find(&sensors, "Temp_value");
        assert_eq!(temp.unit.as_deref(), Some("°C"));
        assert!(temp.device_class.is_none());
    }

    #[test]
    fn test_unpaired_keys_have_no_unit() {
        let sensors = sensors_from_attributes(
            &attrs(&[("Doors_Locked", "true"), ("Range_unit", "km")]),
            true,
        );
        assert_eq!(sensors.len(), 2);
        for sensor in &sensors {
            assert!(sensor.unit.is_none());
            assert!(sensor.device_class.is_none());
        }
        // Unit siblings are sensors of their own, verbatim.
        assert_eq!(find(&sensors, "Range_unit").value, "km");
    }

    #[test]
    fn test_order_follows_attributes() {
        let sensors = sensors_from_attributes(&attrs(&[("b", "1"), ("a", "2"), ("c", "3")]), true);
        let names: Vec<_> = sensors.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_overrides_applied_after_generic_pass() {
        let mut sensors = sensors_from_attributes(
            &attrs(&[
                (STATE_OF_CHARGE, "80"),
                (TIME_TO_FULLY_CHARGE, "45"),
                ("Other", "x"),
            ]),
            true,
        );
        apply_overrides(&mut sensors);

        let soc = find(&sensors, STATE_OF_CHARGE);
        assert_eq!(soc.device_class.as_deref(), Some("battery"));
        assert_eq!(soc.unit.as_deref(), Some("%"));
        assert_eq!(soc.value, "80");

        let ttc = find(&sensors, TIME_TO_FULLY_CHARGE);
        assert_eq!(ttc.device_class.as_deref(), Some("duration"));
        assert_eq!(ttc.unit.as_deref(), Some("min"));

        assert!(find(&sensors, "Other").unit.is_none());
    }

    #[test]
    fn test_overrides_idempotent() {
        let mut once = sensors_from_attributes(&attrs(&[(STATE_OF_CHARGE, "80")]), true);
        apply_overrides(&mut once);
        let mut twice = once.clone();
        apply_overrides(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_overrides_without_matching_sensors_is_noop() {
        let mut sensors = sensors_from_attributes(&attrs(&[("Range_value", "1")]), true);
        let before = sensors.clone();
        apply_overrides(&mut sensors);
        assert_eq!(sensors, before);
    }

    #[test]
    fn test_conversion_policy() {
        assert!(should_convert_km_to_miles(true, "km"));
        assert!(should_convert_km_to_miles(false, "mi"));
        assert!(!should_convert_km_to_miles(false, "km"));
    }

    #[test]
    fn test_paired_unit_key() {
        assert_eq!(paired_unit_key("Range_value").as_deref(), Some("Range_unit"));
        assert_eq!(paired_unit_key("Range"), None);
    }
}
