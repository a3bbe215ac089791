//! Vital-sign grouping for Observation records.
//!
//! Observations are partitioned by LOINC code into named buckets. Codes outside the
//! fixed table keep their own bucket keyed by the raw code. Every observation is kept;
//! picking the most recent one is left to [`latest`].

use crate::coding::{CodedValue, LOINC, OBSERVATION_CATEGORY};
use crate::resources::observation::{ObservationComponentData, ObservationData};
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::BTreeMap;

pub const SYSTOLIC_CODE: &str = "8480-6";
pub const DIASTOLIC_CODE: &str = "8462-4";
pub const VITAL_SIGNS_CATEGORY: &str = "vital-signs";

/// The well-known vital sign buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VitalKey {
    HeartRate,
    BloodPressure,
    SatO2,
    Temperature,
    RespiratoryRate,
    Weight,
    Height,
    Bmi,
}

impl VitalKey {
    pub const ALL: [VitalKey; 8] = [
        VitalKey::HeartRate,
        VitalKey::BloodPressure,
        VitalKey::SatO2,
        VitalKey::Temperature,
        VitalKey::RespiratoryRate,
        VitalKey::Weight,
        VitalKey::Height,
        VitalKey::Bmi,
    ];

    pub fn from_loinc(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.loinc_code() == code)
    }

    pub fn loinc_code(self) -> &'static str {
        match self {
            VitalKey::HeartRate => "8867-4",
            VitalKey::BloodPressure => "85354-9",
            VitalKey::SatO2 => "59408-5",
            VitalKey::Temperature => "8310-5",
            VitalKey::RespiratoryRate => "9279-1",
            VitalKey::Weight => "29463-7",
            VitalKey::Height => "8302-2",
            VitalKey::Bmi => "39156-5",
        }
    }

    /// Bucket name as used by callers (`heartRate`, `bloodPressure`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            VitalKey::HeartRate => "heartRate",
            VitalKey::BloodPressure => "bloodPressure",
            VitalKey::SatO2 => "satO2",
            VitalKey::Temperature => "temperature",
            VitalKey::RespiratoryRate => "respiratoryRate",
            VitalKey::Weight => "weight",
            VitalKey::Height => "height",
            VitalKey::Bmi => "bmi",
        }
    }

    pub fn display(self) -> &'static str {
        match self {
            VitalKey::HeartRate => "Heart rate",
            VitalKey::BloodPressure => "Blood pressure panel with all children optional",
            VitalKey::SatO2 => "Oxygen saturation in Arterial blood by Pulse oximetry",
            VitalKey::Temperature => "Body temperature",
            VitalKey::RespiratoryRate => "Respiratory rate",
            VitalKey::Weight => "Body weight",
            VitalKey::Height => "Body height",
            VitalKey::Bmi => "Body mass index (BMI) [Ratio]",
        }
    }

    /// UCUM unit. Blood pressure carries its unit on the components instead.
    pub fn unit(self) -> &'static str {
        match self {
            VitalKey::HeartRate | VitalKey::RespiratoryRate => "/min",
            VitalKey::BloodPressure => "mm[Hg]",
            VitalKey::SatO2 => "%",
            VitalKey::Temperature => "Cel",
            VitalKey::Weight => "kg",
            VitalKey::Height => "cm",
            VitalKey::Bmi => "kg/m2",
        }
    }
}

/// Observations grouped by vital sign.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VitalSigns {
    pub heart_rate: Vec<ObservationData>,
    pub blood_pressure: Vec<ObservationData>,
    pub sat_o2: Vec<ObservationData>,
    pub temperature: Vec<ObservationData>,
    pub respiratory_rate: Vec<ObservationData>,
    pub weight: Vec<ObservationData>,
    pub height: Vec<ObservationData>,
    pub bmi: Vec<ObservationData>,
    /// Buckets for codes outside the fixed table, keyed by raw code.
    pub other: BTreeMap<String, Vec<ObservationData>>,
}

impl VitalSigns {
    pub fn get(&self, key: VitalKey) -> &[ObservationData] {
        match key {
            VitalKey::HeartRate => &self.heart_rate,
            VitalKey::BloodPressure => &self.blood_pressure,
            VitalKey::SatO2 => &self.sat_o2,
            VitalKey::Temperature => &self.temperature,
            VitalKey::RespiratoryRate => &self.respiratory_rate,
            VitalKey::Weight => &self.weight,
            VitalKey::Height => &self.height,
            VitalKey::Bmi => &self.bmi,
        }
    }

    fn bucket_mut(&mut self, key: VitalKey) -> &mut Vec<ObservationData> {
        match key {
            VitalKey::HeartRate => &mut self.heart_rate,
            VitalKey::BloodPressure => &mut self.blood_pressure,
            VitalKey::SatO2 => &mut self.sat_o2,
            VitalKey::Temperature => &mut self.temperature,
            VitalKey::RespiratoryRate => &mut self.respiratory_rate,
            VitalKey::Weight => &mut self.weight,
            VitalKey::Height => &mut self.height,
            VitalKey::Bmi => &mut self.bmi,
        }
    }

    /// Bucket by name: either a [`VitalKey::as_str`] name or a raw code.
    pub fn bucket(&self, name: &str) -> Option<&[ObservationData]> {
        VitalKey::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .map(|k| self.get(k))
            .or_else(|| self.other.get(name).map(Vec::as_slice))
    }

    pub fn is_empty(&self) -> bool {
        VitalKey::ALL.into_iter().all(|k| self.get(k).is_empty()) && self.other.is_empty()
    }
}

/// Partition observations into vital sign buckets, keeping input order in each bucket.
pub fn group_by_vital_code(observations: &[ObservationData]) -> VitalSigns {
    let mut vitals = VitalSigns::default();
    for observation in observations {
        match VitalKey::from_loinc(&observation.code) {
            Some(key) => vitals.bucket_mut(key).push(observation.clone()),
            None => vitals
                .other
                .entry(observation.code.clone())
                .or_default()
                .push(observation.clone()),
        }
    }
    vitals
}

/// Systolic/diastolic values of a blood pressure observation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BloodPressure {
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
}

/// Read the systolic and diastolic components. Missing components are `None`.
pub fn blood_pressure(observation: &ObservationData) -> BloodPressure {
    let value = |code: &str| observation.component(code).and_then(|c| c.value);
    BloodPressure {
        systolic: value(SYSTOLIC_CODE),
        diastolic: value(DIASTOLIC_CODE),
    }
}

/// Most recent observation by effective time.
///
/// Accepts RFC 3339 date-times and plain dates. Observations whose effective time does
/// not parse rank before every dated one; ties keep the later observation.
pub fn latest(observations: &[ObservationData]) -> Option<&ObservationData> {
    observations
        .iter()
        .max_by_key(|o| effective_time(&o.effective_date_time))
}

fn effective_time(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().fixed_offset())
}

/// A new, unsaved vital sign observation with the standard LOINC coding.
///
/// Blood pressure values go in components, so `value` is ignored for
/// [`VitalKey::BloodPressure`]. Use [`new_blood_pressure_observation`] instead.
pub fn new_vital_observation(
    key: VitalKey,
    subject: &str,
    value: f64,
    effective_date_time: &str,
) -> ObservationData {
    let mut observation = vital_template(key, subject, effective_date_time);
    if key != VitalKey::BloodPressure {
        observation.value = Some(value);
        observation.unit = Some(key.unit().to_string());
    }
    observation
}

pub fn new_blood_pressure_observation(
    subject: &str,
    systolic: f64,
    diastolic: f64,
    effective_date_time: &str,
) -> ObservationData {
    let component = |code: &str, display: &str, value: f64| ObservationComponentData {
        code: code.to_string(),
        display: display.to_string(),
        system: LOINC.to_string(),
        value: Some(value),
        unit: Some(VitalKey::BloodPressure.unit().to_string()),
    };

    let mut observation = vital_template(VitalKey::BloodPressure, subject, effective_date_time);
    observation.components = vec![
        component(SYSTOLIC_CODE, "Systolic blood pressure", systolic),
        component(DIASTOLIC_CODE, "Diastolic blood pressure", diastolic),
    ];
    observation
}

fn vital_template(key: VitalKey, subject: &str, effective_date_time: &str) -> ObservationData {
    ObservationData {
        status: "final".to_string(),
        category: CodedValue::new(OBSERVATION_CATEGORY, VITAL_SIGNS_CATEGORY, "Vital Signs"),
        code: key.loinc_code().to_string(),
        display: key.display().to_string(),
        system: LOINC.to_string(),
        subject: subject.to_string(),
        effective_date_time: effective_date_time.to_string(),
        ..ObservationData::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{ResourceMapper, WriteMode};
    use crate::resources::observation::ObservationMapper;

    fn heart_rate(at: &str, bpm: f64) -> ObservationData {
        new_vital_observation(VitalKey::HeartRate, "p-1", bpm, at)
    }

    #[test]
    fn groups_every_observation_by_code() {
        let observations = vec![
            heart_rate("2024-01-01T08:00:00Z", 70.0),
            heart_rate("2024-01-02T08:00:00Z", 74.0),
            new_blood_pressure_observation("p-1", 120.0, 80.0, "2024-01-02T08:05:00Z"),
            heart_rate("2024-01-03T08:00:00Z", 68.0),
        ];

        let vitals = group_by_vital_code(&observations);
        assert_eq!(vitals.heart_rate.len(), 3);
        assert_eq!(vitals.blood_pressure.len(), 1);
        assert!(vitals.other.is_empty());
        assert!(vitals.weight.is_empty());

        let bp = blood_pressure(&vitals.blood_pressure[0]);
        assert_eq!(
            bp,
            BloodPressure {
                systolic: Some(120.0),
                diastolic: Some(80.0)
            }
        );
    }

    #[test]
    fn unknown_codes_get_their_own_bucket() {
        let glucose = ObservationData {
            code: "2339-0".into(),
            ..ObservationData::default()
        };
        let vitals = group_by_vital_code(&[glucose.clone(), glucose]);
        assert_eq!(vitals.other.get("2339-0").map(Vec::len), Some(2));
        assert_eq!(vitals.bucket("2339-0").map(<[_]>::len), Some(2));
        assert_eq!(vitals.bucket("heartRate").map(<[_]>::len), Some(0));
        assert_eq!(vitals.bucket("nothing"), None);
    }

    #[test]
    fn missing_components_are_none() {
        let mut obs = new_blood_pressure_observation("p-1", 130.0, 85.0, "2024-01-01");
        obs.components.retain(|c| c.code == SYSTOLIC_CODE);
        assert_eq!(
            blood_pressure(&obs),
            BloodPressure {
                systolic: Some(130.0),
                diastolic: None
            }
        );
        assert_eq!(
            blood_pressure(&ObservationData::default()),
            BloodPressure::default()
        );
    }

    #[test]
    fn latest_picks_most_recent_effective_time() {
        let observations = vec![
            heart_rate("2024-01-02T08:00:00+01:00", 74.0),
            heart_rate("not a date", 99.0),
            heart_rate("2024-01-02T07:30:00Z", 68.0),
            heart_rate("2024-01-01", 70.0),
        ];
        let newest = latest(&observations).expect("latest");
        assert_eq!(newest.value, Some(68.0));
        assert_eq!(latest(&[]), None);
    }

    #[test]
    fn new_vital_observation_is_submittable() {
        let obs = new_vital_observation(VitalKey::Weight, "p-1", 71.5, "2024-02-01T10:00:00Z");
        assert!(ObservationMapper::validate(&obs).is_empty());

        let json = ObservationMapper::to_value(&obs, WriteMode::Create).expect("json");
        assert_eq!(json["code"]["coding"][0]["code"], "29463-7");
        assert_eq!(json["category"][0]["coding"][0]["code"], "vital-signs");
        assert_eq!(json["valueQuantity"]["unit"], "kg");
    }

    #[test]
    fn loinc_table_round_trips() {
        for key in VitalKey::ALL {
            assert_eq!(VitalKey::from_loinc(key.loinc_code()), Some(key));
        }
        assert_eq!(VitalKey::from_loinc("0000-0"), None);
    }
}
