//! Data type registry
//!
//! The single source of truth mapping canonical type ids to platform sample
//! identifiers, default units and aggregation modes. Built once per process
//! and never mutated.

use crate::health::types::AggregationMode::{self, Cumulative, Discrete};
use crate::health::types::{DataKind, DataType};
use crate::health::units::{self, UnitDescriptor};
use std::collections::HashMap;
use std::sync::OnceLock;

const fn quantity(
    id: &'static str,
    store_identifier: &'static str,
    unit: UnitDescriptor,
    display_name: &'static str,
    aggregation: AggregationMode,
) -> DataType {
    DataType {
        id,
        store_identifier: Some(store_identifier),
        default_unit: Some(unit),
        display_name,
        kind: DataKind::Quantity,
        aggregation,
        writable: true,
    }
}

/// Built-in type table, in display order
const BUILTIN_TYPES: &[DataType] = &[
    quantity("steps", "HKQuantityTypeIdentifierStepCount", units::COUNT, "Steps", Cumulative),
    quantity(
        "distance_walking_running",
        "HKQuantityTypeIdentifierDistanceWalkingRunning",
        units::METER,
        "Walking + Running Distance",
        Cumulative,
    ),
    quantity(
        "distance_cycling",
        "HKQuantityTypeIdentifierDistanceCycling",
        units::METER,
        "Cycling Distance",
        Cumulative,
    ),
    quantity(
        "flights_climbed",
        "HKQuantityTypeIdentifierFlightsClimbed",
        units::COUNT,
        "Flights Climbed",
        Cumulative,
    ),
    quantity(
        "active_energy",
        "HKQuantityTypeIdentifierActiveEnergyBurned",
        units::KILOCALORIE,
        "Active Energy",
        Cumulative,
    ),
    quantity(
        "basal_energy",
        "HKQuantityTypeIdentifierBasalEnergyBurned",
        units::KILOCALORIE,
        "Resting Energy",
        Cumulative,
    ),
    quantity(
        "heart_rate",
        "HKQuantityTypeIdentifierHeartRate",
        units::BEATS_PER_MINUTE,
        "Heart Rate",
        Discrete,
    ),
    quantity(
        "resting_heart_rate",
        "HKQuantityTypeIdentifierRestingHeartRate",
        units::BEATS_PER_MINUTE,
        "Resting Heart Rate",
        Discrete,
    ),
    quantity(
        "respiratory_rate",
        "HKQuantityTypeIdentifierRespiratoryRate",
        units::BEATS_PER_MINUTE,
        "Respiratory Rate",
        Discrete,
    ),
    quantity("weight", "HKQuantityTypeIdentifierBodyMass", units::KILOGRAM, "Weight", Discrete),
    quantity("height", "HKQuantityTypeIdentifierHeight", units::CENTIMETER, "Height", Discrete),
    quantity(
        "lean_body_mass",
        "HKQuantityTypeIdentifierLeanBodyMass",
        units::KILOGRAM,
        "Lean Body Mass",
        Discrete,
    ),
    quantity(
        "body_mass_index",
        "HKQuantityTypeIdentifierBodyMassIndex",
        units::COUNT,
        "Body Mass Index",
        Discrete,
    ),
    quantity(
        "body_fat_percentage",
        "HKQuantityTypeIdentifierBodyFatPercentage",
        units::PERCENT,
        "Body Fat Percentage",
        Discrete,
    ),
    quantity(
        "body_temperature",
        "HKQuantityTypeIdentifierBodyTemperature",
        units::CELSIUS,
        "Body Temperature",
        Discrete,
    ),
    quantity(
        "blood_pressure_systolic",
        "HKQuantityTypeIdentifierBloodPressureSystolic",
        units::MILLIMETER_OF_MERCURY,
        "Blood Pressure (Systolic)",
        Discrete,
    ),
    quantity(
        "blood_pressure_diastolic",
        "HKQuantityTypeIdentifierBloodPressureDiastolic",
        units::MILLIMETER_OF_MERCURY,
        "Blood Pressure (Diastolic)",
        Discrete,
    ),
    quantity(
        "blood_glucose",
        "HKQuantityTypeIdentifierBloodGlucose",
        units::MILLIGRAMS_PER_DECILITER,
        "Blood Glucose",
        Discrete,
    ),
    quantity(
        "oxygen_saturation",
        "HKQuantityTypeIdentifierOxygenSaturation",
        units::PERCENT,
        "Oxygen Saturation",
        Discrete,
    ),
    DataType {
        id: "sleep",
        store_identifier: Some("HKCategoryTypeIdentifierSleepAnalysis"),
        default_unit: None,
        display_name: "Sleep Analysis",
        kind: DataKind::Category,
        aggregation: Discrete,
        writable: false,
    },
    DataType {
        id: "workouts",
        store_identifier: None,
        default_unit: None,
        display_name: "Workouts",
        kind: DataKind::Composite,
        aggregation: Discrete,
        writable: true,
    },
    DataType {
        id: "activity_summary",
        store_identifier: None,
        default_unit: None,
        display_name: "Activity Summary",
        kind: DataKind::Composite,
        aggregation: Discrete,
        writable: false,
    },
];

/// Immutable lookup over the built-in type table
#[derive(Debug)]
pub struct DataTypeRegistry {
    types: &'static [DataType],
    by_id: HashMap<&'static str, usize>,
}

impl DataTypeRegistry {
    fn new(types: &'static [DataType]) -> Self {
        let by_id = types
            .iter()
            .enumerate()
            .map(|(index, data_type)| (data_type.id, index))
            .collect();
        Self { types, by_id }
    }

    /// Exact, case-sensitive lookup by canonical id
    pub fn resolve(&self, id: &str) -> Option<&'static DataType> {
        let types = self.types;
        self.by_id.get(id).map(|&index| &types[index])
    }

    /// Every type in table order
    pub fn iter(&self) -> impl Iterator<Item = &'static DataType> {
        self.types.iter()
    }

    /// Every type that can be read
    pub fn all_readable(&self) -> Vec<&'static DataType> {
        self.types.iter().collect()
    }

    /// Every type that can be written, through either write path
    pub fn all_writable(&self) -> Vec<&'static DataType> {
        self.types.iter().filter(|t| t.writable).collect()
    }

    /// Canonical ids, for error messages and tool descriptions
    pub fn ids(&self) -> Vec<&'static str> {
        self.types.iter().map(|t| t.id).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

static REGISTRY: OnceLock<DataTypeRegistry> = OnceLock::new();

/// The process-wide registry
pub fn registry() -> &'static DataTypeRegistry {
    REGISTRY.get_or_init(|| DataTypeRegistry::new(BUILTIN_TYPES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_resolve_exact_match() {
        let steps = registry().resolve("steps").unwrap();
        assert_eq!(steps.store_identifier, Some("HKQuantityTypeIdentifierStepCount"));
        assert_eq!(steps.default_unit, Some(units::COUNT));
        assert_eq!(steps.display_name, "Steps");

        assert!(registry().resolve("Steps").is_none());
        assert!(registry().resolve("step").is_none());
        assert!(registry().resolve(" steps").is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<_> = registry().iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), registry().len());
    }

    #[test]
    fn test_quantity_types_have_identifier_and_unit() {
        for data_type in registry().iter() {
            if data_type.kind == DataKind::Quantity {
                assert!(data_type.store_identifier.is_some(), "{}", data_type.id);
                assert!(data_type.default_unit.is_some(), "{}", data_type.id);
            } else {
                assert!(data_type.default_unit.is_none(), "{}", data_type.id);
            }
        }
    }

    #[test]
    fn test_capability_sets() {
        let readable: HashSet<_> = registry().all_readable().iter().map(|t| t.id).collect();
        let writable: HashSet<_> = registry().all_writable().iter().map(|t| t.id).collect();

        assert!(readable.contains("sleep"));
        assert!(readable.contains("activity_summary"));
        assert!(!writable.contains("sleep"));
        assert!(!writable.contains("activity_summary"));
        assert!(writable.contains("workouts"));
        assert!(writable.contains("weight"));
        assert!(writable.is_subset(&readable));
    }

    #[test]
    fn test_aggregation_modes() {
        let cumulative: Vec<_> = registry()
            .iter()
            .filter(|t| t.is_cumulative())
            .map(|t| t.id)
            .collect();

        assert_eq!(
            cumulative,
            vec![
                "steps",
                "distance_walking_running",
                "distance_cycling",
                "flights_climbed",
                "active_energy",
                "basal_energy"
            ]
        );
        assert!(!registry().resolve("heart_rate").unwrap().is_cumulative());
        assert!(!registry().resolve("weight").unwrap().is_cumulative());
    }
}
