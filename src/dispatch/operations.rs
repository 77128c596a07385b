//! Fixed operation table shared by the CLI and the tool server
//!
//! Each operation is named once here with its CLI path, its required
//! arguments and its optional arguments with per-surface defaults. Nothing
//! else in the crate holds argument defaults.

/// Which front end a request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Cli,
    Protocol,
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Surface::Cli => write!(f, "cli"),
            Surface::Protocol => write!(f, "protocol"),
        }
    }
}

/// What an operation does once its arguments are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Status,
    ListTypes,
    Authorize,
    ReadSteps,
    ReadHeartRate,
    ReadWorkouts,
    ReadActivity,
    ReadQuantity,
    WriteQuantity,
    WriteWorkout,
    QueryStats,
    QueryTrends,
}

/// An optional argument and its defaults on each surface
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub cli_default: Option<&'static str>,
    pub protocol_default: Option<&'static str>,
}

impl ArgSpec {
    pub fn default_for(&self, surface: Surface) -> Option<&'static str> {
        match surface {
            Surface::Cli => self.cli_default,
            Surface::Protocol => self.protocol_default,
        }
    }
}

const fn arg(name: &'static str, cli: &'static str, protocol: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        cli_default: Some(cli),
        protocol_default: Some(protocol),
    }
}

const fn opt(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        cli_default: None,
        protocol_default: None,
    }
}

/// One named operation
#[derive(Debug)]
pub struct Operation {
    /// Tool name, e.g. `health_read_steps`
    pub name: &'static str,
    /// Matching CLI command path, e.g. `read steps`
    pub cli_path: &'static str,
    pub description: &'static str,
    pub kind: OperationKind,
    pub required: &'static [&'static str],
    pub optional: &'static [ArgSpec],
}

impl Operation {
    /// Spec for an optional argument
    pub fn optional_arg(&self, name: &str) -> Option<&ArgSpec> {
        self.optional.iter().find(|a| a.name == name)
    }
}

pub const OPERATIONS: &[Operation] = &[
    Operation {
        name: "health_status",
        cli_path: "status",
        description: "Check whether health data is available and the authorization state of each data type.",
        kind: OperationKind::Status,
        required: &[],
        optional: &[],
    },
    Operation {
        name: "health_list_types",
        cli_path: "types",
        description: "List every supported data type with its display name, kind, default unit, aggregation mode and whether it can be written.",
        kind: OperationKind::ListTypes,
        required: &[],
        optional: &[],
    },
    Operation {
        name: "health_authorize",
        cli_path: "authorize",
        description: "Request access to health data. Arguments: types (list of data type ids, default all), read_only (boolean, default false).",
        kind: OperationKind::Authorize,
        required: &[],
        optional: &[opt("types"), arg("read_only", "false", "false")],
    },
    Operation {
        name: "health_read_steps",
        cli_path: "read steps",
        description: "Total step count over a period. Arguments: from (date expression such as 7d, today or 2024-03-05, default 7d), to (default now).",
        kind: OperationKind::ReadSteps,
        required: &[],
        optional: &[arg("from", "1d", "7d"), arg("to", "now", "now")],
    },
    Operation {
        name: "health_read_heart_rate",
        cli_path: "read heart-rate",
        description: "Heart rate samples with average, minimum and maximum. Arguments: from (default 1d), to (default now), limit (default 100).",
        kind: OperationKind::ReadHeartRate,
        required: &[],
        optional: &[
            arg("from", "1d", "1d"),
            arg("to", "now", "now"),
            arg("limit", "100", "100"),
        ],
    },
    Operation {
        name: "health_read_workouts",
        cli_path: "read workouts",
        description: "Workouts newest first. Arguments: from (default 30d), to (default now), activity (e.g. running, cycling), limit (default 50).",
        kind: OperationKind::ReadWorkouts,
        required: &[],
        optional: &[
            arg("from", "7d", "30d"),
            arg("to", "now", "now"),
            opt("activity"),
            arg("limit", "50", "50"),
        ],
    },
    Operation {
        name: "health_read_activity",
        cli_path: "read activity",
        description: "Activity ring summary for one day. Arguments: date (default today).",
        kind: OperationKind::ReadActivity,
        required: &[],
        optional: &[arg("date", "today", "today")],
    },
    Operation {
        name: "health_read_quantity",
        cli_path: "read quantity",
        description: "Samples of any quantity type, newest first. Arguments: type (required, e.g. weight, blood_glucose), from (default 7d), to (default now), unit, limit (default 100).",
        kind: OperationKind::ReadQuantity,
        required: &["type"],
        optional: &[
            arg("from", "1d", "7d"),
            arg("to", "now", "now"),
            opt("unit"),
            arg("limit", "100", "100"),
        ],
    },
    Operation {
        name: "health_write_quantity",
        cli_path: "write quantity",
        description: "Save one quantity sample. Arguments: type (required), value (required, non-negative number), unit (default: the type's unit), date (default now).",
        kind: OperationKind::WriteQuantity,
        required: &["type", "value"],
        optional: &[opt("unit"), arg("date", "now", "now")],
    },
    Operation {
        name: "health_write_workout",
        cli_path: "write workout",
        description: "Save a workout. Arguments: activity (required), start and end (required date expressions, end after start), calories (kcal), distance (meters).",
        kind: OperationKind::WriteWorkout,
        required: &["activity", "start", "end"],
        optional: &[opt("calories"), opt("distance")],
    },
    Operation {
        name: "health_query_stats",
        cli_path: "query stats",
        description: "Statistics for a quantity type: sum for cumulative types, average/minimum/maximum/most recent for the rest. Arguments: type (required), from (default 7d), to (default now), unit.",
        kind: OperationKind::QueryStats,
        required: &["type"],
        optional: &[arg("from", "7d", "7d"), arg("to", "now", "now"), opt("unit")],
    },
    Operation {
        name: "health_query_trends",
        cli_path: "query trends",
        description: "Per-period count, sum, average, minimum and maximum. Arguments: type (required), from (default 30d), to (default now), interval (day, week or month; default day), unit.",
        kind: OperationKind::QueryTrends,
        required: &["type"],
        optional: &[
            arg("from", "30d", "30d"),
            arg("to", "now", "now"),
            arg("interval", "day", "day"),
            opt("unit"),
        ],
    },
];

/// Look up an operation by tool name
pub fn find(name: &str) -> Option<&'static Operation> {
    OPERATIONS.iter().find(|op| op.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_and_paths_unique() {
        let names: HashSet<_> = OPERATIONS.iter().map(|op| op.name).collect();
        let paths: HashSet<_> = OPERATIONS.iter().map(|op| op.cli_path).collect();
        assert_eq!(names.len(), OPERATIONS.len());
        assert_eq!(paths.len(), OPERATIONS.len());
        assert!(OPERATIONS.iter().all(|op| op.name.starts_with("health_")));
    }

    #[test]
    fn test_find() {
        assert_eq!(find("health_read_steps").unwrap().kind, OperationKind::ReadSteps);
        assert!(find("read steps").is_none());
        assert!(find("health_read_everything").is_none());
    }

    #[test]
    fn test_surface_defaults_differ_where_declared() {
        let steps = find("health_read_steps").unwrap();
        let from = steps.optional_arg("from").unwrap();
        assert_eq!(from.default_for(Surface::Cli), Some("1d"));
        assert_eq!(from.default_for(Surface::Protocol), Some("7d"));

        let workouts = find("health_read_workouts").unwrap();
        assert!(workouts.optional_arg("activity").unwrap().default_for(Surface::Cli).is_none());
    }
}
