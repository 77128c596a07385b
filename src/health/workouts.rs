//! Workout activity vocabulary

/// One accepted workout activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkoutActivity {
    /// Canonical token ("running", "strength_training")
    pub token: &'static str,
    pub display_name: &'static str,
    /// Platform activity type identifier
    pub store_identifier: &'static str,
}

const fn activity(
    token: &'static str,
    display_name: &'static str,
    store_identifier: &'static str,
) -> WorkoutActivity {
    WorkoutActivity {
        token,
        display_name,
        store_identifier,
    }
}

pub const ACTIVITIES: &[WorkoutActivity] = &[
    activity("running", "Running", "HKWorkoutActivityTypeRunning"),
    activity("walking", "Walking", "HKWorkoutActivityTypeWalking"),
    activity("cycling", "Cycling", "HKWorkoutActivityTypeCycling"),
    activity("swimming", "Swimming", "HKWorkoutActivityTypeSwimming"),
    activity("hiking", "Hiking", "HKWorkoutActivityTypeHiking"),
    activity("yoga", "Yoga", "HKWorkoutActivityTypeYoga"),
    activity(
        "strength_training",
        "Strength Training",
        "HKWorkoutActivityTypeTraditionalStrengthTraining",
    ),
    activity(
        "functional_training",
        "Functional Training",
        "HKWorkoutActivityTypeFunctionalStrengthTraining",
    ),
    activity("hiit", "HIIT", "HKWorkoutActivityTypeHighIntensityIntervalTraining"),
    activity("rowing", "Rowing", "HKWorkoutActivityTypeRowing"),
    activity("elliptical", "Elliptical", "HKWorkoutActivityTypeElliptical"),
    activity("stair_climbing", "Stair Climbing", "HKWorkoutActivityTypeStairClimbing"),
    activity("dance", "Dance", "HKWorkoutActivityTypeSocialDance"),
    activity("pilates", "Pilates", "HKWorkoutActivityTypePilates"),
    activity("other", "Other", "HKWorkoutActivityTypeOther"),
];

/// Look up an activity; case-insensitive, `-` accepted for `_`
pub fn find(token: &str) -> Option<&'static WorkoutActivity> {
    let normalized = token.trim().to_lowercase().replace('-', "_");
    ACTIVITIES.iter().find(|a| a.token == normalized)
}

/// Display name for a stored activity token, falling back to the token itself
pub fn display_name(token: &str) -> &str {
    find(token).map(|a| a.display_name).unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_normalizes() {
        assert_eq!(find("running").unwrap().display_name, "Running");
        assert_eq!(find("Strength-Training").unwrap().token, "strength_training");
        assert_eq!(find("  HIIT ").unwrap().token, "hiit");
        assert!(find("quidditch").is_none());
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(display_name("yoga"), "Yoga");
        assert_eq!(display_name("unlisted"), "unlisted");
    }
}
