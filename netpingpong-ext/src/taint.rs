use super::*;

pub const NO_SCHEDULE: &str = "NoSchedule";

pub trait TaintExt {
    fn new(key: impl ToString, value: impl ToString, effect: impl ToString) -> Self;
    fn no_schedule(key: impl ToString) -> Self;
}

impl TaintExt for corev1::Taint {
    fn new(key: impl ToString, value: impl ToString, effect: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            value: Some(value.to_string()),
            effect: effect.to_string(),
            ..default()
        }
    }

    /// A valueless `NoSchedule` taint, the shape used for readiness gates.
    fn no_schedule(key: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            effect: NO_SCHEDULE.to_string(),
            ..default()
        }
    }
}
