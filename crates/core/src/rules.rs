//! Slot acceptance rules.
//!
//! A [`Rule`] pairs a user-facing description with a pure predicate over a
//! [`Slot`]. Rules are evaluated in order and a slot qualifies only when every
//! rule passes. Deployments describe their rules declaratively with
//! [`RuleSpec`] in the config file.

use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::slot::Slot;

pub type SlotPredicate = Arc<dyn Fn(&Slot) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Rule {
    description: String,
    predicate: SlotPredicate,
}

impl Rule {
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Slot) -> bool + Send + Sync + 'static,
    {
        Self { description: description.into(), predicate: Arc::new(predicate) }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn passes(&self, slot: &Slot) -> bool {
        (self.predicate)(slot)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("description", &self.description).finish_non_exhaustive()
    }
}

/// True when every rule accepts the slot. Stops at the first rejection.
pub fn passes_all(slot: &Slot, rules: &[Rule]) -> bool {
    rules.iter().all(|rule| rule.passes(slot))
}

pub fn filter_slots(slots: Vec<Slot>, rules: &[Rule]) -> Vec<Slot> {
    if rules.is_empty() {
        return slots;
    }
    slots.into_iter().filter(|slot| passes_all(slot, rules)).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    MinAvailability {
        min: i64,
        #[serde(default)]
        description: Option<String>,
    },
    StartsAfterHour {
        hour: u32,
        #[serde(default)]
        description: Option<String>,
    },
    StartsBeforeHour {
        hour: u32,
        #[serde(default)]
        description: Option<String>,
    },
    WeekdaysOnly {
        #[serde(default)]
        description: Option<String>,
    },
    MinDurationMinutes {
        minutes: i64,
        #[serde(default)]
        description: Option<String>,
    },
}

impl RuleSpec {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::StartsAfterHour { hour, .. } | Self::StartsBeforeHour { hour, .. }
                if *hour > 23 =>
            {
                Err(format!("rule hour must be in range 0..=23, got {hour}"))
            }
            Self::MinDurationMinutes { minutes, .. } if *minutes <= 0 => {
                Err(format!("rule minutes must be greater than zero, got {minutes}"))
            }
            _ => Ok(()),
        }
    }

    pub fn description(&self) -> String {
        let custom = match self {
            Self::MinAvailability { description, .. }
            | Self::StartsAfterHour { description, .. }
            | Self::StartsBeforeHour { description, .. }
            | Self::WeekdaysOnly { description }
            | Self::MinDurationMinutes { description, .. } => description.clone(),
        };
        if let Some(custom) = custom.filter(|value| !value.trim().is_empty()) {
            return custom;
        }

        match self {
            Self::MinAvailability { min, .. } if *min <= 1 => "Only available slots".to_owned(),
            Self::MinAvailability { min, .. } => {
                format!("Only slots with at least {min} availabilities")
            }
            Self::StartsAfterHour { hour, .. } => {
                format!("Only slots after {} (exclusive)", hour_label(*hour))
            }
            Self::StartsBeforeHour { hour, .. } => {
                format!("Only slots before {} (exclusive)", hour_label(*hour))
            }
            Self::WeekdaysOnly { .. } => "Only slots not on a weekend".to_owned(),
            Self::MinDurationMinutes { minutes, .. } => {
                format!("Only slots lasting at least {minutes} minutes")
            }
        }
    }

    pub fn build(&self) -> Rule {
        let description = self.description();
        match *self {
            Self::MinAvailability { min, .. } => {
                Rule::new(description, move |slot| slot.availabilities >= min)
            }
            Self::StartsAfterHour { hour, .. } => {
                Rule::new(description, move |slot| slot.starts.hour() > hour)
            }
            Self::StartsBeforeHour { hour, .. } => {
                Rule::new(description, move |slot| slot.starts.hour() < hour)
            }
            Self::WeekdaysOnly { .. } => Rule::new(description, |slot| {
                !matches!(slot.starts.weekday(), Weekday::Sat | Weekday::Sun)
            }),
            Self::MinDurationMinutes { minutes, .. } => {
                Rule::new(description, move |slot| slot.duration_minutes() >= minutes)
            }
        }
    }
}

pub fn default_rule_specs() -> Vec<RuleSpec> {
    vec![
        RuleSpec::MinAvailability { min: 1, description: None },
        RuleSpec::StartsAfterHour { hour: 16, description: None },
        RuleSpec::StartsBeforeHour { hour: 19, description: None },
        RuleSpec::WeekdaysOnly { description: None },
    ]
}

pub fn build_rules(specs: &[RuleSpec]) -> Vec<Rule> {
    specs.iter().map(RuleSpec::build).collect()
}

fn hour_label(hour: u32) -> String {
    match hour {
        0 => "12am".to_owned(),
        1..=11 => format!("{hour}am"),
        12 => "12pm".to_owned(),
        _ => format!("{}pm", hour - 12),
    }
}
