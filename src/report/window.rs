use std::str::FromStr;

use chrono::Duration;

use crate::error::TrackError;

/// A trailing report window parsed from a human-entered spec like
/// "2 weeks", "1 hour" or just "day" (amount defaults to 1). The original
/// spec string is kept around for the report title.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportWindow {
    spec: String,
    seconds: f64,
}

impl ReportWindow {
    pub fn parse(input: &str) -> Result<Self, TrackError> {
        let invalid = || TrackError::InvalidWindow {
            input: input.to_string(),
        };

        let tokens = input.split(' ').collect::<Vec<_>>();
        let (amount, unit) = match tokens.as_slice() {
            [unit] => (1., *unit),
            [amount, unit] => (amount.parse::<f64>().map_err(|_| invalid())?, *unit),
            _ => return Err(invalid()),
        };

        // Pluralization must agree with the amount: "1 hours" and
        // "2 hour" are both rejected.
        let singular = if amount == 1. {
            unit
        } else {
            unit.strip_suffix('s').ok_or_else(invalid)?
        };

        let seconds = amount * unit_seconds(singular).ok_or_else(invalid)?;
        Ok(Self {
            spec: input.to_string(),
            seconds,
        })
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    pub fn as_duration(&self) -> Duration {
        Duration::milliseconds((self.seconds * 1000.) as i64)
    }
}

impl FromStr for ReportWindow {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportWindow::parse(s)
    }
}

/// 30-day months and 365-day years are deliberate approximations, kept
/// exact so that report windows stay reproducible.
fn unit_seconds(unit: &str) -> Option<f64> {
    Some(match unit {
        "second" => 1.,
        "minute" => 60.,
        "hour" => 3600.,
        "day" => 86_400.,
        "week" => 604_800.,
        "month" => 2_592_000.,
        "year" => 31_536_000.,
        _ => return None,
    })
}
