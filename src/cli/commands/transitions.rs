use anyhow::Result;
use clap::ValueEnum;
use std::str::FromStr;

use super::Command;
use crate::domain::{MissionStatus, ParseStatusError, StepStatus};
use crate::lifecycle::{validate_transition, Lifecycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Subject {
    Step,
    Mission,
}

pub struct TransitionsCommand {
    pub subject: Subject,
    pub from: String,
    pub to: Option<String>,
}

impl TransitionsCommand {
    pub fn new(subject: Subject, from: String, to: Option<String>) -> Self {
        Self { subject, from, to }
    }

    /// The line printed on success
    pub fn render(&self) -> Result<String> {
        match self.subject {
            Subject::Step => describe::<StepStatus>(&self.from, self.to.as_deref()),
            Subject::Mission => describe::<MissionStatus>(&self.from, self.to.as_deref()),
        }
    }
}

impl Command for TransitionsCommand {
    async fn execute(&self) -> Result<()> {
        println!("{}", self.render()?);
        Ok(())
    }
}

fn describe<S>(from: &str, to: Option<&str>) -> Result<String>
where
    S: Lifecycle + FromStr<Err = ParseStatusError>,
{
    let current: S = from.parse()?;
    match to {
        Some(to) => {
            let target: S = to.parse()?;
            validate_transition(current, target)?;
            Ok(format!("{current} -> {target}: allowed"))
        }
        None if current.is_terminal() => Ok(format!("{current} is terminal")),
        None => {
            let targets: Vec<String> = current
                .allowed_transitions()
                .iter()
                .map(ToString::to_string)
                .collect();
            Ok(format!("{current} -> {}", targets.join(", ")))
        }
    }
}
