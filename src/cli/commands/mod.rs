use anyhow::Result;

pub mod replay;
pub mod transitions;

pub use replay::{run_scenario, ReplayCommand, ReplayReport, Scenario};
pub use transitions::TransitionsCommand;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}
