//! Launch execution: plan building, detached spawning and process status.

mod dispatch;
mod process;
mod spawn;

pub use dispatch::{DispatchError, LaunchPlan, plan_action, plan_tile};
pub use process::{
    ProcessProbe, ProcessStatusCache, STATUS_TTL, SystemProcessProbe, name_matches, parse_ps,
    parse_tasklist,
};
pub use spawn::{Spawner, SystemSpawner, open_command};
