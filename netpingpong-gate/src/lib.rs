use std::time::Duration;

use netpingpong_ext as k8s;
use netpingpong_kubeapi::MutateError;
use netpingpong_kubeapi::NodeMutator;
use netpingpong_kubeapi::NodeStore;

pub use config::Config;
pub use config::ConfigError;
pub use config::probe_interval;
pub use probe::ProbeOutcome;
pub use probe::Prober;
pub use probe::drain;
pub use probe::http_client;
pub use probe_loop::ProbeLoop;
pub use probe_loop::Tick;
pub use remediator::FatalError;
pub use remediator::TaintRemediator;
pub use token::read_token;

pub mod config;
mod probe;
mod probe_loop;
mod remediator;
mod token;
