use hhm_core::manager::HintedHandoffManager;
use hhm_utils::config::Config;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub struct AppContext {
    pub config: Config,
    pub manager: HintedHandoffManager,
    pub shutdown_flag: Arc<AtomicBool>,
}
