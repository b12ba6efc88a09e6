use crate::config::Config as HhmConfig;
use log4rs::{
    append::console::ConsoleAppender,
    append::rolling_file::{
        policy::compound::{
            roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
        },
        RollingFileAppender,
    },
    config::{Appender, Config, Logger, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};

#[derive(Debug, Clone, Copy)]
pub enum LogTarget {
    Cli,
    Daemon,
    Management,
}

impl LogTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTarget::Cli => "cli",
            LogTarget::Daemon => "daemon",
            LogTarget::Management => "management",
        }
    }
}

fn create_stdout_appender() -> ConsoleAppender {
    let pattern = "{d(%Y-%m-%d %H:%M:%S%.3f %Z)} [{h({l})}] - {m} (({f}:{L})){n}";
    ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build()
}

fn create_rolling_file_appender(
    base_path: &std::path::Path,
    pattern: &str,
) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let log_file_path = base_path.with_extension("log");
    let roll_pattern = format!("{}.{{}}.log", base_path.to_string_lossy());

    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(&roll_pattern, 5)?;

    let trigger = SizeTrigger::new(10 * 1024 * 1024);
    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build(log_file_path.to_str().unwrap(), Box::new(policy))
        .map_err(|e| e.into())
}

fn setup_target_logger(
    config: &HhmConfig,
    target: LogTarget,
    pattern: &str,
) -> Result<Appender, Box<dyn std::error::Error>> {
    let base_path = config.hhm_dirs.log_dir.join(target.as_str());
    let rolling_file = create_rolling_file_appender(&base_path, pattern)?;

    Ok(Appender::builder()
        .filter(Box::new(ThresholdFilter::new(log::LevelFilter::Info)))
        .build(target.as_str(), Box::new(rolling_file)))
}

pub fn init_logger(config: &HhmConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pattern = "{d(%Y-%m-%d %H:%M:%S%.3f %Z)} - {h({l})} - {m} (({f}:{L})){n}";

    std::fs::create_dir_all(config.hhm_dirs.log_dir.as_path())?;

    let stdout = create_stdout_appender();
    let daemon = setup_target_logger(config, LogTarget::Daemon, pattern)?;
    let cli = setup_target_logger(config, LogTarget::Cli, pattern)?;
    let management = setup_target_logger(config, LogTarget::Management, pattern)?;

    let daemon_logger = Logger::builder()
        .appender("daemon")
        .appender("stdout")
        .additive(false)
        .build("daemon", config.log_level);

    let cli_logger = Logger::builder()
        .appender("cli")
        .appender("stdout")
        .additive(false)
        .build("cli", config.log_level);

    let management_logger = Logger::builder()
        .appender("management")
        .appender("stdout")
        .additive(false)
        .build("management", config.log_level);

    let tower_http_logger = Logger::builder().build("tower_http", log::LevelFilter::Warn);

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(daemon)
        .appender(cli)
        .appender(management)
        .logger(daemon_logger)
        .logger(cli_logger)
        .logger(management_logger)
        .logger(tower_http_logger)
        .build(Root::builder().build(config.log_level))?;

    log4rs::init_config(config)?;

    Ok(())
}
