use std::path::Path;

pub const LOG_FILE_BASENAME: &str = "task-tracker";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 10;
pub const ENV_LOG: &str = "TASK_TRACKER_LOG";

const DEFAULT_SPEC_DEBUG: &str = "warn,task_tracker_lib=debug,task_tracker=debug";
const DEFAULT_SPEC_RELEASE: &str = "warn,task_tracker_lib=info,task_tracker=info";

/// Log files live next to the settings and the task cache.
pub fn log_directory(data_dir: &Path) -> &Path {
    data_dir
}

/// Picks the log spec: `TASK_TRACKER_LOG`, then `RUST_LOG`, then the build default.
pub fn resolve_log_spec(lookup: impl Fn(&str) -> Option<String>) -> String {
    let default_spec = if cfg!(debug_assertions) {
        DEFAULT_SPEC_DEBUG
    } else {
        DEFAULT_SPEC_RELEASE
    };
    lookup(ENV_LOG)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| lookup("RUST_LOG").filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| default_spec.to_string())
}

#[cfg(feature = "app")]
/// The returned handle must be kept alive until exit so buffered records get flushed.
pub fn init_logging(
    data_dir: &Path,
) -> Result<flexi_logger::LoggerHandle, flexi_logger::FlexiLoggerError> {
    use flexi_logger::{
        detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
    };

    std::fs::create_dir_all(data_dir)?;

    let spec = resolve_log_spec(|key| std::env::var(key).ok());
    let handle = Logger::try_with_str(spec)?
        .log_to_file(
            FileSpec::default()
                .directory(log_directory(data_dir))
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        // stdout carries command output, so diagnostics go to stderr.
        .duplicate_to_stderr(if cfg!(debug_assertions) {
            Duplicate::Info
        } else {
            Duplicate::Warn
        })
        .start()?;

    install_panic_hook();

    log::info!(
        "logger initialized dir={} rotate_size_bytes={} keep_files={}",
        log_directory(data_dir).display(),
        LOG_ROTATE_SIZE_BYTES,
        LOG_ROTATE_KEEP_FILES
    );
    Ok(handle)
}

#[cfg(feature = "app")]
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");
        let location = info
            .location()
            .map(|loc| format!("{loc}"))
            .unwrap_or_else(|| "<unknown>".to_string());
        let backtrace = std::backtrace::Backtrace::force_capture();

        log::error!("panic: payload={payload} location={location}\nbacktrace:\n{backtrace}");
        default_hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_spec_prefers_app_variable_then_rust_log() {
        let spec = resolve_log_spec(|key| match key {
            ENV_LOG => Some("debug".to_string()),
            "RUST_LOG" => Some("trace".to_string()),
            _ => None,
        });
        assert_eq!(spec, "debug");

        let spec = resolve_log_spec(|key| match key {
            ENV_LOG => Some("  ".to_string()),
            "RUST_LOG" => Some("trace".to_string()),
            _ => None,
        });
        assert_eq!(spec, "trace");

        let spec = resolve_log_spec(|_| None);
        assert!(spec.starts_with("warn,task_tracker_lib="));
    }

    #[test]
    fn log_directory_is_the_data_dir() {
        let dir = Path::new("/tmp/task-tracker");
        assert_eq!(log_directory(dir), dir);
    }
}
