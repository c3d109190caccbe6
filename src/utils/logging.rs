use tracing::{debug, error, info, warn};

/// Logs the start of a bot command in a fixed format.
pub fn log_command_start(command: &str, user_id: i64, chat_id: i64, details: Option<&str>) {
    match details {
        Some(d) => info!("CMD_START: {} by {} in chat {} - {}", command, user_id, chat_id, d),
        None => info!("CMD_START: {} by {} in chat {}", command, user_id, chat_id),
    }
}

pub fn log_command_success(command: &str, user_id: i64, chat_id: i64, details: Option<&str>) {
    match details {
        Some(d) => info!("CMD_SUCCESS: {} by {} in chat {} - {}", command, user_id, chat_id, d),
        None => info!("CMD_SUCCESS: {} by {} in chat {}", command, user_id, chat_id),
    }
}

pub fn log_command_error(command: &str, user_id: i64, chat_id: i64, error: &str) {
    error!("CMD_ERROR: {} by {} in chat {} - {}", command, user_id, chat_id, error);
}

/// Logs rejected dialogue input.
pub fn log_validation_error(step: &str, value: &str, error: &str, user_id: i64) {
    warn!(
        "VALIDATION_ERROR: step '{}' rejected '{}': {} - user {}",
        step, value, error, user_id
    );
}

pub fn log_database_operation(operation: &str, table: &str, details: Option<&str>) {
    match details {
        Some(d) => debug!("DB_OP: {} on {} - {}", operation, table, d),
        None => debug!("DB_OP: {} on {}", operation, table),
    }
}

pub fn log_database_error(operation: &str, table: &str, error: &str, details: Option<&str>) {
    match details {
        Some(d) => error!("DB_ERROR: {} on {} failed: {} - {}", operation, table, error, d),
        None => error!("DB_ERROR: {} on {} failed: {}", operation, table, error),
    }
}

/// Logs a call to Monobank, OpenWeatherMap or another outside service.
pub fn log_external_call(service: &str, operation: &str, details: Option<&str>) {
    match details {
        Some(d) => debug!("EXTERNAL: {} {} - {}", service, operation, d),
        None => debug!("EXTERNAL: {} {}", service, operation),
    }
}

pub fn log_external_error(service: &str, operation: &str, error: &str) {
    warn!("EXTERNAL_ERROR: {} {} failed: {}", service, operation, error);
}

/// Logs the outcome of one run of a background job.
pub fn log_job_run(job: &str, processed: usize, failed: usize) {
    if failed > 0 {
        warn!("JOB: {} processed {} item(s), {} failed", job, processed, failed);
    } else {
        info!("JOB: {} processed {} item(s)", job, processed);
    }
}

pub fn log_system_event(event: &str, details: Option<&str>) {
    match details {
        Some(d) => info!("SYSTEM: {} - {}", event, d),
        None => info!("SYSTEM: {}", event),
    }
}
