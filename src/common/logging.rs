const LOG_TARGET: &str = "lazy_postings";

pub fn log_debug<T: AsRef<str>>(message: T) {
    log::debug!(target: LOG_TARGET, "{}", message.as_ref());
}

pub fn log_warning<T: AsRef<str>>(message: T) {
    log::warn!(target: LOG_TARGET, "{}", message.as_ref());
}

pub fn log_error<T: AsRef<str>>(message: T) {
    log::error!(target: LOG_TARGET, "{}", message.as_ref());
}
