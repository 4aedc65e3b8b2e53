// Logging macros
//
// The formatted message is passed through the global redactor. Structured
// fields go before a `;` and are logged as given.

#[macro_export]
macro_rules! redacted_info {
    ($($key:ident = $value:expr),+ ; $($arg:tt)+) => {
        $crate::tracing::info!($($key = $value),+ , "{}", $crate::redact(&format!($($arg)+)))
    };
    ($($arg:tt)+) => {
        $crate::tracing::info!("{}", $crate::redact(&format!($($arg)+)))
    };
}

#[macro_export]
macro_rules! redacted_warn {
    ($($key:ident = $value:expr),+ ; $($arg:tt)+) => {
        $crate::tracing::warn!($($key = $value),+ , "{}", $crate::redact(&format!($($arg)+)))
    };
    ($($arg:tt)+) => {
        $crate::tracing::warn!("{}", $crate::redact(&format!($($arg)+)))
    };
}

#[macro_export]
macro_rules! redacted_error {
    ($($key:ident = $value:expr),+ ; $($arg:tt)+) => {
        $crate::tracing::error!($($key = $value),+ , "{}", $crate::redact(&format!($($arg)+)))
    };
    ($($arg:tt)+) => {
        $crate::tracing::error!("{}", $crate::redact(&format!($($arg)+)))
    };
}
