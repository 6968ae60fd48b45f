//! Logging macros for ergonomic message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`, plus `attrs!`
//! for building ordered attribute maps.
//!
//! # Examples
//!
//! ```
//! use fanlog::prelude::*;
//! use fanlog::{attrs, info};
//!
//! let dispatcher = Dispatcher::new(LogLevel::Info);
//!
//! // Basic logging
//! info!(dispatcher, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(dispatcher, "Server listening on port {}", port);
//!
//! // Structured attributes
//! dispatcher.info_with("request done", attrs! { "status" => 200, "path" => "/api" });
//! ```

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use fanlog::prelude::*;
/// # let dispatcher = Dispatcher::new(LogLevel::Info);
/// use fanlog::log;
/// log!(dispatcher, LogLevel::Info, "Simple message");
/// log!(dispatcher, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($dispatcher:expr, $level:expr, $($arg:tt)+) => {
        $dispatcher.emit($level, format!($($arg)+), $crate::AttrMap::new())
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use fanlog::prelude::*;
/// # let dispatcher = Dispatcher::new(LogLevel::Debug);
/// use fanlog::debug;
/// debug!(dispatcher, "Debug information");
/// debug!(dispatcher, "Counter value: {}", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use fanlog::prelude::*;
/// # let dispatcher = Dispatcher::new(LogLevel::Info);
/// use fanlog::info;
/// info!(dispatcher, "Application started");
/// info!(dispatcher, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
///
/// # Examples
///
/// ```
/// # use fanlog::prelude::*;
/// # let dispatcher = Dispatcher::new(LogLevel::Info);
/// use fanlog::warn;
/// warn!(dispatcher, "Low disk space");
/// warn!(dispatcher, "Retry attempt {} of {}", 3, 5);
/// ```
#[macro_export]
macro_rules! warn {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use fanlog::prelude::*;
/// # let dispatcher = Dispatcher::new(LogLevel::Info);
/// use fanlog::error;
/// error!(dispatcher, "Failed to connect to database");
/// error!(dispatcher, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($dispatcher:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Build an ordered attribute map.
///
/// Values must convert into [`AttrValue`](crate::AttrValue); use
/// [`AttrValue::stringify`](crate::AttrValue::stringify) for anything else
/// that implements `Display`.
///
/// # Examples
///
/// ```
/// # use fanlog::attrs;
/// let attrs = attrs! { "user" => "alice", "attempt" => 3 };
/// assert_eq!(attrs.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::AttrMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::AttrMap::new();
        $( map.insert($key, $value); )+
        map
    }};
}
