// MITTCFQ LOG MACROS
// LINE-ORIENTED, PREFIXED. INFO TO STDOUT, WARN/ERROR TO STDERR.
// NEVER CALLED FROM THE HISTORY OR ESTIMATOR HOT PATHS.

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        println!("[INFO] {}", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        eprintln!("[WARN] {}", format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        eprintln!("[ERROR] {}", format_args!($($arg)*))
    };
}
