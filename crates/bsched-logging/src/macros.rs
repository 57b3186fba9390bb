//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters for bundle lifecycle operations."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Context-enriched logging macros.

/// Emit an informational log enriched with bundle job context.
#[macro_export]
macro_rules! bsched_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            job = ctx.job.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            user = ctx.user.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::bsched_info!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit a debug log enriched with bundle job context.
#[macro_export]
macro_rules! bsched_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            job = ctx.job.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            user = ctx.user.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::bsched_debug!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit a warning enriched with bundle job context.
#[macro_export]
macro_rules! bsched_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            job = ctx.job.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            user = ctx.user.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::bsched_warn!(context = $crate::LogContext::default(), $($arg)+)
    }};
}

/// Emit an error log enriched with bundle job context.
#[macro_export]
macro_rules! bsched_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            job = ctx.job.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            user = ctx.user.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        $crate::bsched_error!(context = $crate::LogContext::default(), $($arg)+)
    }};
}
