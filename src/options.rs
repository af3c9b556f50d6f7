/// Syslog-style diagnostic threshold carried by [`Options::log_level`].
///
/// Higher values are more verbose; a diagnostic is emitted when the
/// configured level is at least the diagnostic's own level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogLevel(pub u8);

impl LogLevel {
    pub const EMERGENCY: LogLevel = LogLevel(0);
    pub const ALERT: LogLevel = LogLevel(1);
    pub const CRITICAL: LogLevel = LogLevel(2);
    pub const ERROR: LogLevel = LogLevel(3);
    pub const WARNING: LogLevel = LogLevel(4);
    pub const NOTICE: LogLevel = LogLevel(5);
    pub const INFO: LogLevel = LogLevel(6);
    pub const DEBUG: LogLevel = LogLevel(7);
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::NOTICE
    }
}

/// Configuration for a lowering run. All switches default to off.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// (Breaks execution!) Lower memory accesses as integer-to-pointer
    /// casts instead of element-pointer arithmetic into the memory global.
    /// Preserves original pointer values for address-only analysis.
    pub gen_int_to_ptr: bool,
    /// Apply entry-point name transformations, e.g. rename
    /// `__original_main`/`__main_argc_argv` to `main`.
    pub fix_names: bool,
    /// Preserve the leading `$` in symbol names.
    pub no_remove_dollar: bool,
    /// Rename an exported entity to its export name even if it already has
    /// a name. By default the export name is adopted only when the entity
    /// is unnamed.
    pub force_export_name: bool,
    /// (Breaks execution!) Emit one global per data segment instead of a
    /// flat memory initializer, placed in `.addr_0x<offset>` sections.
    pub split_mem: bool,
    /// (Breaks execution!) Omit memory initializers entirely.
    pub no_mem_initializer: bool,
    /// Diagnostic threshold, default notice.
    pub log_level: LogLevel,
}

impl Options {
    pub(crate) fn warnings_enabled(&self) -> bool {
        self.log_level >= LogLevel::WARNING
    }

    pub(crate) fn notice_enabled(&self) -> bool {
        self.log_level >= LogLevel::NOTICE
    }

    pub(crate) fn debug_enabled(&self) -> bool {
        self.log_level >= LogLevel::DEBUG
    }
}
