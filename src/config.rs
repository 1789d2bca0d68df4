//! Ambient configuration: where to find the debugger and how long to wait
//! on it. Loading config files or CLI flags is the surrounding
//! application's job; this crate only reads the environment, the way the
//! rest of its ambient stack does.

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the `gdb` (or `lldb-mi`-compatible) executable.
    pub debugger_path: String,
    /// How long a façade call waits for its result before giving up.
    pub command_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debugger_path: std::env::var("GDBMI_DEBUGGER_PATH")
                .unwrap_or_else(|_| "gdb".to_string()),
            command_timeout_secs: std::env::var("GDBMI_COMMAND_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}
