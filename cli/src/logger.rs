/// Set up log levels and formatting
///
/// No logs shown by default, only human-friendly messages. Enable logs
/// output with "export RUST_LOG=info" in the terminal.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
}
