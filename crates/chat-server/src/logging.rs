use std::io::Write;
use std::time::Instant;

/// Initialises `env_logger`. `RUST_LOG` still overrides the default filter.
pub fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        })
        .init();
}

/// Measures an operation and warns on drop when it ran longer than
/// `slow_after_ms`.
pub struct Timer {
    name: String,
    start: Instant,
    slow_after_ms: u128,
}

impl Timer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            slow_after_ms: 1000,
        }
    }

    pub fn slow_after_ms(mut self, threshold: u128) -> Self {
        self.slow_after_ms = threshold;
        self
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    pub fn is_slow(&self) -> bool {
        self.elapsed_ms() > self.slow_after_ms
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.is_slow() {
            log::warn!("{} took {}ms (slow)", self.name, self.elapsed_ms());
        }
    }
}
