use colored::Colorize;

/// Human-facing status lines. Structured events go through `tracing`; this is
/// the colored summary a person watching the terminal reads.
#[derive(Clone, Copy, Debug, Default)]
pub struct Console;

impl Console {
    /// Create a console, turning ANSI colors off globally when requested.
    pub fn new(no_color: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self
    }

    pub fn info(&self, msg: &str) {
        println!("{}", msg.cyan());
    }

    pub fn success(&self, msg: &str) {
        println!("{}", msg.green());
    }

    pub fn warn(&self, msg: &str) {
        println!("{}", msg.yellow());
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    pub fn header(&self, title: &str) {
        self.info(&format!("=== {} ===", title.to_uppercase()));
    }
}
