//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the delve CLI. Status
//! lines go to stderr so a report or JSON result on stdout stays pipeable.

use crate::research::RunResult;
use crate::utils::toml_config::DelveConfig;
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the delve banner
    pub fn banner(&self) {
        if self.colored {
            eprintln!(
                "\n   {} {}\n",
                "delve".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            eprintln!("\n   delve v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✓".green().bold(), message.green());
        } else {
            eprintln!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "•".blue(), message);
        } else {
            eprintln!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            eprintln!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            eprintln!("\n  {}", title.bright_white().bold().underline());
        } else {
            eprintln!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            eprintln!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            eprintln!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            eprintln!("    {} {}", "•".blue(), item);
        } else {
            eprintln!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            eprintln!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            eprintln!("\n  [TIP] {}", message);
        }
    }

    /// Summarize the effective configuration.
    pub fn config_summary(&self, config: &DelveConfig) {
        let research = &config.research;
        self.header("Research");
        self.kv(
            "mode",
            research.mode.map(|m| m.as_str()).unwrap_or("custom"),
        );
        self.kv("allow_clarification", &research.allow_clarification.to_string());
        self.kv("max_researcher_iterations", &research.max_researcher_iterations.to_string());
        self.kv(
            "max_concurrent_research_units",
            &research.max_concurrent_research_units.to_string(),
        );
        self.kv("max_react_tool_calls", &research.max_react_tool_calls.to_string());

        self.header("Models");
        for (stage, model) in config.models.iter() {
            let limit = model
                .token_limit
                .map(|l| format!(", token_limit {}", l))
                .unwrap_or_default();
            self.kv(stage, &format!("{} via {}{}", model.model, model.provider, limit));
        }

        self.header("Tools");
        for tool in crate::tools::list_tools(&config.tools) {
            self.list_item(&tool.name);
        }
    }

    /// Print the report of a finished run to stdout.
    pub fn report(&self, result: &RunResult) {
        println!("{}", result.final_report);
    }

    /// Short run statistics on stderr.
    pub fn run_summary(&self, result: &RunResult) {
        self.header("Run");
        if let Some(brief) = &result.research_brief {
            self.kv("brief", brief);
        }
        self.kv("notes", &result.notes.len().to_string());
        self.kv("conversation records", &result.conversation.len().to_string());
    }
}
