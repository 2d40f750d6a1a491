//! Terminal formatting for human readable output

use std::fmt;

use colored::Colorize;

/// Titled block of aligned `key: value` lines
#[derive(Debug, Default)]
pub struct Section {
    title: String,
    fields: Vec<(&'static str, String)>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title.bold().underline())?;
        let width = self.fields.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in &self.fields {
            write!(f, "\n  {}  {value}", format!("{key:<width$}").bold())?;
        }
        Ok(())
    }
}

/// Outcome line on stderr
pub fn outcome(ok: bool, message: &str) -> String {
    if ok {
        format!("✅ {}", message.green().bold())
    } else {
        format!("❌ {}", message.red().bold())
    }
}
