//! Terminal stylesheet.
//!
//! `Styles::default()` is the plain stylesheet used for pipes, `--no-color`
//! and `NO_COLOR`; every field is a no-op style there.

use owo_colors::Style;

#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// Labels, hints and other secondary text.
    pub muted: Style,
    /// Provider ids, addresses and workload labels.
    pub resource: Style,
    /// stdout/stderr captured from remote commands.
    pub captured: Style,
    pub header: Style,
}

impl Styles {
    /// The stylesheet for a colour terminal.
    #[must_use]
    pub fn colored() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().yellow(),
            error: Style::new().red().bold(),
            info: Style::new().blue(),
            muted: Style::new().dimmed(),
            resource: Style::new().bold().magenta(),
            captured: Style::new().dimmed().italic(),
            header: Style::new().bold().cyan(),
        }
    }
}
