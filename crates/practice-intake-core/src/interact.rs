//! Interactive collaborators supplied by the UI shell.

/// Asks the user to confirm a destructive action.
pub trait Confirmer {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> Confirmer for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

/// System clipboard.
pub trait Clipboard {
    /// Write text; `Err` when clipboard access is unavailable.
    fn write_text(&self, text: &str) -> Result<(), String>;
}

/// Outcome of copying a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied(String),
    /// The clipboard was unavailable; the shell shows the link for manual copy.
    ManualCopy(String),
}

impl CopyOutcome {
    pub fn link(&self) -> &str {
        match self {
            CopyOutcome::Copied(link) | CopyOutcome::ManualCopy(link) => link,
        }
    }
}

/// Copy `text`, falling back to manual copy when the clipboard refuses.
pub fn copy_or_fallback(clipboard: &dyn Clipboard, text: String) -> CopyOutcome {
    match clipboard.write_text(&text) {
        Ok(()) => CopyOutcome::Copied(text),
        Err(reason) => {
            tracing::warn!(%reason, "Clipboard unavailable, falling back to manual copy");
            CopyOutcome::ManualCopy(text)
        }
    }
}
