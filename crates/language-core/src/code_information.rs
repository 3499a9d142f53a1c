use std::fmt;
use std::sync::Arc;

/// Refinement callback deciding whether a policy applies for this call.
pub type Predicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Refinement callback rewriting a piece of text (e.g. a rename's new name)
/// before it is used on the other side of a mapping.
pub type TextResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Whether diagnostics may cross a mapping, optionally gated per report.
#[derive(Clone, Default)]
pub enum Verification {
    #[default]
    No,
    Yes,
    Filtered {
        should_report: Predicate,
    },
}

impl Verification {
    pub fn enabled(&self) -> bool {
        !matches!(self, Verification::No)
    }

    pub fn should_report(&self) -> bool {
        match self {
            Verification::No => false,
            Verification::Yes => true,
            Verification::Filtered { should_report } => should_report(),
        }
    }
}

/// Whether completion may cross a mapping.
#[derive(Clone, Default)]
pub enum Completion {
    #[default]
    No,
    Yes,
    Refined {
        /// Items from this mapping supplement another mapping's primary
        /// results rather than standing on their own.
        is_additional: bool,
        /// Only import-style completions are meaningful here.
        only_import: bool,
    },
}

impl Completion {
    pub fn enabled(&self) -> bool {
        !matches!(self, Completion::No)
    }

    pub fn is_additional(&self) -> bool {
        matches!(self, Completion::Refined { is_additional: true, .. })
    }
}

/// Whether the mapping faithfully reflects source semantics (hover, semantic
/// highlighting), optionally gated per highlight.
#[derive(Clone, Default)]
pub enum Semantic {
    #[default]
    No,
    Yes,
    Filtered {
        should_highlight: Predicate,
    },
}

impl Semantic {
    pub fn enabled(&self) -> bool {
        !matches!(self, Semantic::No)
    }

    pub fn should_highlight(&self) -> bool {
        match self {
            Semantic::No => false,
            Semantic::Yes => true,
            Semantic::Filtered { should_highlight } => should_highlight(),
        }
    }
}

/// Whether reference relationships may cross a mapping, with optional rename
/// refinements (gate, new-name normalization, edit-text rewriting).
#[derive(Clone, Default)]
pub enum Navigation {
    #[default]
    No,
    Yes,
    Refined {
        should_rename: Option<Predicate>,
        resolve_rename_new_name: Option<TextResolver>,
        resolve_rename_edit_text: Option<TextResolver>,
    },
}

impl Navigation {
    pub fn enabled(&self) -> bool {
        !matches!(self, Navigation::No)
    }

    pub fn should_rename(&self) -> bool {
        match self {
            Navigation::No => false,
            Navigation::Yes => true,
            Navigation::Refined { should_rename, .. } => {
                should_rename.as_ref().map(|gate| gate()).unwrap_or(true)
            }
        }
    }

    pub fn resolve_new_name(&self, new_name: &str) -> String {
        match self {
            Navigation::Refined {
                resolve_rename_new_name: Some(resolve),
                ..
            } => resolve(new_name),
            _ => new_name.to_string(),
        }
    }

    pub fn resolve_edit_text(&self, new_text: &str) -> String {
        match self {
            Navigation::Refined {
                resolve_rename_edit_text: Some(resolve),
                ..
            } => resolve(new_text),
            _ => new_text.to_string(),
        }
    }
}

/// The capability record attached to every mapping.
///
/// Each translation call is parameterized by a predicate over this record, so
/// a feature only crosses mappings whose corresponding capability is enabled.
#[derive(Clone, Default)]
pub struct CodeInformation {
    pub verification: Verification,
    pub completion: Completion,
    pub semantic: Semantic,
    pub navigation: Navigation,
    /// Mapping reflects structural information (symbols, folding).
    pub structure: bool,
    /// Mapping reflects formatting-relevant layout.
    pub format: bool,
}

impl CodeInformation {
    /// Every capability enabled, without refinements.
    pub fn everything() -> Self {
        Self {
            verification: Verification::Yes,
            completion: Completion::Yes,
            semantic: Semantic::Yes,
            navigation: Navigation::Yes,
            structure: true,
            format: true,
        }
    }
}

impl fmt::Debug for CodeInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn flag(enabled: bool) -> &'static str {
            if enabled { "yes" } else { "no" }
        }
        f.debug_struct("CodeInformation")
            .field("verification", &flag(self.verification.enabled()))
            .field("completion", &flag(self.completion.enabled()))
            .field("semantic", &flag(self.semantic.enabled()))
            .field("navigation", &flag(self.navigation.enabled()))
            .field("structure", &flag(self.structure))
            .field("format", &flag(self.format))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_all_disabled() {
        let info = CodeInformation::default();
        assert!(!info.verification.enabled());
        assert!(!info.completion.enabled());
        assert!(!info.semantic.enabled());
        assert!(!info.navigation.enabled());
        assert!(!info.structure);
        assert!(!info.format);
    }

    #[test]
    fn refined_navigation_gates_and_rewrites() {
        let navigation = Navigation::Refined {
            should_rename: Some(Arc::new(|| false)),
            resolve_rename_new_name: Some(Arc::new(|name: &str| format!("on{name}"))),
            resolve_rename_edit_text: None,
        };
        assert!(navigation.enabled());
        assert!(!navigation.should_rename());
        assert_eq!(navigation.resolve_new_name("click"), "onclick");
        assert_eq!(navigation.resolve_edit_text("click"), "click");
    }

    #[test]
    fn filtered_verification_consults_the_gate() {
        let off = Verification::Filtered {
            should_report: Arc::new(|| false),
        };
        assert!(off.enabled());
        assert!(!off.should_report());
    }
}
