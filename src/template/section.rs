//! Section splitting and the role state machine.

use crate::core::message::MessageRole;

pub const SECTION_DELIMITER: &str = "---";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    pub index: usize,
    pub body: &'a str,
}

/// Splits a template on the literal delimiter, keeping document order.
/// Empty slices are kept so section indexes match what the author sees.
pub fn split_sections(source: &str) -> Vec<Section<'_>> {
    source
        .split(SECTION_DELIMITER)
        .enumerate()
        .map(|(index, body)| Section { index, body })
        .collect()
}

/// A zero-argument role switch callable from a section as `system()`,
/// `user()` or `assistant()`. It takes effect when the renderer evaluates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    System,
    User,
    Assistant,
}

impl Directive {
    pub const ALL: [Directive; 3] = [Directive::System, Directive::User, Directive::Assistant];

    /// Name the directive is bound to in a section.
    pub fn name(self) -> &'static str {
        match self {
            Directive::System => "system",
            Directive::User => "user",
            Directive::Assistant => "assistant",
        }
    }

    pub fn is_directive_name(name: &str) -> bool {
        Self::ALL.iter().any(|directive| directive.name() == name)
    }

    pub fn target_role(self) -> MessageRole {
        match self {
            Directive::System => MessageRole::System,
            Directive::User => MessageRole::User,
            Directive::Assistant => MessageRole::Assistant,
        }
    }

    /// Only `assistant()` reaches out to the completion service.
    pub fn requests_completion(self) -> bool {
        self == Directive::Assistant
    }
}

/// Active role of a template run. Starts at `System` and only changes on a
/// directive; the role carries over from one section to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleState {
    role: MessageRole,
}

impl Default for RoleState {
    fn default() -> Self {
        Self {
            role: MessageRole::System,
        }
    }
}

impl RoleState {
    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn transition(&mut self, directive: Directive) -> MessageRole {
        self.role = directive.target_role();
        self.role
    }
}
