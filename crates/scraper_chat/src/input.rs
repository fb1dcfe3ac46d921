//! User input contract.

/// Key events the input box cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Other,
}

/// What a key press does to the draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Submit,
    InsertNewline,
    /// Regular editing, nothing special
    Edit,
}

/// Enter submits, unless Shift is held or an IME composition is active,
/// in which case it inserts a literal newline.
pub fn key_action(key: Key, shift: bool, composing: bool) -> InputAction {
    match key {
        Key::Enter if shift || composing => InputAction::InsertNewline,
        Key::Enter => InputAction::Submit,
        Key::Other => InputAction::Edit,
    }
}

/// Trim a draft; empty or whitespace-only drafts are rejected
pub fn normalize_input(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_submits() {
        assert_eq!(key_action(Key::Enter, false, false), InputAction::Submit);
    }

    #[test]
    fn test_modifiers_insert_newline() {
        assert_eq!(key_action(Key::Enter, true, false), InputAction::InsertNewline);
        assert_eq!(key_action(Key::Enter, false, true), InputAction::InsertNewline);
        assert_eq!(key_action(Key::Other, false, false), InputAction::Edit);
    }

    #[test]
    fn test_normalize_input() {
        assert_eq!(normalize_input("  hello \n"), Some("hello".to_string()));
        assert_eq!(normalize_input("line one\nline two"), Some("line one\nline two".to_string()));
        assert_eq!(normalize_input(""), None);
        assert_eq!(normalize_input(" \t\n "), None);
    }
}
