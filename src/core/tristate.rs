//! Three-valued permission result

use serde::{Deserialize, Serialize};

/// Outcome of a permission check
///
/// `Undefined` means no rule applied, which callers usually treat as a deny
/// but which is kept distinct from an explicit `False`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tristate {
    True,
    False,
    Undefined,
}

impl Tristate {
    /// Convert a plain boolean into a defined tristate
    pub fn from_bool(value: bool) -> Self {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }

    /// Collapse to a boolean, treating `Undefined` as false
    pub fn as_bool(self) -> bool {
        matches!(self, Tristate::True)
    }

    /// Whether a rule produced this value
    pub fn is_defined(self) -> bool {
        !matches!(self, Tristate::Undefined)
    }
}

impl Default for Tristate {
    fn default() -> Self {
        Tristate::Undefined
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        Tristate::from_bool(value)
    }
}

impl std::fmt::Display for Tristate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tristate::True => write!(f, "true"),
            Tristate::False => write!(f, "false"),
            Tristate::Undefined => write!(f, "undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tristate_bool_conversion() {
        assert_eq!(Tristate::from_bool(true), Tristate::True);
        assert_eq!(Tristate::from(false), Tristate::False);

        assert!(Tristate::True.as_bool());
        assert!(!Tristate::False.as_bool());
        assert!(!Tristate::Undefined.as_bool());
    }

    #[test]
    fn test_tristate_display() {
        assert_eq!(Tristate::True.to_string(), "true");
        assert_eq!(Tristate::Undefined.to_string(), "undefined");
        assert!(!Tristate::default().is_defined());
    }
}
