use serde::{Deserialize, Serialize};

/// Tech-debt priority band, `P0` (security/correctness) through `P3` (style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::P0, Self::P1, Self::P2, Self::P3];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtCategory {
    Security,
    Correctness,
    Design,
    Maintenance,
    Testing,
    Style,
}

impl DebtCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Correctness => "correctness",
            Self::Design => "design",
            Self::Maintenance => "maintenance",
            Self::Testing => "testing",
            Self::Style => "style",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechDebtItem {
    pub id: String,
    pub file: String,
    /// 1-indexed; 0 for directory-level signals such as missing tests.
    pub line: usize,
    pub priority: Priority,
    pub category: DebtCategory,
    pub rule: String,
    pub evidence_text: String,
}
