use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(JobStatus {
    Pending => "pending",
    Extracting => "extracting",
    Analyzing => "analyzing",
    Validating => "validating",
    Fixing => "fixing",
    AnalyzingConfidence => "analyzing_confidence",
    Importing => "importing",
    Completed => "completed",
    Failed => "failed",
});

str_enum!(FlowType {
    Income => "income",
    Expense => "expense",
});

str_enum!(ExtractionMethod {
    AiVision => "ai_vision",
    PdfParser => "pdf_parser",
    Ocr => "ocr",
});

impl ExtractionMethod {
    /// Priority order in which extraction methods are attempted.
    pub const PRIORITY: [ExtractionMethod; 3] = [Self::AiVision, Self::PdfParser, Self::Ocr];
}
