use std::fmt::Display;

use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

// Defines a new type that wraps a String for use as an ID.
macro_rules! idtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            #[allow(dead_code)]
            pub fn from(s: String) -> Self {
                Self(s)
            }

            #[allow(dead_code)]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

idtype!(OptionLabel);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}

impl Size<u32> {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Where the sheet was found, in working-resolution pixel coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoundaryBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundaryBox {
    pub fn whole(size: Size<u32>) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn to_rect(self) -> Rect {
        Rect::at(self.x as i32, self.y as i32).of_size(self.width.max(1), self.height.max(1))
    }
}

/// One question's decided answer: a single option, or blank when the
/// question had no mark or more than one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConsolidatedAnswer {
    Option(OptionLabel),
    Blank,
}

impl ConsolidatedAnswer {
    pub fn is_blank(&self) -> bool {
        matches!(self, ConsolidatedAnswer::Blank)
    }
}

impl Display for ConsolidatedAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsolidatedAnswer::Option(label) => write!(f, "{}", label),
            ConsolidatedAnswer::Blank => write!(f, "-"),
        }
    }
}

impl Serialize for ConsolidatedAnswer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ConsolidatedAnswer::Option(label) => serializer.serialize_str(label.as_str()),
            ConsolidatedAnswer::Blank => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ConsolidatedAnswer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(match s {
            Some(s) => ConsolidatedAnswer::Option(OptionLabel::from(s)),
            None => ConsolidatedAnswer::Blank,
        })
    }
}
