use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aspect-ratio preset a generation is requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SizeCategory {
    #[default]
    Square,
    Landscape,
    Portrait,
}

impl SizeCategory {
    pub const ALL: [SizeCategory; 3] = [
        SizeCategory::Square,
        SizeCategory::Landscape,
        SizeCategory::Portrait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeCategory::Square => "square",
            SizeCategory::Landscape => "landscape",
            SizeCategory::Portrait => "portrait",
        }
    }
}

impl fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeCategory {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "square" => Ok(SizeCategory::Square),
            "landscape" => Ok(SizeCategory::Landscape),
            "portrait" => Ok(SizeCategory::Portrait),
            other => Err(format!(
                "Unknown size '{other}'; expected square, landscape or portrait."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Named, overridable mapping from size category to pixel dimensions.
///
/// Revisions of the app disagreed on landscape/portrait pixels, so the table
/// is data: the built-in defaults can be replaced per category by a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionTable {
    entries: IndexMap<SizeCategory, Dimensions>,
}

impl Default for DimensionTable {
    fn default() -> Self {
        let mut entries = IndexMap::new();
        entries.insert(SizeCategory::Square, Dimensions::new(1024, 1024));
        entries.insert(SizeCategory::Landscape, Dimensions::new(1280, 720));
        entries.insert(SizeCategory::Portrait, Dimensions::new(720, 1280));
        Self { entries }
    }
}

impl DimensionTable {
    pub fn get(&self, size: SizeCategory) -> Dimensions {
        self.entries
            .get(&size)
            .copied()
            .unwrap_or(Dimensions::new(1024, 1024))
    }

    pub fn set(&mut self, size: SizeCategory, dims: Dimensions) {
        self.entries.insert(size, dims);
    }

    pub fn iter(&self) -> impl Iterator<Item = (SizeCategory, Dimensions)> + '_ {
        self.entries.iter().map(|(size, dims)| (*size, *dims))
    }

    /// Applies `{"landscape": "1792x1024", ...}` on top of the current table.
    /// Entries that don't name a category or don't parse are skipped.
    pub fn merge_overrides(&mut self, overrides: &Value) {
        let Some(table) = overrides.as_object() else {
            return;
        };
        for (key, value) in table {
            let Ok(size) = key.parse::<SizeCategory>() else {
                continue;
            };
            let Some(dims) = value.as_str().and_then(parse_dims) else {
                continue;
            };
            self.set(size, dims);
        }
    }
}

pub fn parse_dims(raw: &str) -> Option<Dimensions> {
    let lowered = raw.trim().to_ascii_lowercase();
    let (w, h) = lowered.split_once('x')?;
    let width = w.trim().parse::<u32>().ok()?;
    let height = h.trim().parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Dimensions::new(width, height))
}
