//! Product catalog: which placement variant and index table an id uses.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::FaceIndices;

/// Product families with a placement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductFamily {
    Glasses,
    Hat,
}

impl ProductFamily {
    pub const ALL: [ProductFamily; 2] = [ProductFamily::Glasses, ProductFamily::Hat];

    pub fn indices(&self) -> &'static FaceIndices {
        match self {
            ProductFamily::Glasses => &FaceIndices::GLASSES,
            ProductFamily::Hat => &FaceIndices::HAT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductFamily::Glasses => "GLASSES",
            ProductFamily::Hat => "HAT",
        }
    }
}

impl FromStr for ProductFamily {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("glasses") {
            Ok(ProductFamily::Glasses)
        } else if s.eq_ignore_ascii_case("hat") {
            Ok(ProductFamily::Hat)
        } else {
            Err(Error::UnknownProductFamily(s.to_string()))
        }
    }
}

impl std::fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog row. `family` stays a string so a misconfigured entry is
/// reported when it is used rather than rejecting the whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub family: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family: family.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductCatalog {
    pub entries: Vec<CatalogEntry>,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self {
            entries: vec![
                CatalogEntry::new("glasses1", "GLASSES"),
                CatalogEntry::new("glasses2", "GLASSES"),
                CatalogEntry::new("glasses3", "GLASSES"),
                CatalogEntry::new("hat1", "HAT"),
                CatalogEntry::new("hat2", "HAT"),
            ],
        }
    }
}

impl ProductCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entry(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    /// Family name for `id`.
    ///
    /// Ids missing from the catalog fall back to the naming convention:
    /// anything starting with `hat` is a hat, everything else glasses.
    pub fn family_name<'a>(&'a self, id: &str) -> &'a str {
        match self.entry(id) {
            Some(entry) => entry.family.as_str(),
            None if id.starts_with("hat") => ProductFamily::Hat.as_str(),
            None => ProductFamily::Glasses.as_str(),
        }
    }

    pub fn family_of(&self, id: &str) -> Result<ProductFamily> {
        self.family_name(id).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_parsing_is_case_insensitive() {
        assert_eq!("glasses".parse::<ProductFamily>().unwrap(), ProductFamily::Glasses);
        assert_eq!("HAT".parse::<ProductFamily>().unwrap(), ProductFamily::Hat);
        match "SHOES".parse::<ProductFamily>() {
            Err(Error::UnknownProductFamily(name)) => assert_eq!(name, "SHOES"),
            other => panic!("expected UnknownProductFamily, got {:?}", other),
        }
    }

    #[test]
    fn catalog_lookup_and_prefix_fallback() {
        let mut catalog = ProductCatalog::default();
        catalog.entries.push(CatalogEntry::new("boots1", "SHOES"));

        assert_eq!(catalog.family_of("hat2").unwrap(), ProductFamily::Hat);
        assert_eq!(catalog.family_of("glasses1").unwrap(), ProductFamily::Glasses);
        assert_eq!(catalog.family_of("hat-new").unwrap(), ProductFamily::Hat);
        assert_eq!(catalog.family_of("aviator").unwrap(), ProductFamily::Glasses);
        assert!(catalog.family_of("boots1").is_err());
    }

    #[test]
    fn catalog_serializes_as_list() {
        let catalog = ProductCatalog::new(vec![CatalogEntry::new("hat1", "HAT")]);
        let json = serde_json::to_string(&catalog).unwrap();
        assert_eq!(json, r#"[{"id":"hat1","family":"HAT"}]"#);
    }
}
