use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::core::panel::Panel;
use crate::core::types::PanelId;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Duplicate panel id '{0}'")]
    DuplicatePanel(PanelId),
}

/// Catalog version for compatibility checking
pub const CATALOG_VERSION: &str = "1.0.0";

/// Serializable catalog format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogData {
    pub version: String,
    pub created_at: String,
    pub panels: Vec<Panel>,
}

/// The set of reagent panels in use, with lookup indexes
#[derive(Debug)]
pub struct PanelCatalog {
    /// All panels, in load order
    pub panels: Vec<Panel>,

    /// Index: panel ID -> index in panels vec
    id_to_index: HashMap<PanelId, usize>,

    /// Index: marker -> indices of panels listing it
    pub marker_to_panels: HashMap<String, Vec<usize>>,
}

impl PanelCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            panels: Vec::new(),
            id_to_index: HashMap::new(),
            marker_to_panels: HashMap::new(),
        }
    }

    /// Load catalog from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read, is not a valid
    /// catalog, or repeats a panel id.
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse catalog from JSON string
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on malformed JSON or duplicate panel ids.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data: CatalogData = serde_json::from_str(json)?;

        // Version check (warn but don't fail)
        if data.version != CATALOG_VERSION {
            tracing::warn!(
                "Catalog version mismatch (expected {}, found {})",
                CATALOG_VERSION,
                data.version
            );
        }

        let mut catalog = Self::new();
        for mut panel in data.panels {
            panel.rebuild_indexes();
            catalog.add_panel(panel)?;
        }

        tracing::info!("Loaded {} panels", catalog.len());
        Ok(catalog)
    }

    /// Add a panel to the catalog
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicatePanel` if a panel with the same id exists.
    pub fn add_panel(&mut self, panel: Panel) -> Result<(), CatalogError> {
        if self.id_to_index.contains_key(&panel.id) {
            return Err(CatalogError::DuplicatePanel(panel.id));
        }
        let index = self.panels.len();

        self.id_to_index.insert(panel.id.clone(), index);
        for marker in &panel.markers {
            self.marker_to_panels
                .entry(marker.clone())
                .or_default()
                .push(index);
        }

        self.panels.push(panel);
        Ok(())
    }

    /// Get a panel by ID
    pub fn get(&self, id: &PanelId) -> Option<&Panel> {
        self.id_to_index.get(id).map(|&idx| &self.panels[idx])
    }

    /// Panels that list `marker`
    pub fn panels_with_marker(&self, marker: &str) -> Vec<&Panel> {
        self.marker_to_panels
            .get(marker)
            .map(|indices| indices.iter().map(|&i| &self.panels[i]).collect())
            .unwrap_or_default()
    }

    /// Union of all panel markers, sorted
    pub fn markers(&self) -> BTreeSet<String> {
        self.marker_to_panels.keys().cloned().collect()
    }

    /// Export catalog to JSON
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ParseError` if serialization fails.
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let data = CatalogData {
            version: CATALOG_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            panels: self.panels.clone(),
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Number of panels in catalog
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    /// Check if catalog is empty
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}

impl Default for PanelCatalog {
    fn default() -> Self {
        Self::new()
    }
}
