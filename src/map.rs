//! Quadrant map state: axes, positioned items, and the two active axes.
//!
//! The store is an explicit value owned by the caller. Pipeline operations
//! never touch it; they return a [`StructuredResult`] that the caller folds
//! in with [`QuadrantMap::apply_result`] or [`QuadrantMap::insert_suggestion`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::coords::{clamp, AXIS_CENTER};
use crate::prompts::Peer;
use crate::sanitize::{StructuredResult, MAX_HIGHLIGHTS};

// =============================================================================
// Types
// =============================================================================

/// One normalized dimension, 0 at `left_label` and 100 at `right_label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    pub id: String,
    pub label: String,
    pub left_label: String,
    pub right_label: String,
}

impl Axis {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        left_label: impl Into<String>,
        right_label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            left_label: left_label.into(),
            right_label: right_label.into(),
        }
    }
}

/// A positioned product or brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub axis_values: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, alias = "logoUrl", skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, alias = "usps")]
    pub highlights: Vec<String>,
    #[serde(default, alias = "specifications")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            axis_values: BTreeMap::new(),
            domain: None,
            icon_url: None,
            reasoning: None,
            highlights: Vec::new(),
            attributes: BTreeMap::new(),
            sources: Vec::new(),
        }
    }

    /// Builder-style position setter, clamped.
    pub fn at(mut self, axis_id: &str, value: f64) -> Self {
        self.set_value(axis_id, value);
        self
    }

    /// Stored value on an axis, or the center when absent.
    pub fn value_on(&self, axis_id: &str) -> f64 {
        self.axis_values
            .get(axis_id)
            .copied()
            .unwrap_or(AXIS_CENTER)
    }

    /// Store a value on an axis, clamped into [0, 100].
    pub fn set_value(&mut self, axis_id: &str, value: f64) {
        self.axis_values.insert(axis_id.to_string(), clamp(value));
    }

    /// `(x, y)` on the given pair of axes.
    pub fn position(&self, x_axis_id: &str, y_axis_id: &str) -> (f64, f64) {
        (self.value_on(x_axis_id), self.value_on(y_axis_id))
    }

    /// Peer view of this item for prompt context.
    pub fn as_peer(&self, x_axis_id: &str, y_axis_id: &str) -> Peer {
        let (x, y) = self.position(x_axis_id, y_axis_id);
        Peer::new(self.name.clone(), x, y)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("unknown axis: {0}")]
    UnknownAxis(String),
    #[error("axis already exists: {0}")]
    DuplicateAxis(String),
    #[error("unknown item: {0}")]
    UnknownItem(String),
    #[error("no active {0} axis selected")]
    NoActiveAxis(&'static str),
    #[error("suggested item has no name")]
    Unnamed,
    #[error("invalid map JSON: {0}")]
    Json(String),
}

/// The whole map: axes, items, and the axis pair currently displayed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrantMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub axes: Vec<Axis>,
    #[serde(default, alias = "products")]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_x_axis_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_y_axis_id: Option<String>,
}

// =============================================================================
// Store operations
// =============================================================================

impl QuadrantMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a map file, clamping every stored value into range.
    pub fn from_json(raw: &str) -> Result<Self, MapError> {
        let mut map: QuadrantMap =
            serde_json::from_str(raw).map_err(|e| MapError::Json(e.to_string()))?;
        for item in &mut map.items {
            for value in item.axis_values.values_mut() {
                *value = clamp(*value);
            }
            item.highlights.truncate(MAX_HIGHLIGHTS);
        }
        Ok(map)
    }

    pub fn to_json_pretty(&self) -> Result<String, MapError> {
        serde_json::to_string_pretty(self).map_err(|e| MapError::Json(e.to_string()))
    }

    pub fn axis(&self, id: &str) -> Option<&Axis> {
        self.axes.iter().find(|a| a.id == id)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn item_by_name(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name == name)
    }

    fn item_mut(&mut self, id: &str) -> Result<&mut Item, MapError> {
        self.items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| MapError::UnknownItem(id.to_string()))
    }

    /// Add an axis, assigning a fresh id when empty. Every existing item
    /// starts at the center of the new axis. The first two axes become
    /// active automatically.
    ///
    /// Axis ids are unique; re-using one is rejected and leaves the map as is.
    pub fn add_axis(&mut self, mut axis: Axis) -> Result<String, MapError> {
        if axis.id.is_empty() {
            axis.id = Uuid::new_v4().to_string();
        }
        if self.axis(&axis.id).is_some() {
            return Err(MapError::DuplicateAxis(axis.id));
        }
        let id = axis.id.clone();
        for item in &mut self.items {
            item.axis_values.entry(id.clone()).or_insert(AXIS_CENTER);
        }
        self.axes.push(axis);

        if self.active_x_axis_id.is_none() {
            self.active_x_axis_id = Some(id.clone());
        } else if self.active_y_axis_id.is_none() {
            self.active_y_axis_id = Some(id.clone());
        }
        Ok(id)
    }

    /// Remove an axis and every reference to it.
    ///
    /// Item values on the axis are dropped. An active selection pointing at
    /// the axis moves to the first remaining axis, or clears when none remain.
    pub fn remove_axis(&mut self, id: &str) -> Result<Axis, MapError> {
        let idx = self
            .axes
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| MapError::UnknownAxis(id.to_string()))?;
        let removed = self.axes.remove(idx);

        for item in &mut self.items {
            item.axis_values.remove(id);
        }

        let fallback = self.axes.first().map(|a| a.id.clone());
        if self.active_x_axis_id.as_deref() == Some(id) {
            self.active_x_axis_id = fallback.clone();
        }
        if self.active_y_axis_id.as_deref() == Some(id) {
            self.active_y_axis_id = fallback;
        }
        Ok(removed)
    }

    pub fn set_active_axes(&mut self, x_axis_id: &str, y_axis_id: &str) -> Result<(), MapError> {
        for id in [x_axis_id, y_axis_id] {
            if self.axis(id).is_none() {
                return Err(MapError::UnknownAxis(id.to_string()));
            }
        }
        self.active_x_axis_id = Some(x_axis_id.to_string());
        self.active_y_axis_id = Some(y_axis_id.to_string());
        Ok(())
    }

    /// The two displayed axes.
    pub fn active_axes(&self) -> Result<(&Axis, &Axis), MapError> {
        let x_id = self
            .active_x_axis_id
            .as_deref()
            .ok_or(MapError::NoActiveAxis("x"))?;
        let y_id = self
            .active_y_axis_id
            .as_deref()
            .ok_or(MapError::NoActiveAxis("y"))?;
        let x = self
            .axis(x_id)
            .ok_or_else(|| MapError::UnknownAxis(x_id.to_string()))?;
        let y = self
            .axis(y_id)
            .ok_or_else(|| MapError::UnknownAxis(y_id.to_string()))?;
        Ok((x, y))
    }

    /// Add an item centered on every axis. Returns its id.
    pub fn add_item(&mut self, name: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        let mut item = Item::new(id.clone(), name);
        for axis in &self.axes {
            item.axis_values.insert(axis.id.clone(), AXIS_CENTER);
        }
        self.items.push(item);
        id
    }

    pub fn remove_item(&mut self, id: &str) -> Result<Item, MapError> {
        let idx = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| MapError::UnknownItem(id.to_string()))?;
        Ok(self.items.remove(idx))
    }

    /// Move an item on the active axes (drag-and-drop path). Clamped.
    pub fn set_position(&mut self, item_id: &str, x: f64, y: f64) -> Result<(), MapError> {
        let (x_id, y_id) = self.active_axis_ids()?;
        let item = self.item_mut(item_id)?;
        item.set_value(&x_id, x);
        item.set_value(&y_id, y);
        Ok(())
    }

    /// Overwrite an existing item with an oracle result on the active axes.
    ///
    /// Descriptive fields present in the result replace the item's; the
    /// item's name and id are kept.
    pub fn apply_result(&mut self, item_id: &str, result: &StructuredResult) -> Result<(), MapError> {
        let (x_id, y_id) = self.active_axis_ids()?;
        let item = self.item_mut(item_id)?;
        fold_result(item, &x_id, &y_id, result);
        Ok(())
    }

    /// Create a new item from a named suggestion. Returns its id.
    pub fn insert_suggestion(&mut self, result: &StructuredResult) -> Result<String, MapError> {
        let name = result
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(MapError::Unnamed)?
            .to_string();
        let (x_id, y_id) = self.active_axis_ids()?;

        let id = self.add_item(name);
        let item = self.item_mut(&id)?;
        fold_result(item, &x_id, &y_id, result);
        Ok(id)
    }

    /// Peers on the active axes, in map order.
    pub fn peers(&self) -> Result<Vec<Peer>, MapError> {
        let (x_id, y_id) = self.active_axis_ids()?;
        Ok(self.items.iter().map(|i| i.as_peer(&x_id, &y_id)).collect())
    }

    fn active_axis_ids(&self) -> Result<(String, String), MapError> {
        let (x, y) = self.active_axes()?;
        Ok((x.id.clone(), y.id.clone()))
    }
}

fn fold_result(item: &mut Item, x_id: &str, y_id: &str, result: &StructuredResult) {
    item.set_value(x_id, result.x);
    item.set_value(y_id, result.y);
    if let Some(domain) = &result.domain {
        item.domain = Some(domain.clone());
    }
    if let Some(icon) = &result.icon_url {
        item.icon_url = Some(icon.clone());
    }
    if let Some(reasoning) = &result.reasoning {
        item.reasoning = Some(reasoning.clone());
    }
    item.highlights = result
        .highlights
        .iter()
        .take(MAX_HIGHLIGHTS)
        .cloned()
        .collect();
    item.attributes = result.attributes.clone();
    item.sources = result.sources.clone();
}

// =============================================================================
// TESTS
// =============================================================================
