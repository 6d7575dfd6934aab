use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::InstanceId;

/// Ordered action parameters. Values keep their JSON shape so engines can
/// carry structured payloads without a shared schema.
pub type ActionParams = IndexMap<String, Value>;

/// Action type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    DataZoom,
    Restore,
    Highlight,
    Downplay,
    ShowTip,
    HideTip,
    Custom(String),
}

impl ActionKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::DataZoom => "dataZoom",
            Self::Restore => "restore",
            Self::Highlight => "highlight",
            Self::Downplay => "downplay",
            Self::ShowTip => "showTip",
            Self::HideTip => "hideTip",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "dataZoom" => Self::DataZoom,
            "restore" => Self::Restore,
            "highlight" => Self::Highlight,
            "downplay" => Self::Downplay,
            "showTip" => Self::ShowTip,
            "hideTip" => Self::HideTip,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<ActionKind> for String {
    fn from(value: ActionKind) -> Self {
        match value {
            ActionKind::Custom(name) => name,
            other => other.as_str().to_owned(),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an action reaches an instance first-hand or as a peer replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Propagation {
    /// Applied on the instance the action was raised on.
    Origin,
    /// Replayed from a connected peer; must not be broadcast again.
    Connected,
}

impl Propagation {
    #[must_use]
    pub fn is_internal(self) -> bool {
        self == Self::Connected
    }
}

/// One action dispatch. `origin` and `generation` are stamped by the
/// broadcaster; records built by callers leave them unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub kind: ActionKind,
    #[serde(default)]
    pub params: ActionParams,
    #[serde(default)]
    pub origin: Option<InstanceId>,
    #[serde(default)]
    pub generation: u64,
}

impl ActionRecord {
    #[must_use]
    pub fn new(kind: impl Into<ActionKind>) -> Self {
        Self {
            kind: kind.into(),
            params: ActionParams::new(),
            origin: None,
            generation: 0,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Zoom window in percent of the full data extent.
    #[must_use]
    pub fn data_zoom(start: f64, end: f64) -> Self {
        Self::new(ActionKind::DataZoom)
            .with_param("start", start)
            .with_param("end", end)
    }

    #[must_use]
    pub fn restore() -> Self {
        Self::new(ActionKind::Restore)
    }

    #[must_use]
    pub fn highlight(series_index: u32, data_index: u32) -> Self {
        Self::new(ActionKind::Highlight)
            .with_param("seriesIndex", series_index)
            .with_param("dataIndex", data_index)
    }

    #[must_use]
    pub fn downplay(series_index: u32, data_index: u32) -> Self {
        Self::new(ActionKind::Downplay)
            .with_param("seriesIndex", series_index)
            .with_param("dataIndex", data_index)
    }

    #[must_use]
    pub fn show_tip(x: f64, y: f64) -> Self {
        Self::new(ActionKind::ShowTip)
            .with_param("x", x)
            .with_param("y", y)
    }

    #[must_use]
    pub fn hide_tip() -> Self {
        Self::new(ActionKind::HideTip)
    }

    #[must_use]
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn param_u32(&self, key: &str) -> Option<u32> {
        self.params
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|value| u32::try_from(value).ok())
    }

    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}
