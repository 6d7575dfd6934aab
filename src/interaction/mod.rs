use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{ActionKind, ActionRecord};
use crate::error::{ChartError, ChartResult};

/// Visible data window in percent of the full extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomWindow {
    pub start: f64,
    pub end: f64,
}

impl ZoomWindow {
    pub const FULL: Self = Self {
        start: 0.0,
        end: 100.0,
    };

    pub fn new(start: f64, end: f64) -> ChartResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(ChartError::InvalidData(
                "zoom window bounds must be finite".to_owned(),
            ));
        }
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        Ok(Self {
            start: start.clamp(0.0, 100.0),
            end: end.clamp(0.0, 100.0),
        })
    }

    #[must_use]
    pub fn is_full(self) -> bool {
        self == Self::FULL
    }
}

impl Default for ZoomWindow {
    fn default() -> Self {
        Self::FULL
    }
}

/// One emphasized data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HighlightTarget {
    pub series_index: u32,
    pub data_index: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TooltipState {
    pub visible: bool,
    pub x: f64,
    pub y: f64,
}

impl Default for TooltipState {
    fn default() -> Self {
        Self {
            visible: false,
            x: 0.0,
            y: 0.0,
        }
    }
}

/// Interaction-driven visual state of one chart instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InteractionState {
    zoom: ZoomWindow,
    highlights: SmallVec<[HighlightTarget; 4]>,
    tooltip: TooltipState,
}

impl InteractionState {
    #[must_use]
    pub fn zoom(&self) -> ZoomWindow {
        self.zoom
    }

    #[must_use]
    pub fn highlights(&self) -> &[HighlightTarget] {
        &self.highlights
    }

    #[must_use]
    pub fn tooltip(&self) -> TooltipState {
        self.tooltip
    }

    /// Applies a built-in action. Returns `false` for custom kinds, which
    /// carry no visual state here.
    pub fn apply(&mut self, action: &ActionRecord) -> ChartResult<bool> {
        match &action.kind {
            ActionKind::DataZoom => {
                let start = action.param_f64("start").unwrap_or(self.zoom.start);
                let end = action.param_f64("end").unwrap_or(self.zoom.end);
                self.zoom = ZoomWindow::new(start, end)?;
            }
            ActionKind::Restore => {
                self.zoom = ZoomWindow::FULL;
                self.highlights.clear();
                self.tooltip = TooltipState::default();
            }
            ActionKind::Highlight => {
                let target = highlight_target(action)?;
                if !self.highlights.contains(&target) {
                    self.highlights.push(target);
                }
            }
            ActionKind::Downplay => match action.param_u32("seriesIndex") {
                Some(series_index) => {
                    let data_index = action.param_u32("dataIndex");
                    self.highlights.retain(|entry| {
                        entry.series_index != series_index
                            || (data_index.is_some() && entry.data_index != data_index)
                    });
                }
                None => self.highlights.clear(),
            },
            ActionKind::ShowTip => {
                let (Some(x), Some(y)) = (action.param_f64("x"), action.param_f64("y")) else {
                    return Err(ChartError::InvalidData(
                        "showTip requires numeric `x` and `y`".to_owned(),
                    ));
                };
                self.tooltip = TooltipState {
                    visible: true,
                    x,
                    y,
                };
            }
            ActionKind::HideTip => self.tooltip.visible = false,
            ActionKind::Custom(_) => return Ok(false),
        }
        Ok(true)
    }
}

fn highlight_target(action: &ActionRecord) -> ChartResult<HighlightTarget> {
    let series_index = action.param_u32("seriesIndex").ok_or_else(|| {
        ChartError::InvalidData("highlight requires a non-negative `seriesIndex`".to_owned())
    })?;
    Ok(HighlightTarget {
        series_index,
        data_index: action.param_u32("dataIndex"),
    })
}

#[cfg(test)]
mod tests {
    use super::{InteractionState, ZoomWindow};
    use crate::core::ActionRecord;

    #[test]
    fn data_zoom_orders_and_clamps_bounds() {
        let mut state = InteractionState::default();
        state
            .apply(&ActionRecord::data_zoom(120.0, 40.0))
            .expect("zoom");
        assert_eq!(
            state.zoom(),
            ZoomWindow {
                start: 40.0,
                end: 100.0
            }
        );
    }

    #[test]
    fn downplay_removes_only_matching_items() {
        let mut state = InteractionState::default();
        state.apply(&ActionRecord::highlight(0, 1)).expect("hl");
        state.apply(&ActionRecord::highlight(0, 2)).expect("hl");
        state.apply(&ActionRecord::highlight(0, 2)).expect("hl dup");
        assert_eq!(state.highlights().len(), 2);

        state.apply(&ActionRecord::downplay(0, 1)).expect("downplay");
        assert_eq!(state.highlights().len(), 1);
        assert_eq!(state.highlights()[0].data_index, Some(2));
    }

    #[test]
    fn show_tip_requires_coordinates() {
        let mut state = InteractionState::default();
        let err = state
            .apply(&ActionRecord::new("showTip").with_param("x", 3.0))
            .expect_err("missing y");
        assert!(err.to_string().contains("showTip"));
        assert!(!state.tooltip().visible);
    }

    #[test]
    fn custom_actions_leave_state_untouched() {
        let mut state = InteractionState::default();
        let changed = state
            .apply(&ActionRecord::new("legendToggleSelect"))
            .expect("custom");
        assert!(!changed);
        assert_eq!(state, InteractionState::default());
    }

    #[test]
    fn restore_resets_everything() {
        let mut state = InteractionState::default();
        state.apply(&ActionRecord::data_zoom(10.0, 20.0)).expect("zoom");
        state.apply(&ActionRecord::show_tip(1.0, 2.0)).expect("tip");
        state.apply(&ActionRecord::restore()).expect("restore");
        assert_eq!(state, InteractionState::default());
    }
}
