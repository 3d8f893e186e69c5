//! Opacity of the title bar and status bar.
//!
//! Each region has a configured [`BarBehavior`]; combined with whether the pointer
//! is inside the panel it yields a fully visible or fully hidden region. Easing
//! between the two values is left to the renderer.

use serde::{Deserialize, Serialize};

pub const VISIBLE: f64 = 1.0;
pub const HIDDEN: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BarBehavior {
    Always,
    #[default]
    OnHover,
    Never,
}

impl BarBehavior {
    pub const ALL: [BarBehavior; 3] = [BarBehavior::Always, BarBehavior::OnHover, BarBehavior::Never];

    pub fn display_name(self) -> &'static str {
        match self {
            BarBehavior::Always => "Always",
            BarBehavior::OnHover => "On Hover",
            BarBehavior::Never => "Never",
        }
    }

    pub fn opacity(self, hover: HoverState) -> f64 {
        match (self, hover) {
            (BarBehavior::Always, _) => VISIBLE,
            (BarBehavior::OnHover, HoverState::Hovering) => VISIBLE,
            (BarBehavior::OnHover, HoverState::Idle) => HIDDEN,
            (BarBehavior::Never, _) => HIDDEN,
        }
    }

    /// Whether the region keeps its layout space; `Never` collapses it.
    pub fn reserves_space(self) -> bool {
        self != BarBehavior::Never
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoverState {
    #[default]
    Idle,
    Hovering,
}

impl From<bool> for HoverState {
    fn from(hovering: bool) -> Self {
        if hovering {
            HoverState::Hovering
        } else {
            HoverState::Idle
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeRegion {
    TitleBar,
    StatusBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityState {
    title_bar: BarBehavior,
    status_bar: BarBehavior,
    hover: HoverState,
}

impl VisibilityState {
    pub fn new(title_bar: BarBehavior, status_bar: BarBehavior) -> Self {
        Self {
            title_bar,
            status_bar,
            hover: HoverState::Idle,
        }
    }

    pub fn hover(&self) -> HoverState {
        self.hover
    }

    /// Returns true when the hover state actually changed.
    pub fn set_hover(&mut self, hover: HoverState) -> bool {
        std::mem::replace(&mut self.hover, hover) != hover
    }

    pub fn behavior(&self, region: ChromeRegion) -> BarBehavior {
        match region {
            ChromeRegion::TitleBar => self.title_bar,
            ChromeRegion::StatusBar => self.status_bar,
        }
    }

    pub fn set_behavior(&mut self, region: ChromeRegion, behavior: BarBehavior) -> bool {
        let slot = match region {
            ChromeRegion::TitleBar => &mut self.title_bar,
            ChromeRegion::StatusBar => &mut self.status_bar,
        };
        std::mem::replace(slot, behavior) != behavior
    }

    pub fn opacity(&self, region: ChromeRegion) -> f64 {
        self.behavior(region).opacity(self.hover)
    }

    pub fn reserves_space(&self, region: ChromeRegion) -> bool {
        self.behavior(region).reserves_space()
    }
}
