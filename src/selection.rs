use crate::types::RegionId;

/// The highlighted region of one map, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Empty,
    Selected(RegionId),
}

/// What a click did to the selection, and which colors must change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The click hit nothing; selection and colors stay as they were.
    Missed,
    /// The click hit the region that was already selected.
    Reselected(RegionId),
    /// A new region became the selection; `previous` reverts to the default color.
    Changed {
        previous: Option<RegionId>,
        current: RegionId,
    },
}

impl Transition {
    pub fn changes_colors(&self) -> bool {
        matches!(self, Transition::Changed { .. })
    }
}

impl Selection {
    pub fn current(&self) -> Option<RegionId> {
        match self {
            Selection::Empty => None,
            Selection::Selected(id) => Some(*id),
        }
    }

    /// Applies the result of a hit test and reports the resulting transition.
    pub fn apply(&mut self, hit: Option<RegionId>) -> Transition {
        let Some(hit) = hit else {
            return Transition::Missed;
        };

        match *self {
            Selection::Selected(current) if current == hit => Transition::Reselected(hit),
            previous => {
                *self = Selection::Selected(hit);
                Transition::Changed {
                    previous: previous.current(),
                    current: hit,
                }
            }
        }
    }
}
