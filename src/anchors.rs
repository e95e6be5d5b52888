//! Binding detected fiducial markers to the four chart anchor roles.
//!
//! Each anchor identity contributes the marker corner that faces the chart
//! interior, so the anchor quad hugs the printed target rather than the
//! outside of the markers.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use nalgebra::Point2;
use serde::Serialize;

use crate::chart::ChartMode;

/// One decoded marker: identity plus its corners in detector winding
/// (top-left, top-right, bottom-right, bottom-left of the marker itself).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerDetection {
    pub id: i32,
    pub corners: [Point2<f64>; 4],
}

impl MarkerDetection {
    pub fn new(id: i32, corners: [Point2<f64>; 4]) -> Self {
        Self { id, corners }
    }

    /// Axis-aligned marker spanning `(x0, y0)`-`(x1, y1)`.
    pub fn axis_aligned(id: i32, x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(
            id,
            [
                Point2::new(x0, y0),
                Point2::new(x1, y0),
                Point2::new(x1, y1),
                Point2::new(x0, y1),
            ],
        )
    }
}

/// Anchor roles, in the order homographies consume them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnchorRole {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl AnchorRole {
    pub const ALL: [AnchorRole; 4] = [
        AnchorRole::TopLeft,
        AnchorRole::TopRight,
        AnchorRole::BottomRight,
        AnchorRole::BottomLeft,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

struct AnchorRule {
    ids: RangeInclusive<i32>,
    role: AnchorRole,
    corner: usize,
}

static ANCHOR_RULES: [AnchorRule; 4] = [
    AnchorRule {
        ids: 923..=923,
        role: AnchorRole::TopLeft,
        corner: 3,
    },
    AnchorRule {
        ids: 1001..=1006,
        role: AnchorRole::TopRight,
        corner: 2,
    },
    AnchorRule {
        ids: 1007..=1007,
        role: AnchorRole::BottomLeft,
        corner: 0,
    },
    AnchorRule {
        ids: 241..=241,
        role: AnchorRole::BottomRight,
        corner: 1,
    },
];

/// Identities per role (TL, TR, BR, BL) announcing each chart.
static SIGNATURES: [(ChartMode, [i32; 4]); 3] = [
    (ChartMode::ColorChecker, [923, 1001, 241, 1007]),
    (ChartMode::WhiteReference, [923, 1002, 241, 1007]),
    (ChartMode::Histogram, [923, 1003, 241, 1007]),
];

/// Role and contributing corner index for a marker identity.
pub fn lookup(id: i32) -> Option<(AnchorRole, usize)> {
    ANCHOR_RULES
        .iter()
        .find(|rule| rule.ids.contains(&id))
        .map(|rule| (rule.role, rule.corner))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnchorBinding {
    pub id: i32,
    pub point: Point2<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnchorSet {
    bindings: [Option<AnchorBinding>; 4],
}

impl AnchorSet {
    pub fn get(&self, role: AnchorRole) -> Option<&AnchorBinding> {
        self.bindings[role.slot()].as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.bindings.iter().all(Option::is_some)
    }

    /// Anchor points ordered TL, TR, BR, BL, once every role is bound.
    pub fn quad(&self) -> Option<[Point2<f64>; 4]> {
        let [tl, tr, br, bl] = &self.bindings;
        Some([tl.as_ref()?.point, tr.as_ref()?.point, br.as_ref()?.point, bl.as_ref()?.point])
    }

    pub fn ids(&self) -> Option<[i32; 4]> {
        let [tl, tr, br, bl] = &self.bindings;
        Some([tl.as_ref()?.id, tr.as_ref()?.id, br.as_ref()?.id, bl.as_ref()?.id])
    }
}

/// What to do when several detections claim the same anchor role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorConflictPolicy {
    #[default]
    FirstWins,
    LastWins,
    /// Leave the frame unresolved.
    Reject,
}

impl AnchorConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorConflictPolicy::FirstWins => "first-wins",
            AnchorConflictPolicy::LastWins => "last-wins",
            AnchorConflictPolicy::Reject => "reject",
        }
    }
}

impl fmt::Display for AnchorConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-wins" | "first" => Ok(AnchorConflictPolicy::FirstWins),
            "last-wins" | "last" => Ok(AnchorConflictPolicy::LastWins),
            "reject" => Ok(AnchorConflictPolicy::Reject),
            other => Err(format!("unknown anchor conflict policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub mode: ChartMode,
    pub anchors: AnchorSet,
    /// Detections that claimed an already bound role.
    pub conflicts: usize,
}

/// Bind detections to anchor roles and decide which chart, if any, they
/// announce.
///
/// A mode is only resolved when at least four markers were seen, every
/// role is bound and the bound identities match a chart signature.
pub fn classify(detections: &[MarkerDetection], policy: AnchorConflictPolicy) -> Classification {
    let mut anchors = AnchorSet::default();
    let mut conflicts = 0;

    for det in detections {
        let Some((role, corner)) = lookup(det.id) else {
            continue;
        };
        let binding = AnchorBinding {
            id: det.id,
            point: det.corners[corner],
        };
        let slot = &mut anchors.bindings[role.slot()];
        match slot {
            None => *slot = Some(binding),
            Some(_) => {
                conflicts += 1;
                if policy == AnchorConflictPolicy::LastWins {
                    *slot = Some(binding);
                }
            }
        }
    }

    let rejected = policy == AnchorConflictPolicy::Reject && conflicts > 0;
    let mode = if detections.len() < 4 || rejected {
        ChartMode::None
    } else {
        anchors
            .ids()
            .and_then(|ids| {
                SIGNATURES
                    .iter()
                    .find(|(_, signature)| *signature == ids)
                    .map(|(mode, _)| *mode)
            })
            .unwrap_or(ChartMode::None)
    };

    Classification {
        mode,
        anchors,
        conflicts,
    }
}
