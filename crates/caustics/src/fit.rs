use afterglow_common::{Aabb, Plane, Transform};
use afterglow_render::Camera;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::CausticsError;

/// Projected radii below this are treated as a point.
const RADIUS_EPSILON: f32 = 1e-6;
/// Lights closer than this to the horizon never reach the ground plane.
const GRAZING_EPSILON: f32 = 1e-4;

/// Orthographic light camera fit to a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionFit {
    /// Bounds center the camera looks at.
    pub center: Vec3,
    /// Half extent of the square frustum.
    pub radius: f32,
    pub near: f32,
    pub far: f32,
    /// Unit vector toward the light.
    pub direction: Vec3,
    pub position: Vec3,
}

impl ProjectionFit {
    pub fn camera(&self) -> Camera {
        light_camera(self.position, self.direction, self.radius, self.near, self.far)
    }
}

fn light_camera(position: Vec3, direction: Vec3, radius: f32, near: f32, far: f32) -> Camera {
    Camera::orthographic(-radius, radius, radius, -radius, near, far)
        .at(position)
        .looking_at(position - direction)
}

fn checked_direction(light_dir: Vec3) -> Result<Vec3, CausticsError> {
    light_dir
        .try_normalize()
        .ok_or(CausticsError::InvalidLightDirection)
}

fn grazing(dir: Vec3) -> bool {
    dir.y < GRAZING_EPSILON
}

/// Fit an orthographic camera looking along `-light_dir` so that its square
/// frustum bounds every corner of `bounds`.
///
/// The camera sits at the corner furthest toward the light. Without a `far`
/// override, the far plane is placed where the frustum's top edge meets the
/// ground plane `y = 0`.
pub fn fit_projection(
    bounds: &Aabb,
    light_dir: Vec3,
    near: f32,
    far: Option<f32>,
) -> Result<ProjectionFit, CausticsError> {
    if bounds.is_degenerate() {
        return Err(CausticsError::DegenerateBounds);
    }
    let dir = checked_direction(light_dir)?;
    let center = bounds.center();
    let corners = bounds.corners().map(|c| c - center);

    let light_plane = Plane::new(-dir, 0.0);
    let projected = corners.map(|c| light_plane.project_point(c));
    let centroid = projected.iter().sum::<Vec3>() / projected.len() as f32;
    let radius = projected
        .iter()
        .map(|p| p.distance(centroid))
        .fold(0.0_f32, f32::max);
    if !radius.is_finite() || radius < RADIUS_EPSILON {
        return Err(CausticsError::DegenerateBounds);
    }

    let reach = corners
        .iter()
        .map(|c| c.dot(dir))
        .fold(f32::NEG_INFINITY, f32::max);
    let position = center + dir * reach;

    let far = match far {
        Some(far) => far,
        None => {
            if grazing(dir) {
                return Err(CausticsError::GrazingLight(dir.to_array()));
            }
            let up = light_camera(position, dir, radius, near, 1.0).world_up();
            (position.y + up.y * radius) / dir.y
        }
    };

    Ok(ProjectionFit {
        center,
        radius,
        near,
        far,
        direction: dir,
        position,
    })
}

/// Result of a [`ProjectionFitter::fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitOutcome {
    Fresh(ProjectionFit),
    /// The input was rejected; this is the last good fit.
    Previous(ProjectionFit),
    /// The input was rejected and there is no earlier fit.
    Unavailable,
}

impl FitOutcome {
    pub fn fit(&self) -> Option<&ProjectionFit> {
        match self {
            Self::Fresh(fit) | Self::Previous(fit) => Some(fit),
            Self::Unavailable => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// Keeps the last valid fit so that degenerate frames fall back to it.
#[derive(Debug, Clone, Default)]
pub struct ProjectionFitter {
    last: Option<ProjectionFit>,
    rejected: u64,
}

impl ProjectionFitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit, or fall back to the previous fit on degenerate bounds or a
    /// grazing light. Other errors propagate.
    pub fn fit(
        &mut self,
        bounds: &Aabb,
        light_dir: Vec3,
        near: f32,
        far: Option<f32>,
    ) -> Result<FitOutcome, CausticsError> {
        match fit_projection(bounds, light_dir, near, far) {
            Ok(fit) => {
                self.last = Some(fit);
                Ok(FitOutcome::Fresh(fit))
            }
            Err(e) if e.is_recoverable() => {
                self.rejected += 1;
                tracing::warn!(error = %e, rejected = self.rejected, "projection fit rejected");
                Ok(self.last.map_or(FitOutcome::Unavailable, FitOutcome::Previous))
            }
            Err(e) => Err(e),
        }
    }

    pub fn last(&self) -> Option<&ProjectionFit> {
        self.last.as_ref()
    }

    /// Fits rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

/// Square patch of the ground plane that catches the caustics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReceiverPlane {
    pub center: Vec3,
    /// Side length.
    pub size: f32,
}

impl ReceiverPlane {
    pub fn transform(&self) -> Transform {
        Transform::from_position(self.center)
    }

    /// World position of a point on the patch. `u` grows along +X, `v`
    /// along -Z.
    pub fn world_at(&self, uv: Vec2) -> Vec3 {
        self.center + Vec3::new(uv.x - 0.5, 0.0, 0.5 - uv.y) * self.size
    }
}

/// Footprint of `bounds` on the ground plane `y = 0` when cast along the
/// light direction.
pub fn receiver_plane(bounds: &Aabb, light_dir: Vec3) -> Result<ReceiverPlane, CausticsError> {
    if bounds.is_degenerate() {
        return Err(CausticsError::DegenerateBounds);
    }
    let dir = checked_direction(light_dir)?;
    if grazing(dir) {
        return Err(CausticsError::GrazingLight(dir.to_array()));
    }
    let landed = bounds.corners().map(|v| v + dir * (-v.y / dir.y));
    let center = landed.iter().sum::<Vec3>() / landed.len() as f32;
    let size = 2.0
        * landed
            .iter()
            .map(|v| (v.x - center.x).hypot(v.z - center.z))
            .fold(0.0_f32, f32::max);
    Ok(ReceiverPlane { center, size })
}
