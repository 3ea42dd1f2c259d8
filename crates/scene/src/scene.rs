use afterglow_common::{Aabb, Color, ObjectId, Transform};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::geometry::Geometry;
use crate::object::{Light, Material, MaterialHandle, Mesh, ObjectKind, SceneObject};

/// Retained scene: meshes and lights keyed by id, plus the material registry.
///
/// Uses BTreeMap for deterministic traversal order.
#[derive(Debug, Clone)]
pub struct Scene {
    objects: BTreeMap<ObjectId, SceneObject>,
    materials: BTreeMap<MaterialHandle, Material>,
    next_material: u64,
    discard: MaterialHandle,
    background: Option<Color>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create an empty scene with its discard material registered.
    pub fn new() -> Self {
        let mut scene = Self {
            objects: BTreeMap::new(),
            materials: BTreeMap::new(),
            next_material: 0,
            discard: MaterialHandle(0),
            background: None,
        };
        scene.discard = scene.add_material(Material::Discard);
        scene
    }

    // --- Materials ---

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        let handle = MaterialHandle(self.next_material);
        self.next_material += 1;
        self.materials.insert(handle, material);
        handle
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(&handle)
    }

    /// The shared placeholder that hides a mesh from color passes.
    pub fn discard_material(&self) -> MaterialHandle {
        self.discard
    }

    // --- Objects ---

    pub fn add_mesh(
        &mut self,
        name: impl Into<String>,
        geometry: Arc<Geometry>,
        material: MaterialHandle,
        transform: Transform,
    ) -> ObjectId {
        self.insert(SceneObject {
            name: name.into(),
            transform,
            visible: true,
            kind: ObjectKind::Mesh(Mesh::new(geometry, material)),
        })
    }

    pub fn add_light(
        &mut self,
        name: impl Into<String>,
        light: Light,
        transform: Transform,
    ) -> ObjectId {
        self.insert(SceneObject {
            name: name.into(),
            transform,
            visible: true,
            kind: ObjectKind::Light(light),
        })
    }

    fn insert(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId::new();
        tracing::trace!(id = %id.short(), name = %object.name, "object added");
        self.objects.insert(id, object);
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let removed = self.objects.remove(&id);
        if removed.is_some() {
            tracing::trace!(id = %id.short(), "object removed");
        }
        removed
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Every object in canonical order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.objects.iter().map(|(id, obj)| (*id, obj))
    }

    pub fn meshes(&self) -> impl Iterator<Item = (ObjectId, &SceneObject, &Mesh)> {
        self.objects
            .iter()
            .filter_map(|(id, obj)| obj.as_mesh().map(|m| (*id, obj, m)))
    }

    pub fn lights(&self) -> impl Iterator<Item = (ObjectId, &SceneObject, &Light)> {
        self.objects
            .iter()
            .filter_map(|(id, obj)| obj.as_light().map(|l| (*id, obj, l)))
    }

    /// Reassign a mesh's material. Returns false if `id` is not a mesh.
    pub fn set_material(&mut self, id: ObjectId, material: MaterialHandle) -> bool {
        let Some(ObjectKind::Mesh(mesh)) = self.objects.get_mut(&id).map(|o| &mut o.kind) else {
            return false;
        };
        tracing::trace!(id = %id.short(), old = mesh.material.0, new = material.0, "material changed");
        mesh.material = material;
        true
    }

    /// Set a light's intensity. Returns false if `id` is not a light.
    pub fn set_intensity(&mut self, id: ObjectId, intensity: f32) -> bool {
        let Some(ObjectKind::Light(light)) = self.objects.get_mut(&id).map(|o| &mut o.kind)
        else {
            return false;
        };
        tracing::trace!(id = %id.short(), old = light.intensity, new = intensity, "intensity changed");
        light.intensity = intensity;
        true
    }

    pub fn set_transform(&mut self, id: ObjectId, new: Transform) -> bool {
        let Some(obj) = self.objects.get_mut(&id) else {
            return false;
        };
        obj.transform = new;
        true
    }

    pub fn set_visible(&mut self, id: ObjectId, visible: bool) -> bool {
        let Some(obj) = self.objects.get_mut(&id) else {
            return false;
        };
        obj.visible = visible;
        true
    }

    /// Configure shadow flags on a mesh. Returns false if `id` is not a mesh.
    pub fn set_shadows(&mut self, id: ObjectId, cast: bool, receive: bool) -> bool {
        match self.objects.get_mut(&id).map(|o| &mut o.kind) {
            Some(ObjectKind::Mesh(mesh)) => {
                mesh.cast_shadow = cast;
                mesh.receive_shadow = receive;
                true
            }
            _ => false,
        }
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }

    pub fn set_background(&mut self, background: Option<Color>) {
        self.background = background;
    }

    // --- Derived state ---

    /// World-space bounds of every visible mesh vertex.
    pub fn bounding_box(&self) -> Aabb {
        self.meshes()
            .filter(|(_, obj, _)| obj.visible)
            .fold(Aabb::empty(), |acc, (_, obj, mesh)| {
                acc.union(&mesh.geometry.world_bounds(&obj.transform))
            })
    }

    /// Deterministic hash of the mutable per-object state.
    ///
    /// Two scenes with equal hashes have the same materials assigned, the same
    /// light intensities, transforms and visibility.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        for (id, obj) in &self.objects {
            mix(&mut h, id.0.as_bytes());
            mix(&mut h, &[obj.visible as u8]);
            let t = &obj.transform;
            for f in t
                .position
                .to_array()
                .into_iter()
                .chain(t.rotation.to_array())
                .chain(t.scale.to_array())
            {
                mix(&mut h, &f.to_le_bytes());
            }
            match &obj.kind {
                ObjectKind::Mesh(mesh) => {
                    mix(&mut h, &mesh.material.0.to_le_bytes());
                    mix(&mut h, &[mesh.cast_shadow as u8, mesh.receive_shadow as u8]);
                }
                ObjectKind::Light(light) => {
                    mix(&mut h, &light.intensity.to_le_bytes());
                }
            }
        }
        h
    }
}
