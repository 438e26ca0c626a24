use bevy::math::Vec3;
use bevy::prelude::Mesh;
use bevy_render::mesh::VertexAttributeValues;
use strand_core::{SkinWeights, StrandError, TriangleSurface};

fn vec3_attribute(mesh: &Mesh, id: bevy_render::mesh::MeshVertexAttribute) -> Option<Vec<Vec3>> {
    match mesh.attribute(id)? {
        VertexAttributeValues::Float32x3(values) => {
            Some(values.iter().map(|&v| Vec3::from(v)).collect())
        }
        _ => None,
    }
}

fn skin_attributes(mesh: &Mesh) -> Option<Vec<SkinWeights>> {
    let joints = match mesh.attribute(Mesh::ATTRIBUTE_JOINT_INDEX)? {
        VertexAttributeValues::Uint16x4(joints) => joints,
        _ => return None,
    };
    let weights = match mesh.attribute(Mesh::ATTRIBUTE_JOINT_WEIGHT)? {
        VertexAttributeValues::Float32x4(weights) => weights,
        _ => return None,
    };
    Some(
        joints
            .iter()
            .zip(weights)
            .map(|(&j, &w)| SkinWeights::new(j, w))
            .collect(),
    )
}

/// Sampling surface of a bevy mesh, with its skin weights when the mesh has
/// any. Non-indexed meshes are read as a plain triangle list.
pub fn surface_from_mesh(
    mesh: &Mesh,
    subset: Option<Vec<bool>>,
) -> Result<TriangleSurface, StrandError> {
    let positions = vec3_attribute(mesh, Mesh::ATTRIBUTE_POSITION).unwrap_or_default();
    let normals = vec3_attribute(mesh, Mesh::ATTRIBUTE_NORMAL).ok_or(StrandError::SurfaceMismatch {
        attribute: "normal",
        expected: positions.len(),
        found: 0,
    })?;
    let indices: Vec<u32> = match mesh.indices() {
        Some(indices) => indices.iter().map(|i| i as u32).collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let mut surface = TriangleSurface::new(positions, normals, &indices)?;
    if let Some(skin) = skin_attributes(mesh) {
        surface = surface.with_skin(skin)?;
    }
    if let Some(marked) = subset {
        surface = surface.with_subset(marked)?;
    }
    Ok(surface)
}
