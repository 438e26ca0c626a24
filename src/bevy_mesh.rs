use bevy::asset::RenderAssetUsages;
use bevy::prelude::Mesh;
use bevy_render::mesh::{Indices, PrimitiveTopology};
use strand_core::GeometryData;

/// Converts synthesized strand geometry into a fresh triangle-list mesh.
pub fn to_mesh(geometry: &GeometryData) -> Mesh {
    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
    write_geometry(&mut mesh, geometry);
    mesh
}

/// Overwrites every attribute of `mesh` in place. The buffer sizes of a batch
/// never change, so the render side only re-uploads.
pub fn write_geometry(mesh: &mut Mesh, geometry: &GeometryData) {
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, geometry.points.clone());
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, geometry.colors.clone());
    mesh.insert_indices(Indices::U32(geometry.triangles.clone()));
    mesh.compute_smooth_normals();
}
